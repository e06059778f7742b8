use wsh_client::{ExecRequest, HttpSession, RemoteSession};

fn get_test_url() -> String {
    std::env::var("WSH_TEST_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

#[tokio::test]
#[ignore = "requires running gateway"]
async fn write_read_delete_file() {
    let session = HttpSession::new(&get_test_url()).unwrap();
    let path = "/tmp/wsh_integration/file.txt";
    let data = b"Hello from integration test!";

    session.write(path, data, true).await.unwrap();

    let read = session.read(path).await.unwrap();
    assert_eq!(&read[..], data);

    let entry = session.stat(path).await.unwrap().unwrap();
    assert_eq!(entry.size, data.len() as u64);
    assert!(entry.is_file());

    session.delete("/tmp/wsh_integration", true).await.unwrap();
    assert!(!session.exists(path).await.unwrap());
}

#[tokio::test]
#[ignore = "requires running gateway"]
async fn make_and_list_directory() {
    let session = HttpSession::new(&get_test_url()).unwrap();
    let dir = "/tmp/wsh_integration_dir";

    if session.exists(dir).await.unwrap() {
        session.delete(dir, true).await.unwrap();
    }

    session.make_dir(dir, true).await.unwrap();
    assert!(session.is_dir(dir).await.unwrap());

    session
        .write(&format!("{dir}/file.txt"), b"content", false)
        .await
        .unwrap();

    let entries = session.list(dir).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].path.ends_with("file.txt"));

    session.delete(dir, true).await.unwrap();
}

#[tokio::test]
#[ignore = "requires running gateway"]
async fn missing_file_is_not_found() {
    let session = HttpSession::new(&get_test_url()).unwrap();
    let err = session.read("/nonexistent/wsh/file").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore = "requires running gateway"]
async fn exec_buffered_and_streamed() {
    let session = HttpSession::new(&get_test_url()).unwrap();
    let req = ExecRequest::new(["echo", "hello"]);

    let out = session.exec(&req).await.unwrap();
    assert_eq!(out.exit_code, 0);
    assert_eq!(&out.stdout[..], b"hello\n");

    let mut collected = Vec::new();
    let code = session
        .exec_streamed(&req, &mut |chunk: wsh_client::ExecChunk| {
            if let wsh_client::ExecChunk::Stdout(b) = chunk {
                collected.extend_from_slice(&b);
            }
        })
        .await
        .unwrap();
    assert_eq!(code, 0);
    assert_eq!(collected, b"hello\n");
}
