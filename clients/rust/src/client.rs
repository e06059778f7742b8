use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;

use crate::error::{RemoteError, Result};
use crate::session::RemoteSession;
use crate::types::{
    Envelope, ErrorResult, ExecBody, ExecChunk, ExecOutput, ExecRequest, ExecResult, FileEntry,
    FileEntryResponse, StreamFrame,
};

/// Remote session over the service manager's HTTP gateway.
pub struct HttpSession {
    client: Client,
    base_url: String,
}

impl HttpSession {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> HttpSessionBuilder {
        HttpSessionBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn files_url(&self) -> String {
        format!("{}/v1/files", self.base_url)
    }

    fn exec_url(&self) -> String {
        format!("{}/v1/exec", self.base_url)
    }

    async fn post_files<B: Serialize + Sync>(&self, body: &B) -> Result<()> {
        let resp = self.client.post(self.files_url()).json(body).send().await?;
        self.handle_empty_response(resp).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T> {
        if !resp.status().is_success() {
            return Err(self.extract_error(resp).await);
        }
        let envelope: Envelope<T> = resp.json().await?;
        Ok(envelope.result)
    }

    async fn handle_empty_response(&self, resp: reqwest::Response) -> Result<()> {
        if !resp.status().is_success() {
            return Err(self.extract_error(resp).await);
        }
        Ok(())
    }

    async fn extract_error(&self, resp: reqwest::Response) -> RemoteError {
        let status = resp.status().as_u16();
        match resp.json::<Envelope<ErrorResult>>().await {
            Ok(envelope) => RemoteError::from_response(status, envelope.result.message),
            Err(_) => RemoteError::Gateway {
                status,
                message: "unknown error".to_string(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct WriteItem<'a> {
    path: &'a str,
    content: String,
    make_dirs: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct RemoveItem<'a> {
    path: &'a str,
    recursive: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct MakeDirItem<'a> {
    path: &'a str,
    make_parents: bool,
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum FilesAction<'a> {
    Write { files: Vec<WriteItem<'a>> },
    Remove { paths: Vec<RemoveItem<'a>> },
    MakeDirs { dirs: Vec<MakeDirItem<'a>> },
}

#[async_trait]
impl RemoteSession for HttpSession {
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let resp = self
            .client
            .get(self.files_url())
            .query(&[("action", "list"), ("path", path)])
            .send()
            .await?;

        let entries: Vec<FileEntryResponse> = self.handle_response(resp).await?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(self.files_url())
            .query(&[("action", "read"), ("path", path)])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(self.extract_error(resp).await);
        }

        Ok(resp.bytes().await?)
    }

    async fn write(&self, path: &str, content: &[u8], create_parents: bool) -> Result<()> {
        tracing::debug!(path, bytes = content.len(), "remote write");
        self.post_files(&FilesAction::Write {
            files: vec![WriteItem {
                path,
                content: String::from_utf8_lossy(content).into_owned(),
                make_dirs: create_parents,
            }],
        })
        .await
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        self.post_files(&FilesAction::Remove {
            paths: vec![RemoveItem { path, recursive }],
        })
        .await
    }

    async fn make_dir(&self, path: &str, parents: bool) -> Result<()> {
        self.post_files(&FilesAction::MakeDirs {
            dirs: vec![MakeDirItem {
                path,
                make_parents: parents,
            }],
        })
        .await
    }

    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput> {
        if request.argv.is_empty() {
            return Err(RemoteError::InvalidArgument("empty command".to_string()));
        }
        let resp = self
            .client
            .post(self.exec_url())
            .json(&ExecBody::new(request, false))
            .send()
            .await?;

        let result: ExecResult = self.handle_response(resp).await?;
        Ok(result.into())
    }

    async fn exec_streamed(
        &self,
        request: &ExecRequest,
        sink: &mut (dyn FnMut(ExecChunk) + Send),
    ) -> Result<i32> {
        if request.argv.is_empty() {
            return Err(RemoteError::InvalidArgument("empty command".to_string()));
        }
        let mut resp = self
            .client
            .post(self.exec_url())
            .json(&ExecBody::new(request, true))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(self.extract_error(resp).await);
        }

        // Body is newline-delimited frames; the last one carries the exit code.
        let mut pending: Vec<u8> = Vec::new();
        let mut exit_code = None;
        while let Some(chunk) = resp.chunk().await? {
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if let Some(code) = dispatch_frame(&line, sink)? {
                    exit_code = Some(code);
                }
            }
        }
        if !pending.is_empty() {
            if let Some(code) = dispatch_frame(&pending, sink)? {
                exit_code = Some(code);
            }
        }

        exit_code.ok_or_else(|| {
            RemoteError::Decode("stream ended without an exit code".to_string())
        })
    }
}

fn dispatch_frame(line: &[u8], sink: &mut (dyn FnMut(ExecChunk) + Send)) -> Result<Option<i32>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| RemoteError::Decode(e.to_string()))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    let frame: StreamFrame = serde_json::from_str(text)?;
    if let Some(data) = frame.data {
        let bytes = Bytes::from(data);
        match frame.stream.as_deref() {
            Some("stderr") => sink(ExecChunk::Stderr(bytes)),
            _ => sink(ExecChunk::Stdout(bytes)),
        }
    }
    Ok(frame.exit_code)
}

pub struct HttpSessionBuilder {
    base_url: String,
    timeout: Duration,
    token: Option<String>,
}

impl HttpSessionBuilder {
    fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            token: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<HttpSession> {
        let mut builder = Client::builder().timeout(self.timeout);

        if let Some(token) = &self.token {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {token}")
                    .parse()
                    .map_err(|_| RemoteError::InvalidArgument("invalid token".to_string()))?,
            );
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Ok(HttpSession {
            client,
            base_url: self.base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_frames_reach_the_sink() {
        let mut seen = Vec::new();
        let mut sink = |c: ExecChunk| seen.push(c);
        let code = dispatch_frame(br#"{"stream":"stderr","data":"oops"}"#, &mut sink).unwrap();
        assert_eq!(code, None);
        let code = dispatch_frame(br#"{"exit-code":2}"#, &mut sink).unwrap();
        assert_eq!(code, Some(2));
        assert_eq!(seen, vec![ExecChunk::Stderr(Bytes::from("oops"))]);
    }

    #[test]
    fn blank_frame_is_skipped() {
        let mut sink = |_: ExecChunk| panic!("no chunk expected");
        assert_eq!(dispatch_frame(b"   \n", &mut sink).unwrap(), None);
    }

    #[test]
    fn files_action_wire_shape() {
        let body = FilesAction::Remove {
            paths: vec![RemoveItem {
                path: "/tmp/x",
                recursive: true,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["action"], "remove");
        assert_eq!(json["paths"][0]["recursive"], true);
    }
}
