//! Remote session capability for the workload shell.
//!
//! [`RemoteSession`] is the narrow file and process contract the shell
//! consumes. [`HttpSession`] speaks to a service manager gateway;
//! [`MemorySession`] keeps everything in-process for tests and demos.

mod client;
mod error;
mod memory;
mod session;
mod types;

pub use client::{HttpSession, HttpSessionBuilder};
pub use error::{RemoteError, Result};
pub use memory::{MemorySession, Program};
pub use session::RemoteSession;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecBody;

    #[test]
    fn session_builder() {
        let session = HttpSession::builder("http://localhost:4000/")
            .timeout(std::time::Duration::from_secs(5))
            .token("abc")
            .build()
            .unwrap();
        assert_eq!(session.base_url(), "http://localhost:4000");
    }

    #[test]
    fn exec_request_builder() {
        let req = ExecRequest::new(["ls", "-l"])
            .env("LANG", "C")
            .cwd("/tmp")
            .user("app");
        assert_eq!(req.program(), "ls");
        assert_eq!(req.env.get("LANG").map(String::as_str), Some("C"));
        assert_eq!(req.cwd.as_deref(), Some("/tmp"));
        assert!(req.group.is_none());
    }

    #[test]
    fn path_helpers() {
        assert_eq!(parent_path("/a/b/c"), "/a/b");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(base_name("/a/b/"), "b");
        assert_eq!(join_path("/", "x"), "/x");
        assert_eq!(join_path("/a", "x"), "/a/x");
    }

    #[test]
    fn status_codes_map_to_errors() {
        assert!(RemoteError::from_response(404, "not found: /x".into()).is_not_found());
        assert!(matches!(
            RemoteError::from_response(403, String::new()),
            RemoteError::PermissionDenied(_)
        ));
        assert!(matches!(
            RemoteError::from_response(504, String::new()),
            RemoteError::Timeout
        ));
        assert!(matches!(
            RemoteError::from_response(418, "teapot".into()),
            RemoteError::Gateway { status: 418, .. }
        ));
    }

    #[test]
    fn error_class_prefix_is_dropped() {
        let err = RemoteError::from_response(409, "already exists: /srv/a".into());
        assert!(matches!(err, RemoteError::AlreadyExists(ref p) if p == "/srv/a"));
        assert_eq!(err.to_string(), "/srv/a: File exists");
        assert_eq!(err.reason(), "File exists");
        assert!(!err.is_transport());
        assert!(RemoteError::Timeout.is_transport());
    }

    #[test]
    fn exec_body_omits_empty_fields() {
        let req = ExecRequest::new(["true"]);
        let json = serde_json::to_value(ExecBody::new(&req, false)).unwrap();
        assert_eq!(json["command"][0], "true");
        assert!(json.get("environment").is_none());
        assert!(json.get("working-dir").is_none());
        assert!(json.get("stream").is_none());
    }
}
