use thiserror::Error;

/// Failure of a single gateway call, classified the way the shell reports it.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("gateway answered {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("{0}: No such file or directory")]
    NotFound(String),

    #[error("{0}: Permission denied")]
    PermissionDenied(String),

    #[error("{0}: File exists")]
    AlreadyExists(String),

    #[error("{0}: Not a directory")]
    NotDirectory(String),

    #[error("{0}: Is a directory")]
    IsDirectory(String),

    #[error("{0}: Directory not empty")]
    DirectoryNotEmpty(String),

    #[error("rejected by gateway: {0}")]
    InvalidArgument(String),

    #[error("gateway did not answer in time")]
    Timeout,

    #[error("unreadable gateway payload: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Map a non-2xx answer onto a variant. The gateway prefixes its
    /// messages with the error class, which is dropped here.
    pub(crate) fn from_response(status: u16, message: String) -> Self {
        let message = message.trim();
        match status {
            400 => Self::InvalidArgument(without_class(message, "invalid argument:")),
            401 | 403 => Self::PermissionDenied(without_class(message, "permission denied:")),
            404 => Self::NotFound(without_class(message, "not found:")),
            409 => Self::AlreadyExists(without_class(message, "already exists:")),
            504 => Self::Timeout,
            _ => Self::Gateway {
                status,
                message: message.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The message without the path, for callers that print the operand themselves.
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound(_) => "No such file or directory".to_string(),
            Self::PermissionDenied(_) => "Permission denied".to_string(),
            Self::AlreadyExists(_) => "File exists".to_string(),
            Self::NotDirectory(_) => "Not a directory".to_string(),
            Self::IsDirectory(_) => "Is a directory".to_string(),
            Self::DirectoryNotEmpty(_) => "Directory not empty".to_string(),
            other => other.to_string(),
        }
    }

    /// Transport-level failures, as opposed to the gateway refusing an operation.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout | Self::Decode(_))
    }
}

fn without_class(message: &str, class: &str) -> String {
    message
        .strip_prefix(class)
        .unwrap_or(message)
        .trim()
        .to_string()
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
