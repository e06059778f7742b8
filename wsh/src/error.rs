//! Error types for wsh

use thiserror::Error;
use wsh_client::RemoteError;

/// Result type alias for wsh operations
pub type ShellResult<T> = Result<T, ShellError>;

/// Error types for wsh shell operations
#[derive(Error, Debug)]
pub enum ShellError {
    /// Line could not be split into a consistent pipeline
    #[error("Parse error: {0}")]
    ParseInconsistency(String),

    /// Bang or caret recall failed
    #[error(transparent)]
    HistoryExpansion(#[from] HistoryExpansionError),

    /// Command not found
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Failure surfaced by the remote session
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// Malformed arguments to a piped text filter
    #[error("{0}")]
    Emulation(String),

    /// IO error (local sinks, history file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Exit requested (not really an error)
    #[error("Exit with code {0}")]
    Exit(i32),
}

impl ShellError {
    /// Status a failed stage reports to chain-operator logic.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::CommandNotFound(_) => 127,
            Self::Exit(code) => *code,
            _ => 1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryExpansionError {
    #[error("No command history available")]
    EmptyHistory,

    #[error("Command number {index} out of range (1-{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("No command found starting with '{0}'")]
    PrefixNotFound(String),

    #[error("'{old}' not found in last command: {entry}")]
    SubstitutionNotFound { old: String, entry: String },

    #[error("Invalid substitution format. Use ^old^new")]
    InvalidSubstitution,
}
