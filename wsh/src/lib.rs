//! wsh - Interactive shell for remote containerized workloads
//!
//! This crate provides:
//! - A quoting-aware lexer and a parser for pipes, redirection and `;`/`&&`/`||` chains
//! - A sequential pipeline executor that threads captured output between stages
//! - Variable, wildcard and bang-history expansion
//! - A small built-in command set running against a [`wsh_client::RemoteSession`]

pub mod commands;
pub mod emulate;
pub mod error;
mod executor;
pub mod glob;
pub mod help;
pub mod history;
pub mod lexer;
pub mod parser;
pub mod shell;
pub mod state;
pub mod vars;

pub use commands::{Category, Command, CommandContext, CommandRegistry};
pub use error::{HistoryExpansionError, ShellError, ShellResult};
pub use history::HistoryBuffer;
pub use parser::{parse, parse_statement, ForLoop, Statement};
pub use shell::{CapturedOutput, Output, Shell, ShellBuilder};
pub use state::SessionState;
pub use vars::ShellVariables;
