//! Shell session and line entry point

use std::io::Write;
use std::sync::Arc;

use wsh_client::RemoteSession;

use crate::commands::{Command, CommandRegistry};
use crate::error::ShellResult;
use crate::history::HistoryBuffer;
use crate::parser;
use crate::state::SessionState;

/// Where the session's stdout or stderr ends up.
pub enum Output {
    Stdout,
    Stderr,
    Buffer(Vec<u8>),
}

impl Output {
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(data)?;
                out.flush()
            }
            Self::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(data)?;
                err.flush()
            }
            Self::Buffer(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
        }
    }

    pub fn writeln(&mut self, s: &str) -> std::io::Result<()> {
        self.write(s.as_bytes())?;
        self.write(b"\n")
    }

    fn take_buffer(&mut self) -> Vec<u8> {
        match self {
            Self::Buffer(buf) => std::mem::take(buf),
            _ => Vec::new(),
        }
    }
}

/// What one line printed, for callers that run the shell headless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub struct Shell {
    pub(crate) session: Arc<dyn RemoteSession>,
    pub(crate) registry: CommandRegistry,
    pub state: SessionState,
    pub history: HistoryBuffer,
    pub(crate) stdout: Output,
    pub(crate) stderr: Output,
}

impl Shell {
    pub fn new(session: Arc<dyn RemoteSession>) -> Self {
        ShellBuilder::new(session).build()
    }

    pub fn builder(session: Arc<dyn RemoteSession>) -> ShellBuilder {
        ShellBuilder::new(session)
    }

    pub fn session(&self) -> &dyn RemoteSession {
        self.session.as_ref()
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub const fn last_exit_code(&self) -> i32 {
        self.state.vars.last_exit_code()
    }

    pub fn set_last_exit_code(&mut self, code: i32) {
        self.state.vars.set_last_exit_code(code);
    }

    /// Expand history, record the line, parse it and run every group.
    ///
    /// Parse and history failures abort the line before anything runs.
    pub async fn run_line(&mut self, line: &str) -> ShellResult<i32> {
        if line.trim().is_empty() {
            return Ok(self.last_exit_code());
        }
        let expanded = self.history.expand(line)?;
        if expanded != line {
            self.stderr.writeln(&expanded)?;
        }
        self.history.add(&expanded);

        let statement = parser::parse_statement(&expanded)?;
        self.run_statement(&statement).await
    }

    /// Run one line with both sinks captured.
    pub async fn execute_capture(&mut self, line: &str) -> ShellResult<CapturedOutput> {
        let stdout = std::mem::replace(&mut self.stdout, Output::Buffer(Vec::new()));
        let stderr = std::mem::replace(&mut self.stderr, Output::Buffer(Vec::new()));
        let result = self.run_line(line).await;
        let out = std::mem::replace(&mut self.stdout, stdout).take_buffer();
        let err = std::mem::replace(&mut self.stderr, stderr).take_buffer();
        let exit_code = result?;
        Ok(CapturedOutput {
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
            exit_code,
        })
    }

    /// Fill `{status}`, `{cwd}` and `{user}` in a prompt template.
    pub fn prompt(&self, template: &str) -> String {
        let glyph = if self.last_exit_code() == 0 { "✔" } else { "✖" };
        template
            .replace("{status}", glyph)
            .replace("{cwd}", &self.state.display_cwd())
            .replace("{user}", &self.state.user)
    }

    /// Split text into expanded arguments the way a stage would, without globbing.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        crate::lexer::tokenize(text, &self.state.vars)
    }

    /// Write a line to the session's stderr sink.
    pub fn report(&mut self, message: &str) {
        if let Err(e) = self.stderr.writeln(message) {
            tracing::warn!(error = %e, "failed to write to stderr sink");
        }
    }
}

pub struct ShellBuilder {
    session: Arc<dyn RemoteSession>,
    home: String,
    user: String,
    cwd: Option<String>,
    history_size: usize,
    vars: Vec<(String, String)>,
    aliases: Vec<(String, String)>,
    commands: Vec<Arc<dyn Command>>,
    env_fallback: bool,
    capture: bool,
}

impl ShellBuilder {
    pub fn new(session: Arc<dyn RemoteSession>) -> Self {
        Self {
            session,
            home: "/root".to_string(),
            user: "root".to_string(),
            cwd: None,
            history_size: 1000,
            vars: Vec::new(),
            aliases: Vec::new(),
            commands: Vec::new(),
            env_fallback: true,
            capture: false,
        }
    }

    #[must_use]
    pub fn home(mut self, home: impl Into<String>) -> Self {
        self.home = home.into();
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Start somewhere other than the home directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub const fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn alias(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.aliases.push((name.into(), value.into()));
        self
    }

    /// Register an extra command, replacing a built-in of the same name.
    #[must_use]
    pub fn command(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.push(command);
        self
    }

    #[must_use]
    pub const fn env_fallback(mut self, enabled: bool) -> Self {
        self.env_fallback = enabled;
        self
    }

    /// Buffer both sinks instead of writing to the process streams.
    #[must_use]
    pub const fn capture(mut self, enabled: bool) -> Self {
        self.capture = enabled;
        self
    }

    pub fn build(self) -> Shell {
        let mut state = SessionState::new(&self.home, &self.user);
        state.vars.set_env_fallback(self.env_fallback);
        if let Some(cwd) = self.cwd {
            let cwd = state.resolve_path(&cwd);
            state.cwd.clone_from(&cwd);
            state.vars.set("PWD", &cwd);
        }
        for (name, value) in &self.vars {
            state.vars.set(name, value);
        }
        state.aliases.extend(self.aliases);

        let mut registry = CommandRegistry::with_builtins();
        for command in self.commands {
            registry.register(command);
        }

        let (stdout, stderr) = if self.capture {
            (Output::Buffer(Vec::new()), Output::Buffer(Vec::new()))
        } else {
            (Output::Stdout, Output::Stderr)
        };

        Shell {
            session: self.session,
            registry,
            state,
            history: HistoryBuffer::new(self.history_size),
            stdout,
            stderr,
        }
    }
}
