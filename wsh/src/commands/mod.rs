//! Command contract and the name registry built at startup

mod fs;
mod process;
mod shell;
mod text;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use wsh_client::RemoteSession;

use crate::error::ShellResult;
use crate::history::HistoryBuffer;
use crate::state::SessionState;

pub use fs::{Cat, Cd, Ls, Mkdir, Pwd, Rm, Touch};
pub use process::Exec;
pub use shell::{Env, False, History, True, Unset};
pub use text::{Echo, FileFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Filesystem,
    Text,
    Process,
    Shell,
}

impl Category {
    /// Display order for help output.
    pub const ALL: [Self; 4] = [Self::Filesystem, Self::Text, Self::Process, Self::Shell];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Filesystem => "Filesystem",
            Self::Text => "Text",
            Self::Process => "Process",
            Self::Shell => "Shell",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything a command may touch while it runs one stage.
pub struct CommandContext<'a> {
    pub session: &'a dyn RemoteSession,
    pub state: &'a mut SessionState,
    pub history: &'a mut HistoryBuffer,
    pub stdout: &'a mut Vec<u8>,
    pub stderr: &'a mut Vec<u8>,
}

impl CommandContext<'_> {
    pub fn out(&mut self, text: &str) {
        self.stdout.extend_from_slice(text.as_bytes());
    }

    pub fn outln(&mut self, text: &str) {
        self.out(text);
        self.stdout.push(b'\n');
    }

    pub fn errln(&mut self, text: &str) {
        self.stderr.extend_from_slice(text.as_bytes());
        self.stderr.push(b'\n');
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    /// One-line summary shown by `help`.
    fn help(&self) -> &str;

    fn category(&self) -> Category;

    /// Run with already expanded arguments (the command name excluded).
    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32>;
}

#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in command set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Pwd));
        registry.register(Arc::new(Cd));
        registry.register(Arc::new(Ls));
        registry.register(Arc::new(Cat));
        registry.register(Arc::new(Rm));
        registry.register(Arc::new(Mkdir));
        registry.register(Arc::new(Touch));
        registry.register(Arc::new(Echo));
        for name in crate::emulate::EMULATED_COMMANDS {
            registry.register(Arc::new(FileFilter::new(name)));
        }
        registry.register(Arc::new(Exec));
        registry.register(Arc::new(True));
        registry.register(Arc::new(False));
        registry.register(Arc::new(Env));
        registry.register(Arc::new(Unset));
        registry.register(Arc::new(History));
        registry
    }

    /// Add or replace a command under its own name.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Commands per category, each list sorted by name.
    pub fn by_category(&self) -> BTreeMap<Category, Vec<Arc<dyn Command>>> {
        let mut groups: BTreeMap<Category, Vec<Arc<dyn Command>>> = BTreeMap::new();
        for command in self.commands.values() {
            groups.entry(command.category()).or_default().push(Arc::clone(command));
        }
        for list in groups.values_mut() {
            list.sort_by(|a, b| a.name().cmp(b.name()));
        }
        groups
    }
}

/// Split leading `-xyz` flag clusters from operands. `--` ends the flags.
pub(crate) fn split_flags(args: &[String]) -> (Vec<char>, Vec<&str>) {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    let mut flags_done = false;
    for arg in args {
        if !flags_done && arg == "--" {
            flags_done = true;
        } else if !flags_done && arg.len() > 1 && arg.starts_with('-') {
            flags.extend(arg[1..].chars());
        } else {
            operands.push(arg.as_str());
        }
    }
    (flags, operands)
}
