//! Per-session mutable state shared with commands

use std::collections::BTreeMap;

use crate::vars::ShellVariables;

pub struct SessionState {
    pub cwd: String,
    pub home: String,
    pub user: String,
    pub vars: ShellVariables,
    pub aliases: BTreeMap<String, String>,
}

impl SessionState {
    pub fn new(home: &str, user: &str) -> Self {
        let mut vars = ShellVariables::new();
        vars.set("HOME", home);
        vars.set("USER", user);
        vars.set("PWD", home);
        Self {
            cwd: home.to_string(),
            home: home.to_string(),
            user: user.to_string(),
            vars,
            aliases: default_aliases(),
        }
    }

    /// Move to an already resolved absolute directory.
    pub fn set_cwd(&mut self, path: &str) {
        let previous = std::mem::replace(&mut self.cwd, path.to_string());
        self.vars.set("OLDPWD", &previous);
        self.vars.set("PWD", path);
    }

    /// Absolute remote path for `path`, with `~` meaning the home directory.
    pub fn resolve_path(&self, path: &str) -> String {
        let joined = if path == "~" {
            self.home.clone()
        } else if let Some(rest) = path.strip_prefix("~/") {
            format!("{}/{rest}", self.home)
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{path}", self.cwd)
        };
        normalize(&joined)
    }

    /// `cwd` with the home prefix shown as `~`.
    pub fn display_cwd(&self) -> String {
        if self.cwd == self.home {
            return "~".to_string();
        }
        match self.cwd.strip_prefix(&self.home) {
            Some(rest) if self.home != "/" && rest.starts_with('/') => format!("~{rest}"),
            _ => self.cwd.clone(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new("/root", "root")
    }
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("ll", "ls -l"),
        ("la", "ls -a"),
        ("l", "ls"),
        ("h", "history"),
        ("c", "clear"),
        ("q", "exit"),
        ("?", "help"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Collapse `.`, `..` and repeated slashes in an absolute path.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}
