use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

impl FileKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub kind: FileKind,
    pub size: u64,
}

impl FileEntry {
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }
}

/// A process to run on the remote target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    pub argv: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<String>,
    pub user: Option<String>,
    pub group: Option<String>,
}

impl ExecRequest {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: Bytes,
    pub stderr: Bytes,
    pub exit_code: i32,
}

/// A piece of output delivered while a streamed process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecChunk {
    Stdout(Bytes),
    Stderr(Bytes),
}

// Gateway wire types

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "type", default)]
    #[allow(dead_code)]
    pub kind: String,
    #[serde(rename = "status-code", default)]
    #[allow(dead_code)]
    pub status_code: u16,
    pub result: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResult {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileEntryResponse {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default)]
    pub size: u64,
}

impl From<FileEntryResponse> for FileEntry {
    fn from(resp: FileEntryResponse) -> Self {
        Self {
            name: resp.name,
            path: resp.path,
            kind: resp.kind,
            size: resp.size,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExecBody<'a> {
    pub command: &'a [String],
    #[serde(skip_serializing_if = "no_env")]
    pub environment: &'a BTreeMap<String, String>,
    #[serde(rename = "working-dir", skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn no_env(env: &&BTreeMap<String, String>) -> bool {
    env.is_empty()
}

impl<'a> ExecBody<'a> {
    pub fn new(request: &'a ExecRequest, stream: bool) -> Self {
        Self {
            command: &request.argv,
            environment: &request.env,
            working_dir: request.cwd.as_deref(),
            user: request.user.as_deref(),
            group: request.group.as_deref(),
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(rename = "exit-code")]
    pub exit_code: i32,
}

impl From<ExecResult> for ExecOutput {
    fn from(r: ExecResult) -> Self {
        Self {
            stdout: Bytes::from(r.stdout),
            stderr: Bytes::from(r.stderr),
            exit_code: r.exit_code,
        }
    }
}

/// One line of a streamed exec response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct StreamFrame {
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

/// Parent directory of an absolute remote path (`/` for top-level entries).
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

/// Final component of a remote path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Join a directory and a child name without doubling slashes.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
