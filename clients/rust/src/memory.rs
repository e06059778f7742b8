use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{RemoteError, Result};
use crate::session::RemoteSession;
use crate::types::{base_name, join_path, parent_path, ExecOutput, ExecRequest, FileEntry, FileKind};

/// A fake remote program: receives the request, returns its buffered result.
pub type Program = Arc<dyn Fn(&ExecRequest) -> ExecOutput + Send + Sync>;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Bytes),
}

/// In-process remote session backed by a path-keyed tree.
pub struct MemorySession {
    nodes: RwLock<BTreeMap<String, Node>>,
    programs: HashMap<String, Program>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes: RwLock::new(nodes),
            programs: HashMap::new(),
        }
    }

    /// Add a directory and any missing ancestors.
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        {
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            insert_dirs(&mut nodes, &normalize(path));
        }
        self
    }

    /// Add a file, creating missing ancestors.
    #[must_use]
    pub fn with_file(self, path: &str, content: impl Into<Bytes>) -> Self {
        {
            let path = normalize(path);
            let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
            insert_dirs(&mut nodes, parent_path(&path));
            nodes.insert(path, Node::File(content.into()));
        }
        self
    }

    #[must_use]
    pub fn with_program<F>(mut self, name: &str, program: F) -> Self
    where
        F: Fn(&ExecRequest) -> ExecOutput + Send + Sync + 'static,
    {
        self.programs.insert(name.to_string(), Arc::new(program));
        self
    }

    /// Current content of a file, if present. Test helper.
    pub fn file(&self, path: &str) -> Option<Bytes> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&normalize(path)) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }
}

fn normalize(path: &str) -> String {
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

fn insert_dirs(nodes: &mut BTreeMap<String, Node>, path: &str) {
    let mut current = String::from("/");
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current = join_path(&current, part);
        nodes.entry(current.clone()).or_insert(Node::Dir);
    }
}

fn entry_for(path: &str, node: &Node) -> FileEntry {
    let (kind, size) = match node {
        Node::Dir => (FileKind::Directory, 0),
        Node::File(data) => (FileKind::File, data.len() as u64),
    };
    FileEntry {
        name: base_name(path).to_string(),
        path: path.to_string(),
        kind,
        size,
    }
}

fn is_child_of(candidate: &str, dir: &str) -> bool {
    candidate != dir && parent_path(candidate) == dir
}

fn is_descendant_of(candidate: &str, dir: &str) -> bool {
    if dir == "/" {
        return candidate != "/";
    }
    candidate
        .strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let path = normalize(path);
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&path) {
            None => Err(RemoteError::NotFound(path)),
            Some(node @ Node::File(_)) => Ok(vec![entry_for(&path, node)]),
            Some(Node::Dir) => Ok(nodes
                .iter()
                .filter(|(p, _)| is_child_of(p, &path))
                .map(|(p, n)| entry_for(p, n))
                .collect()),
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let path = normalize(path);
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&path) {
            None => Err(RemoteError::NotFound(path)),
            Some(Node::Dir) => Err(RemoteError::IsDirectory(path)),
            Some(Node::File(data)) => Ok(data.clone()),
        }
    }

    async fn write(&self, path: &str, content: &[u8], create_parents: bool) -> Result<()> {
        let path = normalize(path);
        let parent = parent_path(&path).to_string();
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&parent) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(RemoteError::NotDirectory(parent)),
            None if create_parents => insert_dirs(&mut nodes, &parent),
            None => return Err(RemoteError::NotFound(parent)),
        }
        if matches!(nodes.get(&path), Some(Node::Dir)) {
            return Err(RemoteError::IsDirectory(path));
        }
        nodes.insert(path, Node::File(Bytes::copy_from_slice(content)));
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let path = normalize(path);
        if path == "/" {
            return Err(RemoteError::PermissionDenied(path));
        }
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        match nodes.get(&path) {
            None => return Err(RemoteError::NotFound(path)),
            Some(Node::File(_)) => {}
            Some(Node::Dir) => {
                let has_children = nodes.keys().any(|p| is_descendant_of(p, &path));
                if has_children && !recursive {
                    return Err(RemoteError::DirectoryNotEmpty(path));
                }
                nodes.retain(|p, _| !is_descendant_of(p, &path));
            }
        }
        nodes.remove(&path);
        Ok(())
    }

    async fn make_dir(&self, path: &str, parents: bool) -> Result<()> {
        let path = normalize(path);
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.contains_key(&path) {
            return Err(RemoteError::AlreadyExists(path));
        }
        let parent = parent_path(&path).to_string();
        match nodes.get(&parent) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(RemoteError::NotDirectory(parent)),
            None if parents => insert_dirs(&mut nodes, &parent),
            None => return Err(RemoteError::NotFound(parent)),
        }
        nodes.insert(path, Node::Dir);
        Ok(())
    }

    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput> {
        let name = request.program();
        if name.is_empty() {
            return Err(RemoteError::InvalidArgument("empty command".to_string()));
        }
        let program = self
            .programs
            .get(name)
            .or_else(|| self.programs.get(base_name(name)))
            .ok_or_else(|| RemoteError::NotFound(name.to_string()))?;
        Ok(program(request))
    }
}
