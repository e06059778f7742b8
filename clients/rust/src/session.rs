use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{RemoteError, Result};
use crate::types::{base_name, parent_path, ExecChunk, ExecOutput, ExecRequest, FileEntry, FileKind};

/// File and process access to one remote workload.
///
/// Every call is a single round trip. Callers await them one at a time;
/// implementations need not order concurrent calls.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// List a directory. Listing a regular file yields just that file.
    async fn list(&self, path: &str) -> Result<Vec<FileEntry>>;

    async fn read(&self, path: &str) -> Result<Bytes>;

    async fn write(&self, path: &str, content: &[u8], create_parents: bool) -> Result<()>;

    async fn delete(&self, path: &str, recursive: bool) -> Result<()>;

    async fn make_dir(&self, path: &str, parents: bool) -> Result<()>;

    async fn exec(&self, request: &ExecRequest) -> Result<ExecOutput>;

    /// Run a process, handing output to `sink` as it arrives.
    ///
    /// The default replays the buffered result as at most two chunks.
    async fn exec_streamed(
        &self,
        request: &ExecRequest,
        sink: &mut (dyn FnMut(ExecChunk) + Send),
    ) -> Result<i32> {
        let output = self.exec(request).await?;
        if !output.stdout.is_empty() {
            sink(ExecChunk::Stdout(output.stdout));
        }
        if !output.stderr.is_empty() {
            sink(ExecChunk::Stderr(output.stderr));
        }
        Ok(output.exit_code)
    }

    /// Look up a single path through its parent listing.
    async fn stat(&self, path: &str) -> Result<Option<FileEntry>> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Some(FileEntry {
                name: "/".to_string(),
                path: "/".to_string(),
                kind: FileKind::Directory,
                size: 0,
            }));
        }
        let name = base_name(trimmed);
        match self.list(parent_path(trimmed)).await {
            Ok(entries) => Ok(entries.into_iter().find(|e| e.name == name)),
            Err(RemoteError::NotFound(_) | RemoteError::NotDirectory(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some_and(|e| e.is_dir()))
    }
}
