use async_trait::async_trait;
use wsh_client::{ExecChunk, ExecRequest};

use super::{Category, Command, CommandContext};
use crate::error::ShellResult;

/// Run a program on the remote target, streaming its output.
pub struct Exec;

#[async_trait]
impl Command for Exec {
    fn name(&self) -> &str {
        "exec"
    }

    fn help(&self) -> &str {
        "Run a remote program: exec PROGRAM [ARG]..."
    }

    fn category(&self) -> Category {
        Category::Process
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        if args.is_empty() {
            ctx.errln("exec: missing program");
            return Ok(1);
        }
        let request = ExecRequest::new(args.iter().cloned())
            .cwd(ctx.state.cwd.clone())
            .user(ctx.state.user.clone());
        tracing::debug!(argv = ?request.argv, cwd = %ctx.state.cwd, "remote exec");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut sink = |chunk: ExecChunk| match chunk {
            ExecChunk::Stdout(data) => stdout.extend_from_slice(&data),
            ExecChunk::Stderr(data) => stderr.extend_from_slice(&data),
        };
        let result = ctx.session.exec_streamed(&request, &mut sink).await;
        ctx.stdout.extend_from_slice(&stdout);
        ctx.stderr.extend_from_slice(&stderr);

        match result {
            Ok(code) => Ok(code),
            Err(e) => {
                ctx.errln(&format!("exec: {}: {}", request.program(), e.reason()));
                Ok(if e.is_not_found() { 127 } else { 1 })
            }
        }
    }
}
