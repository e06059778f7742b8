//! Sequential pipeline executor
//!
//! Groups run left to right. A pipe hands the captured stdout of one stage to
//! the next; only the text filters in [`crate::emulate`] may consume it.

use wsh_client::RemoteError;

use crate::commands::CommandContext;
use crate::emulate;
use crate::error::{ShellError, ShellResult};
use crate::glob;
use crate::help;
use crate::lexer::{tokenize_line, Token, Word};
use crate::parser::{ChainOp, CommandGroup, CommandLine, ForLoop, RedirectKind, Stage, Statement};
use crate::shell::Shell;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Captured sinks of one stage run.
#[derive(Debug, Default)]
struct StageOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Shell {
    pub async fn run_statement(&mut self, statement: &Statement) -> ShellResult<i32> {
        match statement {
            Statement::Commands(line) => self.execute(line).await,
            Statement::For(for_loop) => self.run_for(for_loop).await,
        }
    }

    /// Run the body once per item. The loop status is the last non-zero
    /// body status, or 0.
    async fn run_for(&mut self, for_loop: &ForLoop) -> ShellResult<i32> {
        let items = self.loop_items(&for_loop.items).await;
        tracing::debug!(variable = %for_loop.variable, items = items.len(), "for loop");
        let mut status = 0;
        for item in items {
            self.state.vars.set(&for_loop.variable, &item);
            let code = self.execute(&for_loop.body).await?;
            if code != 0 {
                status = code;
            }
        }
        self.set_last_exit_code(status);
        Ok(status)
    }

    /// Expand loop items. Unquoted values split on whitespace, a `{a,b}`
    /// list splits on commas and a `(a b)` wrapper is dropped.
    async fn loop_items(&self, words: &[Word]) -> Vec<String> {
        let mut items = Vec::new();
        for word in words {
            let expanded = self.expand_words(std::slice::from_ref(word)).await;
            if word.quoted {
                items.extend(expanded);
            } else {
                items.extend(
                    expanded
                        .iter()
                        .flat_map(|value| value.split_whitespace().map(str::to_string)),
                );
            }
        }

        let joined = items.concat();
        if let Some(list) = joined.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            return list
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect();
        }
        let wrapped = items.first().is_some_and(|s| s.starts_with('('))
            && items.last().is_some_and(|s| s.ends_with(')'));
        if wrapped {
            if let Some(first) = items.first_mut() {
                first.remove(0);
            }
            if let Some(last) = items.last_mut() {
                last.pop();
            }
            items.retain(|item| !item.is_empty());
        }
        items
    }

    /// Run a parsed line and return the status of the last group that ran.
    pub async fn execute(&mut self, line: &CommandLine) -> ShellResult<i32> {
        let mut status = self.last_exit_code();
        let mut pending: Option<ChainOp> = None;

        for group in &line.groups {
            let run = match pending {
                Some(ChainOp::And) => status == 0,
                Some(ChainOp::Or) => status != 0,
                Some(ChainOp::Semicolon) | None => true,
            };
            // A skipped group hands its own operator on, so `false && a || b` runs `b`
            pending = group.chain;
            if !run {
                tracing::debug!(stages = group.stages.len(), "group short-circuited");
                continue;
            }
            status = self.run_group(group).await?;
            self.set_last_exit_code(status);
        }
        Ok(status)
    }

    async fn run_group(&mut self, group: &CommandGroup) -> ShellResult<i32> {
        let last = group.stages.len().saturating_sub(1);
        let mut piped: Option<Vec<u8>> = None;
        let mut status = 0;

        for (i, stage) in group.stages.iter().enumerate() {
            let mut output = StageOutput::default();
            status = self.run_stage(stage, piped.take(), &mut output).await?;
            self.stderr.write(&output.stderr)?;

            if i < last {
                if matches!(
                    stage.redirect.as_ref().map(|r| r.kind),
                    Some(RedirectKind::Out | RedirectKind::Append)
                ) {
                    tracing::debug!(stage = i, "output redirection on a piped stage ignored");
                }
                piped = Some(output.stdout);
                continue;
            }

            match stage.redirect.as_ref() {
                Some(redirect) if redirect.kind != RedirectKind::In => {
                    let append = redirect.kind == RedirectKind::Append;
                    let target = self.expand_target(&redirect.target);
                    if let Err(e) = self.write_redirect(&target, &output.stdout, append).await {
                        self.stderr
                            .writeln(&format!("wsh: Error writing to {target}: {e}"))?;
                        status = 1;
                    }
                }
                _ => self.stdout.write(&output.stdout)?,
            }
        }
        Ok(status)
    }

    /// Run one stage into `output`. Only an exit request escapes as `Err`.
    async fn run_stage(
        &mut self,
        stage: &Stage,
        piped: Option<Vec<u8>>,
        output: &mut StageOutput,
    ) -> ShellResult<i32> {
        match self.dispatch_stage(stage, piped, output).await {
            Ok(code) => Ok(code),
            Err(ShellError::Exit(code)) => Err(ShellError::Exit(code)),
            Err(e) => {
                output.stderr.extend_from_slice(format!("wsh: {e}\n").as_bytes());
                Ok(e.exit_code())
            }
        }
    }

    async fn dispatch_stage(
        &mut self,
        stage: &Stage,
        mut piped: Option<Vec<u8>>,
        output: &mut StageOutput,
    ) -> ShellResult<i32> {
        let words = self.apply_alias(&stage.words);

        if let Some(assignments) = words
            .iter()
            .map(Word::split_assignment)
            .collect::<Option<Vec<_>>>()
        {
            for (name, value) in assignments {
                let value = value.expand(&self.state.vars).text;
                tracing::debug!(name = %name, "assignment");
                self.state.vars.set(&name, &value);
            }
            return Ok(0);
        }

        let argv = self.expand_words(&words).await;
        let Some((name, args)) = argv.split_first() else {
            return Ok(0);
        };
        tracing::debug!(command = %name, args = args.len(), piped = piped.is_some(), "stage");

        match name.as_str() {
            "exit" => {
                let code = match args.first() {
                    None => self.last_exit_code(),
                    Some(arg) => arg.parse().map_err(|_| {
                        ShellError::InvalidArgument(format!("exit: {arg}: numeric argument required"))
                    })?,
                };
                return Err(ShellError::Exit(code));
            }
            "help" => {
                let group = (!args.is_empty()).then(|| args.join(" "));
                return match help::render(&self.registry, group.as_deref()) {
                    Ok(text) => {
                        output.stdout.extend_from_slice(text.as_bytes());
                        Ok(0)
                    }
                    Err(message) => {
                        output.stderr.extend_from_slice(format!("{message}\n").as_bytes());
                        Ok(1)
                    }
                };
            }
            "clear" => {
                output.stdout.extend_from_slice(CLEAR_SCREEN.as_bytes());
                return Ok(0);
            }
            _ => {}
        }

        if let Some(redirect) = stage.redirect.as_ref().filter(|r| r.kind == RedirectKind::In) {
            let target = self.expand_target(&redirect.target);
            let path = self.state.resolve_path(&target);
            match self.session.read(&path).await {
                Ok(data) => piped = Some(data.to_vec()),
                Err(e) => {
                    output
                        .stderr
                        .extend_from_slice(format!("wsh: Error reading from {target}: {e}\n").as_bytes());
                    return Ok(1);
                }
            }
        }

        if let Some(input) = piped.as_deref() {
            if emulate::is_emulated(name) {
                let result = emulate::run(name, args, input)?;
                output.stdout.extend_from_slice(result.stdout.as_bytes());
                return Ok(result.exit_code);
            }
            tracing::debug!(command = %name, "piped input dropped");
        }

        let command = self
            .registry
            .get(name)
            .ok_or_else(|| ShellError::CommandNotFound(name.clone()))?;
        let mut ctx = CommandContext {
            session: self.session.as_ref(),
            state: &mut self.state,
            history: &mut self.history,
            stdout: &mut output.stdout,
            stderr: &mut output.stderr,
        };
        command.execute(&mut ctx, args).await
    }

    /// Replace an aliased command name with its definition, once.
    fn apply_alias(&self, words: &[Word]) -> Vec<Word> {
        let Some(value) = words
            .first()
            .and_then(Word::plain)
            .and_then(|name| self.state.aliases.get(name))
        else {
            return words.to_vec();
        };
        let mut expanded: Vec<Word> = tokenize_line(value)
            .into_iter()
            .filter_map(|token| match token {
                Token::Word(w) => Some(w),
                _ => None,
            })
            .collect();
        expanded.extend_from_slice(&words[1..]);
        expanded
    }

    /// Expand variables, then wildcards. A pattern with no match stays literal.
    async fn expand_words(&self, words: &[Word]) -> Vec<String> {
        let mut argv = Vec::with_capacity(words.len());
        for word in words {
            let expanded = word.expand(&self.state.vars);
            if expanded.text.is_empty() && !word.quoted {
                continue;
            }
            if let Some(pattern) = &expanded.pattern {
                let matches = glob::expand(self.session.as_ref(), pattern, &self.state).await;
                tracing::debug!(pattern = %pattern, matches = matches.len(), "glob");
                if !matches.is_empty() {
                    argv.extend(matches);
                    continue;
                }
            }
            argv.push(expanded.text);
        }
        argv
    }

    fn expand_target(&self, target: &Word) -> String {
        target.expand(&self.state.vars).text
    }

    async fn write_redirect(&self, target: &str, data: &[u8], append: bool) -> ShellResult<()> {
        let path = self.state.resolve_path(target);
        tracing::debug!(path = %path, append, bytes = data.len(), "redirect");
        let content = if append {
            match self.session.read(&path).await {
                Ok(existing) => {
                    let mut combined = existing.to_vec();
                    combined.extend_from_slice(data);
                    combined
                }
                Err(RemoteError::NotFound(_)) => data.to_vec(),
                Err(e) => return Err(e.into()),
            }
        } else {
            data.to_vec()
        };
        self.session.write(&path, &content, true).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use wsh_client::{ExecOutput, ExecRequest, MemorySession};

    use crate::shell::{CapturedOutput, Shell};

    fn shell_with(session: MemorySession) -> (Shell, Arc<MemorySession>) {
        let session = Arc::new(session.with_dir("/root"));
        let shell = Shell::builder(session.clone())
            .env_fallback(false)
            .capture(true)
            .build();
        (shell, session)
    }

    async fn run(shell: &mut Shell, line: &str) -> CapturedOutput {
        shell.execute_capture(line).await.unwrap()
    }

    #[tokio::test]
    async fn test_and_short_circuit_then_semicolon() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "false && echo A; echo B").await;
        assert_eq!(out.stdout, "B\n");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_or_chain() {
        let (mut shell, _) = shell_with(MemorySession::new());
        assert_eq!(run(&mut shell, "true || echo A").await.stdout, "");
        assert_eq!(run(&mut shell, "false || echo A").await.stdout, "A\n");
        assert_eq!(run(&mut shell, "false && echo A || echo B").await.stdout, "B\n");
        assert_eq!(run(&mut shell, "true || echo A && echo B").await.stdout, "B\n");
    }

    #[tokio::test]
    async fn test_status_variable() {
        let (mut shell, _) = shell_with(MemorySession::new());
        run(&mut shell, "false").await;
        assert_eq!(run(&mut shell, "echo $?").await.stdout, "1\n");
        assert_eq!(run(&mut shell, "echo $?").await.stdout, "0\n");
    }

    #[tokio::test]
    async fn test_pipe_into_emulated_filter() {
        let (mut shell, _) = shell_with(MemorySession::new());
        assert_eq!(run(&mut shell, "echo hi | sort").await.stdout, "hi\n");
        let out = run(&mut shell, "echo one two three | wc -w").await;
        assert_eq!(out.stdout, "       3\n");
    }

    #[tokio::test]
    async fn test_piped_filter_error_is_stage_error() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "echo a | grep").await;
        assert_eq!(out.stderr, "wsh: grep: missing pattern\n");
        assert_eq!(out.exit_code, 1);
    }

    #[tokio::test]
    async fn test_redirect_out_and_append() {
        let (mut shell, session) = shell_with(MemorySession::new());
        run(&mut shell, "echo hi > out.txt").await;
        let out = run(&mut shell, "echo bye >> out.txt").await;
        assert_eq!(out.stdout, "");
        assert_eq!(session.file("/root/out.txt"), Some(Bytes::from("hi\nbye\n")));

        run(&mut shell, "echo new > deep/dir/f").await;
        assert_eq!(session.file("/root/deep/dir/f"), Some(Bytes::from("new\n")));
    }

    #[tokio::test]
    async fn test_redirect_in_overrides_pipe() {
        let (mut shell, _) =
            shell_with(MemorySession::new().with_file("/root/in.txt", "b\na\n"));
        assert_eq!(run(&mut shell, "sort < in.txt").await.stdout, "a\nb\n");
        assert_eq!(run(&mut shell, "echo z | sort < in.txt").await.stdout, "a\nb\n");

        let out = run(&mut shell, "sort < missing").await;
        assert!(out.stderr.starts_with("wsh: Error reading from missing:"));
        assert_eq!(out.exit_code, 1);
    }

    #[tokio::test]
    async fn test_glob_expansion() {
        let (mut shell, _) = shell_with(
            MemorySession::new()
                .with_file("/root/a.txt", "")
                .with_file("/root/b.log", ""),
        );
        assert_eq!(run(&mut shell, "echo *.txt").await.stdout, "a.txt\n");
        assert_eq!(run(&mut shell, "echo *.md").await.stdout, "*.md\n");
        assert_eq!(run(&mut shell, "echo '*.txt'").await.stdout, "*.txt\n");
    }

    #[tokio::test]
    async fn test_tilde_glob_from_other_directory() {
        let (mut shell, _) = shell_with(
            MemorySession::new()
                .with_file("/root/a.txt", "")
                .with_dir("/tmp"),
        );
        run(&mut shell, "cd /tmp").await;
        assert_eq!(run(&mut shell, "echo ~/*.txt").await.stdout, "~/a.txt\n");
        assert_eq!(run(&mut shell, "echo ~/*.md").await.stdout, "~/*.md\n");
    }

    #[tokio::test]
    async fn test_command_not_found() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "zz").await;
        assert_eq!(out.stderr, "wsh: Command not found: zz\n");
        assert_eq!(out.exit_code, 127);
        assert_eq!(run(&mut shell, "zz || echo recovered").await.stdout, "recovered\n");
    }

    #[tokio::test]
    async fn test_assignment() {
        let (mut shell, _) = shell_with(MemorySession::new());
        run(&mut shell, "X=1 Y='a b'").await;
        assert_eq!(run(&mut shell, "echo $X ${X} [$Y] $Z").await.stdout, "1 1 [a b]\n");
    }

    #[tokio::test]
    async fn test_empty_unquoted_expansion_drops_argument() {
        let (mut shell, _) = shell_with(MemorySession::new());
        assert_eq!(run(&mut shell, "echo $NOPE x").await.stdout, "x\n");
        assert_eq!(run(&mut shell, "echo \"$NOPE\" x").await.stdout, " x\n");
        assert_eq!(run(&mut shell, "$NOPE").await.exit_code, 0);
    }

    #[tokio::test]
    async fn test_alias_expansion() {
        let (mut shell, _) = shell_with(MemorySession::new().with_file("/root/a", ""));
        assert_eq!(run(&mut shell, "l").await.stdout, "a\n");
        let out = run(&mut shell, "ll").await;
        assert!(out.stdout.starts_with("- "));
    }

    #[tokio::test]
    async fn test_exit_propagates() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let err = shell.execute_capture("echo a; exit 3; echo b").await.unwrap_err();
        assert!(matches!(err, crate::ShellError::Exit(3)));
        assert!(matches!(
            shell.execute_capture("q 4").await.unwrap_err(),
            crate::ShellError::Exit(4)
        ));
        run(&mut shell, "false").await;
        assert!(matches!(
            shell.execute_capture("exit").await.unwrap_err(),
            crate::ShellError::Exit(1)
        ));
    }

    #[tokio::test]
    async fn test_help_and_clear() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "help nothing").await;
        assert_eq!(out.stderr, "No command group found matching 'nothing'.\n");
        assert_eq!(out.exit_code, 1);

        assert_eq!(run(&mut shell, "clear").await.stdout, "\x1b[2J\x1b[H");
        let out = run(&mut shell, "help | grep exit").await;
        assert!(out.stdout.contains("exit"));
    }

    #[tokio::test]
    async fn test_remote_exec_status() {
        let session = MemorySession::new().with_program("fail", |_req: &ExecRequest| ExecOutput {
            stdout: Bytes::new(),
            stderr: Bytes::from_static(b"boom\n"),
            exit_code: 3,
        });
        let (mut shell, _) = shell_with(session);
        let out = run(&mut shell, "exec fail").await;
        assert_eq!(out.stderr, "boom\n");
        assert_eq!(out.exit_code, 3);
        assert_eq!(run(&mut shell, "echo $?").await.stdout, "3\n");
    }

    #[tokio::test]
    async fn test_pipe_then_final_redirect() {
        let (mut shell, session) = shell_with(MemorySession::new());
        let out = run(&mut shell, "echo b | sort > f").await;
        assert_eq!(out.stdout, "");
        assert_eq!(out.exit_code, 0);
        assert_eq!(session.file("/root/f"), Some(Bytes::from("b\n")));
    }

    #[tokio::test]
    async fn test_redirect_on_piped_stage_is_ignored() {
        let (mut shell, session) = shell_with(MemorySession::new());
        let out = run(&mut shell, "echo a > x | sort").await;
        assert_eq!(out.stdout, "a\n");
        assert_eq!(session.file("/root/x"), None);
    }

    #[tokio::test]
    async fn test_piped_input_to_plain_command_is_dropped() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "echo a | pwd").await;
        assert_eq!(out.stdout, "/root\n");
        assert_eq!(out.stderr, "");
        assert_eq!(run(&mut shell, "echo a | echo b").await.stdout, "b\n");
    }

    #[tokio::test]
    async fn test_for_loop_runs_body_per_item() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "for x in a b; do echo $x; done").await;
        assert_eq!(out.stdout, "a\nb\n");
        assert_eq!(out.stderr, "");
        assert_eq!(run(&mut shell, "echo $x").await.stdout, "b\n");
    }

    #[tokio::test]
    async fn test_for_loop_item_forms() {
        let (mut shell, _) = shell_with(
            MemorySession::new()
                .with_file("/root/a.txt", "")
                .with_file("/root/b.txt", ""),
        );
        let line = "for f in *.txt; do echo \"[$f]\"; done";
        assert_eq!(run(&mut shell, line).await.stdout, "[a.txt]\n[b.txt]\n");
        let line = "for i in {1, 2,3}; do echo $i; done";
        assert_eq!(run(&mut shell, line).await.stdout, "1\n2\n3\n");
        let line = "for i in (x y); do echo $i; done";
        assert_eq!(run(&mut shell, line).await.stdout, "x\ny\n");
        let line = "for i in 'p q' r; do echo \"[$i]\"; done";
        assert_eq!(run(&mut shell, line).await.stdout, "[p q]\n[r]\n");

        run(&mut shell, "L='m n'").await;
        let line = "for i in $L; do echo \"[$i]\"; done";
        assert_eq!(run(&mut shell, line).await.stdout, "[m]\n[n]\n");
    }

    #[tokio::test]
    async fn test_for_loop_status_and_exit() {
        let (mut shell, _) = shell_with(MemorySession::new());
        let out = run(&mut shell, "for c in 1 2; do zz$c; done").await;
        assert_eq!(out.exit_code, 127);
        assert_eq!(out.stderr, "wsh: Command not found: zz1\nwsh: Command not found: zz2\n");

        let out = run(&mut shell, "for c in a b; do false; echo $c; done").await;
        assert_eq!(out.exit_code, 0);
        assert_eq!(run(&mut shell, "for c in a; do false; done").await.exit_code, 1);
        assert_eq!(run(&mut shell, "for c in; do false; done").await.exit_code, 0);

        let err = shell
            .execute_capture("for c in 5 6; do exit $c; done")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ShellError::Exit(5)));
    }

    #[tokio::test]
    async fn test_stderr_emitted_under_redirection() {
        let (mut shell, session) = shell_with(MemorySession::new());
        let out = run(&mut shell, "cat nothing > out.txt").await;
        assert!(out.stderr.starts_with("cat: nothing:"));
        assert_eq!(out.exit_code, 1);
        assert_eq!(session.file("/root/out.txt"), Some(Bytes::new()));
    }
}
