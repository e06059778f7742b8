use async_trait::async_trait;
use wsh_client::{FileKind, RemoteError};

use super::{split_flags, Category, Command, CommandContext};
use crate::error::ShellResult;

pub struct Pwd;

#[async_trait]
impl Command for Pwd {
    fn name(&self) -> &str {
        "pwd"
    }

    fn help(&self) -> &str {
        "Print the current directory"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[String]) -> ShellResult<i32> {
        let cwd = ctx.state.cwd.clone();
        ctx.outln(&cwd);
        Ok(0)
    }
}

pub struct Cd;

#[async_trait]
impl Command for Cd {
    fn name(&self) -> &str {
        "cd"
    }

    fn help(&self) -> &str {
        "Change the current directory (no argument: home, '-': previous)"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        let target = match args.first().map(String::as_str) {
            None => ctx.state.home.clone(),
            Some("-") => {
                if !ctx.state.vars.contains("OLDPWD") {
                    ctx.errln("cd: OLDPWD not set");
                    return Ok(1);
                }
                let previous = ctx.state.vars.get("OLDPWD");
                ctx.outln(&previous);
                previous
            }
            Some(path) => ctx.state.resolve_path(path),
        };

        match ctx.session.stat(&target).await {
            Ok(Some(entry)) if entry.is_dir() => {
                ctx.state.set_cwd(&target);
                Ok(0)
            }
            Ok(Some(_)) => {
                ctx.errln(&format!("cd: {target}: Not a directory"));
                Ok(1)
            }
            Ok(None) => {
                ctx.errln(&format!("cd: {target}: No such file or directory"));
                Ok(1)
            }
            Err(e) => {
                ctx.errln(&format!("cd: {target}: {}", e.reason()));
                Ok(1)
            }
        }
    }
}

pub struct Ls;

#[async_trait]
impl Command for Ls {
    fn name(&self) -> &str {
        "ls"
    }

    fn help(&self) -> &str {
        "List directory contents (-l long format, -a show hidden)"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        let (flags, operands) = split_flags(args);
        let long_format = flags.contains(&'l');
        let show_hidden = flags.contains(&'a');
        let paths = if operands.is_empty() { vec!["."] } else { operands };
        let show_headers = paths.len() > 1;

        let mut status = 0;
        for (i, path) in paths.iter().enumerate() {
            let full_path = ctx.state.resolve_path(path);
            let mut entries = match ctx.session.list(&full_path).await {
                Ok(entries) => entries,
                Err(e) => {
                    ctx.errln(&format!("ls: {path}: {}", e.reason()));
                    status = 1;
                    continue;
                }
            };
            entries.sort_by(|a, b| a.name.cmp(&b.name));

            if show_headers {
                if i > 0 {
                    ctx.outln("");
                }
                ctx.outln(&format!("{path}:"));
            }
            for entry in entries {
                if !show_hidden && entry.name.starts_with('.') {
                    continue;
                }
                if long_format {
                    let type_char = match entry.kind {
                        FileKind::Directory => 'd',
                        FileKind::Symlink => 'l',
                        FileKind::File => '-',
                    };
                    ctx.outln(&format!("{type_char} {:>10} {}", entry.size, entry.name));
                } else {
                    ctx.outln(&entry.name);
                }
            }
        }
        Ok(status)
    }
}

pub struct Cat;

#[async_trait]
impl Command for Cat {
    fn name(&self) -> &str {
        "cat"
    }

    fn help(&self) -> &str {
        "Print file contents"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        if args.is_empty() {
            ctx.errln("cat: missing file operand");
            return Ok(1);
        }
        let mut status = 0;
        for path in args {
            let full_path = ctx.state.resolve_path(path);
            match ctx.session.read(&full_path).await {
                Ok(data) => ctx.stdout.extend_from_slice(&data),
                Err(e) => {
                    ctx.errln(&format!("cat: {path}: {}", e.reason()));
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

pub struct Rm;

#[async_trait]
impl Command for Rm {
    fn name(&self) -> &str {
        "rm"
    }

    fn help(&self) -> &str {
        "Remove files or directories (-r recursive, -f ignore missing)"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        let (flags, operands) = split_flags(args);
        let recursive = flags.iter().any(|f| matches!(f, 'r' | 'R'));
        let force = flags.contains(&'f');
        if operands.is_empty() {
            if force {
                return Ok(0);
            }
            ctx.errln("rm: missing operand");
            return Ok(1);
        }

        let mut status = 0;
        for path in operands {
            let full_path = ctx.state.resolve_path(path);
            if !recursive {
                if let Ok(Some(entry)) = ctx.session.stat(&full_path).await {
                    if entry.is_dir() {
                        ctx.errln(&format!("rm: {path}: is a directory"));
                        status = 1;
                        continue;
                    }
                }
            }
            match ctx.session.delete(&full_path, recursive).await {
                Ok(()) => {}
                Err(RemoteError::NotFound(_)) if force => {}
                Err(e) => {
                    ctx.errln(&format!("rm: {path}: {}", e.reason()));
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

pub struct Mkdir;

#[async_trait]
impl Command for Mkdir {
    fn name(&self) -> &str {
        "mkdir"
    }

    fn help(&self) -> &str {
        "Create directories (-p create parents, no error if existing)"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        let (flags, operands) = split_flags(args);
        let parents = flags.contains(&'p');
        if operands.is_empty() {
            ctx.errln("mkdir: missing operand");
            return Ok(1);
        }
        let mut status = 0;
        for path in operands {
            let full_path = ctx.state.resolve_path(path);
            match ctx.session.make_dir(&full_path, parents).await {
                Ok(()) => {}
                Err(RemoteError::AlreadyExists(_)) if parents => {}
                Err(e) => {
                    ctx.errln(&format!("mkdir: {path}: {}", e.reason()));
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

pub struct Touch;

#[async_trait]
impl Command for Touch {
    fn name(&self) -> &str {
        "touch"
    }

    fn help(&self) -> &str {
        "Create empty files"
    }

    fn category(&self) -> Category {
        Category::Filesystem
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        if args.is_empty() {
            ctx.errln("touch: missing file operand");
            return Ok(1);
        }
        let mut status = 0;
        for path in args {
            let full_path = ctx.state.resolve_path(path);
            // Existing files keep their content
            let result = match ctx.session.stat(&full_path).await {
                Ok(Some(_)) => Ok(()),
                Ok(None) => ctx.session.write(&full_path, b"", false).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                ctx.errln(&format!("touch: {path}: {}", e.reason()));
                status = 1;
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use bytes::Bytes;
    use wsh_client::{MemorySession, RemoteSession};

    fn harness() -> Harness {
        Harness::new(
            MemorySession::new()
                .with_dir("/root")
                .with_file("/root/a.txt", "alpha\n")
                .with_file("/root/.hidden", "")
                .with_file("/srv/data/b.txt", "beta"),
        )
    }

    #[tokio::test]
    async fn test_pwd_and_cd() {
        let mut h = harness();
        assert_eq!(h.run(&Pwd, &[]).await, 0);
        assert_eq!(h.out(), "/root\n");

        assert_eq!(h.run(&Cd, &["/srv/data"]).await, 0);
        assert_eq!(h.state.cwd, "/srv/data");
        assert_eq!(h.state.vars.get("PWD"), "/srv/data");

        assert_eq!(h.run(&Cd, &[".."]).await, 0);
        assert_eq!(h.state.cwd, "/srv");

        assert_eq!(h.run(&Cd, &["-"]).await, 0);
        assert_eq!(h.state.cwd, "/srv/data");
        assert_eq!(h.out(), "/srv/data\n");

        assert_eq!(h.run(&Cd, &[]).await, 0);
        assert_eq!(h.state.cwd, "/root");
    }

    #[tokio::test]
    async fn test_cd_errors() {
        let mut h = harness();
        assert_eq!(h.run(&Cd, &["nope"]).await, 1);
        assert_eq!(h.err(), "cd: /root/nope: No such file or directory\n");
        assert_eq!(h.run(&Cd, &["a.txt"]).await, 1);
        assert_eq!(h.err(), "cd: /root/a.txt: Not a directory\n");
        assert_eq!(h.state.cwd, "/root");
    }

    #[tokio::test]
    async fn test_ls_formats() {
        let mut h = harness();
        assert_eq!(h.run(&Ls, &[]).await, 0);
        assert_eq!(h.out(), "a.txt\n");

        h.run(&Ls, &["-a"]).await;
        assert_eq!(h.out(), ".hidden\na.txt\n");

        h.run(&Ls, &["-l", "/srv"]).await;
        assert_eq!(h.out(), format!("d {:>10} data\n", 0));

        assert_eq!(h.run(&Ls, &["/missing"]).await, 1);
        assert!(h.err().starts_with("ls: /missing:"));
    }

    #[tokio::test]
    async fn test_cat() {
        let mut h = harness();
        assert_eq!(h.run(&Cat, &["a.txt", "/srv/data/b.txt"]).await, 0);
        assert_eq!(h.out(), "alpha\nbeta");
        assert_eq!(h.run(&Cat, &["gone"]).await, 1);
    }

    #[tokio::test]
    async fn test_rm() {
        let mut h = harness();
        assert_eq!(h.run(&Rm, &["/srv/data"]).await, 1);
        assert_eq!(h.err(), "rm: /srv/data: is a directory\n");
        assert_eq!(h.run(&Rm, &["-r", "/srv/data"]).await, 0);
        assert!(!h.session.exists("/srv/data/b.txt").await.unwrap());

        assert_eq!(h.run(&Rm, &["gone"]).await, 1);
        assert_eq!(h.run(&Rm, &["-f", "gone"]).await, 0);
    }

    #[tokio::test]
    async fn test_mkdir_and_touch() {
        let mut h = harness();
        assert_eq!(h.run(&Mkdir, &["x/y"]).await, 1);
        assert_eq!(h.run(&Mkdir, &["-p", "x/y"]).await, 0);
        assert_eq!(h.run(&Mkdir, &["-p", "x/y"]).await, 0);
        assert!(h.session.is_dir("/root/x/y").await.unwrap());

        assert_eq!(h.run(&Touch, &["x/y/new", "a.txt"]).await, 0);
        assert_eq!(h.session.file("/root/x/y/new"), Some(Bytes::new()));
        assert_eq!(h.session.file("/root/a.txt"), Some(Bytes::from("alpha\n")));
    }
}
