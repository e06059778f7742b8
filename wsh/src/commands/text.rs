use async_trait::async_trait;

use super::{Category, Command, CommandContext};
use crate::emulate::TextFilter;
use crate::error::ShellResult;

pub struct Echo;

#[async_trait]
impl Command for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn help(&self) -> &str {
        "Print arguments (-n: no trailing newline)"
    }

    fn category(&self) -> Category {
        Category::Text
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        let (newline, words) = match args.first().map(String::as_str) {
            Some("-n") => (false, &args[1..]),
            _ => (true, args),
        };
        let text = words.join(" ");
        if newline {
            ctx.outln(&text);
        } else {
            ctx.out(&text);
        }
        Ok(0)
    }
}

/// `grep`, `wc`, `sort` or `cut` reading its input from remote files.
pub struct FileFilter {
    name: &'static str,
}

impl FileFilter {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Command for FileFilter {
    fn name(&self) -> &str {
        self.name
    }

    fn help(&self) -> &str {
        match self.name {
            "grep" => "Print lines matching PATTERN or /REGEX/ (-i, -v, -c)",
            "wc" => "Count lines, words and bytes (-l, -w, -c)",
            "sort" => "Sort lines (-r reverse, -n numeric)",
            "cut" => "Select fields: cut -f LIST [-d DELIM]",
            _ => "",
        }
    }

    fn category(&self) -> Category {
        Category::Text
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        let (filter, operands) = TextFilter::parse(self.name, args)?;
        if operands.is_empty() {
            ctx.errln(&format!("{}: no input files", self.name));
            return Ok(1);
        }

        let mut input = Vec::new();
        let mut status = 0;
        for path in &operands {
            let full_path = ctx.state.resolve_path(path);
            match ctx.session.read(&full_path).await {
                Ok(data) => input.extend_from_slice(&data),
                Err(e) => {
                    ctx.errln(&format!("{}: {path}: {}", self.name, e.reason()));
                    status = 2;
                }
            }
        }

        let output = filter.apply(&input);
        ctx.out(&output.stdout);
        Ok(if status == 0 { output.exit_code } else { status })
    }
}
