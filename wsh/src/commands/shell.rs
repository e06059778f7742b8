use async_trait::async_trait;

use super::{Category, Command, CommandContext};
use crate::error::ShellResult;

pub struct True;

#[async_trait]
impl Command for True {
    fn name(&self) -> &str {
        "true"
    }

    fn help(&self) -> &str {
        "Do nothing, successfully"
    }

    fn category(&self) -> Category {
        Category::Shell
    }

    async fn execute(&self, _ctx: &mut CommandContext<'_>, _args: &[String]) -> ShellResult<i32> {
        Ok(0)
    }
}

pub struct False;

#[async_trait]
impl Command for False {
    fn name(&self) -> &str {
        "false"
    }

    fn help(&self) -> &str {
        "Do nothing, unsuccessfully"
    }

    fn category(&self) -> Category {
        Category::Shell
    }

    async fn execute(&self, _ctx: &mut CommandContext<'_>, _args: &[String]) -> ShellResult<i32> {
        Ok(1)
    }
}

pub struct Env;

#[async_trait]
impl Command for Env {
    fn name(&self) -> &str {
        "env"
    }

    fn help(&self) -> &str {
        "Print session variables"
    }

    fn category(&self) -> Category {
        Category::Shell
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, _args: &[String]) -> ShellResult<i32> {
        let lines: Vec<String> = ctx
            .state
            .vars
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        for line in lines {
            ctx.outln(&line);
        }
        Ok(0)
    }
}

pub struct Unset;

#[async_trait]
impl Command for Unset {
    fn name(&self) -> &str {
        "unset"
    }

    fn help(&self) -> &str {
        "Remove session variables"
    }

    fn category(&self) -> Category {
        Category::Shell
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        for name in args {
            ctx.state.vars.unset(name);
        }
        Ok(0)
    }
}

pub struct History;

impl History {
    fn print_entries(ctx: &mut CommandContext<'_>, skip: usize) {
        let lines: Vec<String> = ctx
            .history
            .numbered()
            .skip(skip)
            .map(|(n, entry)| format!("{n:>5}  {entry}"))
            .collect();
        for line in lines {
            ctx.outln(&line);
        }
    }
}

#[async_trait]
impl Command for History {
    fn name(&self) -> &str {
        "history"
    }

    fn help(&self) -> &str {
        "Show history: history [N | -c | -s PATTERN | --stats]"
    }

    fn category(&self) -> Category {
        Category::Shell
    }

    async fn execute(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> ShellResult<i32> {
        match args.first().map(String::as_str) {
            None => Self::print_entries(ctx, 0),
            Some("-c") => {
                ctx.history.clear();
                ctx.outln("History cleared");
            }
            Some("-s") => {
                let Some(pattern) = args.get(1) else {
                    ctx.errln("history: -s requires a pattern");
                    return Ok(1);
                };
                let found: Vec<String> = ctx
                    .history
                    .search(pattern)
                    .into_iter()
                    .map(ToString::to_string)
                    .collect();
                if found.is_empty() {
                    ctx.outln(&format!("No commands found matching '{pattern}'"));
                }
                for entry in found {
                    ctx.outln(&entry);
                }
            }
            Some("--stats") => {
                let stats = ctx.history.stats();
                ctx.outln(&format!("Total commands: {}", stats.total));
                ctx.outln(&format!("Unique commands: {}", stats.unique));
                if let Some((command, count)) = stats.most_used {
                    ctx.outln(&format!("Most used: {command} ({count} times)"));
                }
            }
            Some(count) => {
                let Ok(count) = count.parse::<usize>() else {
                    ctx.errln(&format!("history: {count}: numeric argument required"));
                    return Ok(1);
                };
                let skip = ctx.history.len().saturating_sub(count);
                Self::print_entries(ctx, skip);
            }
        }
        Ok(0)
    }
}
