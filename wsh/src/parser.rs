//! Command-line parser
//!
//! Turns a lexed line into command groups: runs of pipe-connected stages,
//! each followed by an optional chain operator. A line starting with `for`
//! is a loop over such a command line.

use chumsky::prelude::*;

use crate::error::{ShellError, ShellResult};
use crate::lexer::{tokenize_line, Token, Word};
use crate::vars::is_valid_name;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainOp {
    And,       // &&
    Or,        // ||
    Semicolon, // ;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectKind {
    Out,    // >
    Append, // >>
    In,     // <
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: Word,
}

/// One command invocation within a pipe chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stage {
    pub words: Vec<Word>,
    pub redirect: Option<Redirect>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandGroup {
    pub stages: Vec<Stage>,
    /// Operator following this group on the line.
    pub chain: Option<ChainOp>,
}

/// Classic per-stage classification of a parsed line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Simple,
    Pipe,
    RedirectOut,
    RedirectAppend,
    RedirectIn,
    And,
    Or,
    Semicolon,
}

impl CommandGroup {
    /// Non-final stages are `Pipe`. The final stage takes the trailing chain
    /// operator if any, else its redirection, else `Simple`.
    pub fn kinds(&self) -> Vec<CommandKind> {
        let last = self.stages.len().saturating_sub(1);
        self.stages
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                if i < last {
                    return CommandKind::Pipe;
                }
                match (self.chain, stage.redirect.as_ref().map(|r| r.kind)) {
                    (Some(ChainOp::And), _) => CommandKind::And,
                    (Some(ChainOp::Or), _) => CommandKind::Or,
                    (Some(ChainOp::Semicolon), _) => CommandKind::Semicolon,
                    (None, Some(RedirectKind::Out)) => CommandKind::RedirectOut,
                    (None, Some(RedirectKind::Append)) => CommandKind::RedirectAppend,
                    (None, Some(RedirectKind::In)) => CommandKind::RedirectIn,
                    (None, None) => CommandKind::Simple,
                }
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub groups: Vec<CommandGroup>,
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.groups.iter().flat_map(CommandGroup::kinds).collect()
    }
}

/// `for NAME in ITEMS; do BODY; done`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForLoop {
    pub variable: String,
    /// Expanded when the loop starts.
    pub items: Vec<Word>,
    pub body: CommandLine,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Commands(CommandLine),
    For(ForLoop),
}

#[derive(Default)]
struct Builder {
    groups: Vec<CommandGroup>,
    stages: Vec<Stage>,
    stage: Stage,
    pending: Option<RedirectKind>,
}

impl Builder {
    fn word(&mut self, word: Word) -> ShellResult<()> {
        match self.pending.take() {
            Some(kind) => {
                if self.stage.redirect.is_some() {
                    return Err(ShellError::ParseInconsistency(
                        "only one redirection per command is supported".to_string(),
                    ));
                }
                self.stage.redirect = Some(Redirect { kind, target: word });
            }
            None => self.stage.words.push(word),
        }
        Ok(())
    }

    fn redirect(&mut self, kind: RedirectKind) -> ShellResult<()> {
        if self.pending.is_some() {
            return Err(missing_target());
        }
        self.pending = Some(kind);
        Ok(())
    }

    fn close_stage(&mut self) -> ShellResult<bool> {
        if self.pending.is_some() {
            return Err(missing_target());
        }
        let stage = std::mem::take(&mut self.stage);
        if stage.words.is_empty() {
            if stage.redirect.is_some() {
                return Err(ShellError::ParseInconsistency(
                    "redirection without a command".to_string(),
                ));
            }
            return Ok(false);
        }
        self.stages.push(stage);
        Ok(true)
    }

    fn pipe(&mut self) -> ShellResult<()> {
        if !self.close_stage()? {
            return Err(empty_stage());
        }
        Ok(())
    }

    fn separator(&mut self, chain: Option<ChainOp>) -> ShellResult<()> {
        let closed = self.close_stage()?;
        if !closed && !self.stages.is_empty() {
            // `a | ;`
            return Err(empty_stage());
        }
        if self.stages.is_empty() {
            return Ok(());
        }
        self.groups.push(CommandGroup {
            stages: std::mem::take(&mut self.stages),
            chain,
        });
        Ok(())
    }
}

fn missing_target() -> ShellError {
    ShellError::ParseInconsistency("missing redirection target".to_string())
}

fn empty_stage() -> ShellError {
    ShellError::ParseInconsistency("empty command in pipeline".to_string())
}

/// Parse an already lexed token stream.
pub fn parse_tokens(tokens: Vec<Token>) -> ShellResult<CommandLine> {
    let mut b = Builder::default();
    for token in tokens {
        match token {
            Token::Word(w) => b.word(w)?,
            Token::Pipe => b.pipe()?,
            Token::RedirectOut => b.redirect(RedirectKind::Out)?,
            Token::RedirectAppend => b.redirect(RedirectKind::Append)?,
            Token::RedirectIn => b.redirect(RedirectKind::In)?,
            Token::AndAnd => b.separator(Some(ChainOp::And))?,
            Token::OrOr => b.separator(Some(ChainOp::Or))?,
            Token::Semicolon => b.separator(Some(ChainOp::Semicolon))?,
        }
    }
    b.separator(None)?;
    Ok(CommandLine { groups: b.groups })
}

/// Parse a command line. Variables and globs are left unexpanded.
pub fn parse(line: &str) -> ShellResult<CommandLine> {
    if line.trim().is_empty() {
        return Ok(CommandLine::default());
    }
    parse_tokens(tokenize_line(line))
}

fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.plain() == Some(keyword))
}

fn keyword(name: &'static str) -> impl Parser<Token, Token, Error = Simple<Token>> + Clone {
    filter(move |t: &Token| is_keyword(t, name))
}

/// Loop header and the raw body tokens, `done` stripped.
fn for_loop() -> impl Parser<Token, (String, Vec<Word>, Vec<Token>), Error = Simple<Token>> {
    let variable = filter_map(|span, tok: Token| {
        let name = match &tok {
            Token::Word(w) => w.plain().filter(|n| is_valid_name(n)).map(str::to_string),
            _ => None,
        };
        name.ok_or_else(|| Simple::expected_input_found(span, None, Some(tok)))
    });
    let item = filter_map(|span, tok: Token| match tok {
        Token::Word(w) if w.plain() != Some("do") => Ok(w),
        other => Err(Simple::expected_input_found(span, None, Some(other))),
    });

    // for var in items; do body; done
    keyword("for")
        .ignore_then(variable)
        .then_ignore(keyword("in"))
        .then(item.repeated())
        .then_ignore(just(Token::Semicolon).or_not())
        .then_ignore(keyword("do"))
        .then(any().repeated())
        .then_ignore(end())
        .try_map(|((variable, items), mut body): ((String, Vec<Word>), Vec<Token>), span| {
            if !body.last().is_some_and(|t| is_keyword(t, "done")) {
                return Err(Simple::custom(span, "missing 'done'"));
            }
            body.pop();
            Ok((variable, items, body))
        })
}

/// Parse a line that may be a `for` loop.
pub fn parse_statement(line: &str) -> ShellResult<Statement> {
    let tokens = tokenize_line(line);
    if !tokens.first().is_some_and(|t| is_keyword(t, "for")) {
        return parse_tokens(tokens).map(Statement::Commands);
    }

    let (variable, items, body) = for_loop().parse(tokens).map_err(|errs| {
        tracing::debug!(errors = errs.len(), "for loop did not parse");
        ShellError::ParseInconsistency(
            "invalid for loop syntax, use: for NAME in ITEMS; do COMMANDS; done".to_string(),
        )
    })?;
    let body = parse_tokens(body)?;
    if body.is_empty() {
        return Err(ShellError::ParseInconsistency("empty for loop body".to_string()));
    }
    let nested = body
        .groups
        .iter()
        .flat_map(|g| &g.stages)
        .any(|stage| stage.words.first().and_then(Word::plain) == Some("for"));
    if nested {
        return Err(ShellError::ParseInconsistency("nested for loops are not supported".to_string()));
    }
    Ok(Statement::For(ForLoop {
        variable,
        items,
        body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::ShellVariables;

    fn argv(stage: &Stage) -> Vec<String> {
        let vars = ShellVariables::new();
        stage.words.iter().map(|w| w.expand(&vars).text).collect()
    }

    #[test]
    fn test_empty_line() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_separator_only_is_ignored() {
        assert!(parse(";").unwrap().is_empty());
        assert!(parse(" ; ; ").unwrap().is_empty());
        assert_eq!(parse("; echo hi").unwrap().groups.len(), 1);
    }

    #[test]
    fn test_chain_classification() {
        let line = parse("false && echo A; echo B").unwrap();
        assert_eq!(line.groups.len(), 3);
        assert_eq!(
            line.kinds(),
            vec![CommandKind::And, CommandKind::Semicolon, CommandKind::Simple]
        );
        assert_eq!(argv(&line.groups[1].stages[0]), vec!["echo", "A"]);
    }

    #[test]
    fn test_pipe_chain() {
        let line = parse("ls | grep a | wc -l").unwrap();
        assert_eq!(line.groups.len(), 1);
        assert_eq!(
            line.kinds(),
            vec![CommandKind::Pipe, CommandKind::Pipe, CommandKind::Simple]
        );
        assert_eq!(argv(&line.groups[0].stages[2]), vec!["wc", "-l"]);
    }

    #[test]
    fn test_or_is_not_a_pipe() {
        let line = parse("a || b").unwrap();
        assert_eq!(line.groups.len(), 2);
        assert_eq!(line.groups[0].chain, Some(ChainOp::Or));
        assert_eq!(line.groups[0].stages.len(), 1);
    }

    #[test]
    fn test_redirections() {
        let line = parse("echo hi > out.txt").unwrap();
        let stage = &line.groups[0].stages[0];
        assert_eq!(argv(stage), vec!["echo", "hi"]);
        let redirect = stage.redirect.as_ref().unwrap();
        assert_eq!(redirect.kind, RedirectKind::Out);
        assert_eq!(line.kinds(), vec![CommandKind::RedirectOut]);

        let line = parse("echo bye >>out.txt").unwrap();
        assert_eq!(line.kinds(), vec![CommandKind::RedirectAppend]);

        let line = parse("sort < in.txt").unwrap();
        assert_eq!(line.kinds(), vec![CommandKind::RedirectIn]);
    }

    #[test]
    fn test_redirect_kept_alongside_chain() {
        let line = parse("echo hi > f && cat f").unwrap();
        let first = &line.groups[0];
        assert_eq!(first.chain, Some(ChainOp::And));
        assert!(first.stages[0].redirect.is_some());
        assert_eq!(line.kinds()[0], CommandKind::And);
    }

    #[test]
    fn test_quoted_operators_do_not_split() {
        let line = parse(r#"echo "a;b" 'c|d' e\>f"#).unwrap();
        assert_eq!(line.groups.len(), 1);
        assert_eq!(argv(&line.groups[0].stages[0]), vec!["echo", "a;b", "c|d", "e>f"]);
    }

    #[test]
    fn test_malformed_redirections() {
        assert!(matches!(parse("echo >"), Err(ShellError::ParseInconsistency(_))));
        assert!(matches!(parse("echo > > f"), Err(ShellError::ParseInconsistency(_))));
        assert!(matches!(parse("echo > a > b"), Err(ShellError::ParseInconsistency(_))));
        assert!(matches!(parse("> f"), Err(ShellError::ParseInconsistency(_))));
    }

    #[test]
    fn test_empty_pipe_stage() {
        assert!(matches!(parse("ls | | wc"), Err(ShellError::ParseInconsistency(_))));
        assert!(matches!(parse("| wc"), Err(ShellError::ParseInconsistency(_))));
        assert!(matches!(parse("ls |"), Err(ShellError::ParseInconsistency(_))));
    }

    fn loop_of(line: &str) -> ForLoop {
        match parse_statement(line).unwrap() {
            Statement::For(for_loop) => for_loop,
            Statement::Commands(_) => panic!("{line} is not a loop"),
        }
    }

    #[test]
    fn test_for_loop() {
        let for_loop = loop_of("for x in a 'b c'; do echo $x | sort; echo done; done");
        assert_eq!(for_loop.variable, "x");
        assert_eq!(for_loop.items.len(), 2);
        assert!(for_loop.items[1].quoted);
        assert_eq!(for_loop.body.groups.len(), 2);
        assert_eq!(for_loop.body.groups[0].stages.len(), 2);
        assert_eq!(argv(&for_loop.body.groups[1].stages[0]), vec!["echo", "done"]);
    }

    #[test]
    fn test_for_loop_without_semicolon_before_do() {
        assert_eq!(loop_of("for n in 1 2 do echo $n; done").items.len(), 2);
        assert!(loop_of("for n in; do echo; done").items.is_empty());
    }

    #[test]
    fn test_malformed_for_loops() {
        for line in [
            "for",
            "for x a b; do echo; done",
            "for 1x in a; do echo; done",
            "for x in a; do echo $x",
            "for x in a; do echo; done; echo after",
            "for x in a; do ; done",
            "for a in 1; do for b in 2; do echo; done; done",
        ] {
            assert!(
                matches!(parse_statement(line), Err(ShellError::ParseInconsistency(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn test_quoted_for_is_a_command() {
        assert!(matches!(parse_statement("'for' x").unwrap(), Statement::Commands(_)));
        assert!(matches!(parse_statement("echo for").unwrap(), Statement::Commands(_)));
    }

    #[test]
    fn test_words_after_target_stay_arguments() {
        let line = parse("echo a > f b").unwrap();
        assert_eq!(argv(&line.groups[0].stages[0]), vec!["echo", "a", "b"]);
    }
}
