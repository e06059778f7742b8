//! Lexer for wsh command lines
//!
//! Splits a line into words and operators. Words keep enough quoting
//! information to expand variables and globs later, at execution time.

use chumsky::prelude::*;

use crate::vars::ShellVariables;

/// A run of characters inside a word that shares one quoting context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Piece {
    /// Single-quoted or backslash-escaped: taken verbatim.
    Literal(String),
    /// Subject to `$` expansion; `glob` is set for unquoted text.
    Expand { text: String, glob: bool },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Word {
    pub pieces: Vec<Piece>,
    /// Some part of the word was written inside quotes.
    pub quoted: bool,
}

/// A word after variable expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedWord {
    pub text: String,
    /// Escaped pattern for the glob matcher, when the word has active wildcards.
    pub pattern: Option<String>,
}

impl Word {
    /// An unquoted word taken from plain text, as the fallback split produces.
    pub fn bare(text: &str) -> Self {
        Self {
            pieces: vec![Piece::Expand {
                text: text.to_string(),
                glob: false,
            }],
            quoted: false,
        }
    }

    fn from_segments(segments: Vec<(bool, Vec<Piece>)>) -> Self {
        let quoted = segments.iter().any(|(q, _)| *q);
        let mut pieces: Vec<Piece> = Vec::new();
        for piece in segments.into_iter().flat_map(|(_, p)| p) {
            if let Some(last) = pieces.last_mut() {
                match (last, &piece) {
                    (Piece::Literal(prev), Piece::Literal(next)) => {
                        prev.push_str(next);
                        continue;
                    }
                    (
                        Piece::Expand { text: prev, glob: g1 },
                        Piece::Expand { text: next, glob: g2 },
                    ) if g1 == g2 => {
                        prev.push_str(next);
                        continue;
                    }
                    _ => {}
                }
            }
            pieces.push(piece);
        }
        Self { pieces, quoted }
    }

    /// The word exactly as typed when it holds only plain unquoted text.
    pub fn plain(&self) -> Option<&str> {
        match self.pieces.as_slice() {
            [Piece::Expand { text, glob: true }] if !self.quoted => Some(text),
            _ => None,
        }
    }

    /// Split a leading `NAME=` off an unquoted word.
    ///
    /// Returns the name and the remainder as its own word.
    pub fn split_assignment(&self) -> Option<(String, Self)> {
        let Some(Piece::Expand { text, glob: true }) = self.pieces.first() else {
            return None;
        };
        let eq = text.find('=')?;
        let name = &text[..eq];
        if !crate::vars::is_valid_name(name) {
            return None;
        }
        let mut rest = self.pieces.clone();
        let remainder = text[eq + 1..].to_string();
        if remainder.is_empty() {
            rest.remove(0);
        } else {
            rest[0] = Piece::Expand {
                text: remainder,
                glob: true,
            };
        }
        Some((
            name.to_string(),
            Self {
                pieces: rest,
                quoted: self.quoted,
            },
        ))
    }

    pub fn expand(&self, vars: &ShellVariables) -> ExpandedWord {
        let mut text = String::new();
        let mut pattern = String::new();
        let mut active = false;

        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => {
                    text.push_str(s);
                    push_escaped(&mut pattern, s);
                }
                Piece::Expand { text: raw, glob } => {
                    let value = vars.expand(raw);
                    if *glob {
                        active |= value.contains(['*', '?', '[']);
                        pattern.push_str(&value);
                    } else {
                        push_escaped(&mut pattern, &value);
                    }
                    text.push_str(&value);
                }
            }
        }

        let pattern = (active && !text.starts_with('-')).then_some(pattern);
        ExpandedWord { text, pattern }
    }
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    Word(Word),

    // Operators
    Pipe,      // |
    Semicolon, // ;
    AndAnd,    // &&
    OrOr,      // ||

    // Redirections
    RedirectOut,    // >
    RedirectAppend, // >>
    RedirectIn,     // <
}

impl Token {
    fn operator(s: &str) -> Option<Self> {
        Some(match s {
            "|" => Self::Pipe,
            ";" => Self::Semicolon,
            "&&" => Self::AndAnd,
            "||" => Self::OrOr,
            ">" => Self::RedirectOut,
            ">>" => Self::RedirectAppend,
            "<" => Self::RedirectIn,
            _ => return None,
        })
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word(w) => {
                for piece in &w.pieces {
                    match piece {
                        Piece::Literal(s) | Piece::Expand { text: s, .. } => write!(f, "{s}")?,
                    }
                }
                Ok(())
            }
            Self::Pipe => write!(f, "|"),
            Self::Semicolon => write!(f, ";"),
            Self::AndAnd => write!(f, "&&"),
            Self::OrOr => write!(f, "||"),
            Self::RedirectOut => write!(f, ">"),
            Self::RedirectAppend => write!(f, ">>"),
            Self::RedirectIn => write!(f, "<"),
        }
    }
}

pub fn lexer() -> impl Parser<char, Vec<Token>, Error = Simple<char>> {
    let ws = filter(|c: &char| c.is_whitespace()).repeated();

    // (quoted, pieces) per segment; adjacent segments form one word
    let sq_seg = just('\'')
        .ignore_then(filter(|c: &char| *c != '\'').repeated().collect::<String>())
        .then_ignore(just('\''))
        .map(|s: String| (true, vec![Piece::Literal(s)]));

    let dq_seg = just('"')
        .ignore_then(
            just('\\')
                .ignore_then(any())
                .map(|c: char| match c {
                    '"' | '\\' | '$' | '`' => Piece::Literal(c.to_string()),
                    '\n' => Piece::Literal(String::new()),
                    // Other \X sequences keep the backslash
                    other => Piece::Literal(format!("\\{other}")),
                })
                .or(filter(|c: &char| *c != '"' && *c != '\\').map(|c: char| Piece::Expand {
                    text: c.to_string(),
                    glob: false,
                }))
                .repeated(),
        )
        .then_ignore(just('"'))
        .map(|pieces: Vec<Piece>| (true, pieces));

    let word_char = filter(|c: &char| {
        !c.is_whitespace() && !matches!(c, '|' | '&' | ';' | '<' | '>' | '"' | '\'' | '\\')
    });

    // Backslash-escape outside quotes: \X -> literal X, \<newline> -> nothing
    let escaped_char = just('\\')
        .ignore_then(any())
        .map(|c: char| Piece::Literal(if c == '\n' { String::new() } else { c.to_string() }));

    let bare_seg = escaped_char
        .or(word_char.map(|c: char| Piece::Expand {
            text: c.to_string(),
            glob: true,
        }))
        .repeated()
        .at_least(1)
        .map(|pieces: Vec<Piece>| (false, pieces));

    let word = choice((bare_seg, sq_seg, dq_seg))
        .repeated()
        .at_least(1)
        .map(|segments| Token::Word(Word::from_segments(segments)));

    // Two-character operators before their one-character prefixes
    let op = choice((
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just(">>").to(Token::RedirectAppend),
        just('|').to(Token::Pipe),
        just(';').to(Token::Semicolon),
        just('>').to(Token::RedirectOut),
        just('<').to(Token::RedirectIn),
    ));

    ws.clone()
        .ignore_then(op.or(word).then_ignore(ws).repeated())
        .then_ignore(end())
}

/// Naive whitespace split used when the line does not lex, e.g. on an
/// unterminated quote. Quote characters stay in the text and nothing globs;
/// variables still expand.
pub fn fallback_tokens(line: &str) -> Vec<Token> {
    line.split_whitespace()
        .map(|chunk| Token::operator(chunk).unwrap_or_else(|| Token::Word(Word::bare(chunk))))
        .collect()
}

/// Lex a full line, falling back to [`fallback_tokens`] on failure.
pub fn tokenize_line(line: &str) -> Vec<Token> {
    match lexer().parse(line) {
        Ok(tokens) => tokens,
        Err(errs) => {
            tracing::debug!(errors = errs.len(), "line did not lex, using whitespace split");
            fallback_tokens(line)
        }
    }
}

/// Tokenize one command-group string into expanded argument strings.
///
/// Globs are not expanded here; that needs a remote session.
pub fn tokenize(text: &str, vars: &ShellVariables) -> Vec<String> {
    tokenize_line(text)
        .into_iter()
        .map(|token| match token {
            Token::Word(w) => w.expand(vars).text,
            other => other.to_string(),
        })
        .collect()
}
