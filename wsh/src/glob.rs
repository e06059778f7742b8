//! Wildcard expansion against a remote directory listing

use std::future::Future;
use std::pin::Pin;

use wsh_client::{join_path, RemoteSession};

use crate::state::SessionState;

pub fn contains_glob_chars(s: &str) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if matches!(c, '*' | '?' | '[') {
            return true;
        }
    }
    false
}

/// Remove backslash escapes from a pattern.
pub fn unescape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Shell-style match of one path segment. `\` quotes the next character.
///
/// A leading `.` in `name` must be matched by a literal `.` in the pattern.
pub fn match_glob_pattern(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    if n.first() == Some(&'.') && p.first() != Some(&'.') && !p.starts_with(&['\\', '.']) {
        return false;
    }
    match_atoms(&compile(&p), &n)
}

#[derive(Clone, Copy, Debug)]
enum Atom<'a> {
    Star,
    Any,
    /// Bracket body including the closing `]`.
    Class(&'a [char]),
    Literal(char),
}

impl Atom<'_> {
    fn accepts(self, c: char) -> bool {
        match self {
            Self::Star | Self::Any => true,
            Self::Class(body) => match_class(body, c).is_some_and(|(matched, _)| matched),
            Self::Literal(l) => l == c,
        }
    }
}

fn compile(p: &[char]) -> Vec<Atom<'_>> {
    let mut atoms: Vec<Atom<'_>> = Vec::with_capacity(p.len());
    let mut i = 0;
    while i < p.len() {
        match p[i] {
            '*' => {
                if !matches!(atoms.last(), Some(Atom::Star)) {
                    atoms.push(Atom::Star);
                }
                i += 1;
            }
            '?' => {
                atoms.push(Atom::Any);
                i += 1;
            }
            // No closing bracket: `[` is an ordinary character
            '[' => match match_class(&p[i + 1..], '\0') {
                Some((_, after)) => {
                    let end = p.len() - after.len();
                    atoms.push(Atom::Class(&p[i + 1..end]));
                    i = end;
                }
                None => {
                    atoms.push(Atom::Literal('['));
                    i += 1;
                }
            },
            '\\' if i + 1 < p.len() => {
                atoms.push(Atom::Literal(p[i + 1]));
                i += 2;
            }
            c => {
                atoms.push(Atom::Literal(c));
                i += 1;
            }
        }
    }
    atoms
}

/// Linear-time wildcard match that backtracks only to the most recent `*`.
fn match_atoms(atoms: &[Atom<'_>], n: &[char]) -> bool {
    let (mut a, mut i) = (0, 0);
    let mut last_star: Option<(usize, usize)> = None;
    while i < n.len() {
        match atoms.get(a) {
            Some(Atom::Star) => {
                last_star = Some((a, i));
                a += 1;
            }
            Some(atom) if atom.accepts(n[i]) => {
                a += 1;
                i += 1;
            }
            _ => match last_star {
                Some((star, from)) => {
                    a = star + 1;
                    i = from + 1;
                    last_star = Some((star, from + 1));
                }
                None => return false,
            },
        }
    }
    atoms[a..].iter().all(|atom| matches!(atom, Atom::Star))
}

/// Match `c` against a bracket class whose body starts at `p`.
/// Returns whether it matched and the pattern after the closing `]`.
fn match_class(p: &[char], c: char) -> Option<(bool, &[char])> {
    let mut i = 0;
    let negated = matches!(p.first(), Some('!' | '^'));
    if negated {
        i += 1;
    }
    let mut matched = false;
    let mut first = true;
    while i < p.len() {
        let mut lo = p[i];
        if lo == ']' && !first {
            return Some((matched != negated, &p[i + 1..]));
        }
        first = false;
        if lo == '\\' && i + 1 < p.len() {
            i += 1;
            lo = p[i];
        }
        if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let hi = p[i + 2];
            if lo <= c && c <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if lo == c {
                matched = true;
            }
            i += 1;
        }
    }
    None
}

/// Expand `pattern` against the session's working directory. A leading `~`
/// stands for the home directory. Results keep the directory prefix as
/// written and are sorted; no match yields an empty list.
pub async fn expand(session: &dyn RemoteSession, pattern: &str, state: &SessionState) -> Vec<String> {
    let segments: Vec<&str> = pattern.split('/').collect();
    if let Some(pos) = segments.iter().position(|s| *s == "**") {
        return expand_recursive(session, &segments, pos, state).await;
    }

    let (prefix, file_pattern) = match pattern.rfind('/') {
        Some(idx) => (&pattern[..=idx], &pattern[idx + 1..]),
        None => ("", pattern),
    };
    if contains_glob_chars(prefix) || file_pattern.is_empty() {
        return Vec::new();
    }
    let prefix = unescape(prefix);
    let dir = resolve_dir(state, &prefix);

    let entries = match session.list(&dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir, error = %e, "glob listing failed");
            return Vec::new();
        }
    };

    let mut matches: Vec<String> = entries
        .iter()
        .filter(|e| match_glob_pattern(file_pattern, &e.name))
        .map(|e| format!("{prefix}{}", e.name))
        .collect();
    matches.sort();
    matches
}

async fn expand_recursive(
    session: &dyn RemoteSession,
    segments: &[&str],
    pos: usize,
    state: &SessionState,
) -> Vec<String> {
    let base_segments = &segments[..pos];
    let rest = &segments[pos + 1..];
    // Only a single terminal pattern may follow `**`
    let terminal = match rest {
        [] | [""] => None,
        [one] => Some(*one),
        _ => return Vec::new(),
    };
    let prefix = if base_segments.is_empty() {
        String::new()
    } else {
        format!("{}/", base_segments.join("/"))
    };
    if contains_glob_chars(&prefix) {
        return Vec::new();
    }
    let prefix = unescape(&prefix);
    let base = resolve_dir(state, &prefix);

    let mut found = Vec::new();
    walk(session, base, String::new(), terminal, &mut found).await;
    let mut matches: Vec<String> = found.into_iter().map(|rel| format!("{prefix}{rel}")).collect();
    matches.sort();
    matches
}

fn walk<'a>(
    session: &'a dyn RemoteSession,
    dir: String,
    rel: String,
    terminal: Option<&'a str>,
    found: &'a mut Vec<String>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let entries = match session.list(&dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries {
            // Listing a file returns the file itself
            if entry.path == dir {
                continue;
            }
            let rel_path = if rel.is_empty() {
                entry.name.clone()
            } else {
                format!("{rel}/{}", entry.name)
            };
            let matched = match terminal {
                None => entry.is_dir(),
                Some(p) => match_glob_pattern(p, &entry.name),
            };
            if matched {
                found.push(rel_path.clone());
            }
            if entry.is_dir() {
                walk(session, join_path(&dir, &entry.name), rel_path, terminal, found).await;
            }
        }
    })
}

fn resolve_dir(state: &SessionState, prefix: &str) -> String {
    if prefix.is_empty() {
        return state.cwd.clone();
    }
    match prefix.trim_end_matches('/') {
        "" => "/".to_string(),
        dir => state.resolve_path(dir),
    }
}
