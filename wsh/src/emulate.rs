//! In-process text filters for piped input
//!
//! Only `grep`, `wc`, `sort` and `cut` may consume the output of a previous
//! stage. The same filters back the file-reading forms of those commands.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::error::{ShellError, ShellResult};

pub const EMULATED_COMMANDS: [&str; 4] = ["grep", "wc", "sort", "cut"];

pub fn is_emulated(name: &str) -> bool {
    EMULATED_COMMANDS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutput {
    pub stdout: String,
    pub exit_code: i32,
}

impl FilterOutput {
    fn ok(stdout: String) -> Self {
        Self {
            stdout,
            exit_code: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrepOptions {
    matcher: Regex,
    invert: bool,
    count: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WcOptions {
    lines: bool,
    words: bool,
    bytes: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortOptions {
    reverse: bool,
    numeric: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutOptions {
    /// Inclusive 0-based field ranges in output order.
    fields: Vec<(usize, usize)>,
    delimiter: Option<String>,
}

#[derive(Debug, Clone)]
pub enum TextFilter {
    Grep(GrepOptions),
    Wc(WcOptions),
    Sort(SortOptions),
    Cut(CutOptions),
}

fn err(msg: String) -> ShellError {
    ShellError::Emulation(msg)
}

impl TextFilter {
    /// Parse options for `name`. Returns the filter and any file operands.
    pub fn parse(name: &str, args: &[String]) -> ShellResult<(Self, Vec<String>)> {
        match name {
            "grep" => parse_grep(args),
            "wc" => parse_wc(args),
            "sort" => parse_sort(args),
            "cut" => parse_cut(args),
            other => Err(err(format!("{other}: not a text filter"))),
        }
    }

    pub fn apply(&self, input: &[u8]) -> FilterOutput {
        let text = String::from_utf8_lossy(input);
        match self {
            Self::Grep(opts) => grep(opts, &text),
            Self::Wc(opts) => FilterOutput::ok(wc(*opts, &text, input.len())),
            Self::Sort(opts) => FilterOutput::ok(sort(*opts, &text)),
            Self::Cut(opts) => FilterOutput::ok(cut(opts, &text)),
        }
    }
}

/// Run an emulated command over piped text. Operands are ignored.
pub fn run(name: &str, args: &[String], input: &[u8]) -> ShellResult<FilterOutput> {
    let (filter, operands) = TextFilter::parse(name, args)?;
    if !operands.is_empty() {
        tracing::debug!(command = name, ?operands, "ignoring operands for piped input");
    }
    Ok(filter.apply(input))
}

fn parse_grep(args: &[String]) -> ShellResult<(TextFilter, Vec<String>)> {
    let mut ignore_case = false;
    let mut invert = false;
    let mut count = false;
    let mut rest = Vec::new();
    let mut options_done = false;

    for arg in args {
        if !options_done && arg == "--" {
            options_done = true;
        } else if !options_done && rest.is_empty() && arg.starts_with('-') && arg.len() > 1 {
            for flag in arg[1..].chars() {
                match flag {
                    'i' => ignore_case = true,
                    'v' => invert = true,
                    'c' => count = true,
                    other => return Err(err(format!("grep: invalid option -- '{other}'"))),
                }
            }
        } else {
            rest.push(arg.clone());
        }
    }

    if rest.is_empty() {
        return Err(err("grep: missing pattern".to_string()));
    }
    let pattern = rest.remove(0);
    // `/re/` is a regular expression; anything else is a literal substring
    let source = if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        pattern[1..pattern.len() - 1].to_string()
    } else {
        regex::escape(&pattern)
    };
    let matcher = RegexBuilder::new(&source)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|_| err(format!("grep: invalid pattern: {pattern}")))?;

    Ok((
        TextFilter::Grep(GrepOptions {
            matcher,
            invert,
            count,
        }),
        rest,
    ))
}

fn grep(opts: &GrepOptions, input: &str) -> FilterOutput {
    let selected: Vec<&str> = input
        .lines()
        .filter(|line| opts.matcher.is_match(line) != opts.invert)
        .collect();
    let exit_code = i32::from(selected.is_empty());
    let stdout = if opts.count {
        format!("{}\n", selected.len())
    } else {
        lines_out(selected)
    };
    FilterOutput { stdout, exit_code }
}

fn parse_wc(args: &[String]) -> ShellResult<(TextFilter, Vec<String>)> {
    let mut opts = WcOptions::default();
    let mut operands = Vec::new();
    for arg in args {
        if arg.starts_with('-') && arg.len() > 1 {
            for flag in arg[1..].chars() {
                match flag {
                    'l' => opts.lines = true,
                    'w' => opts.words = true,
                    'c' => opts.bytes = true,
                    other => return Err(err(format!("wc: invalid option -- '{other}'"))),
                }
            }
        } else {
            operands.push(arg.clone());
        }
    }
    if !(opts.lines || opts.words || opts.bytes) {
        opts = WcOptions {
            lines: true,
            words: true,
            bytes: true,
        };
    }
    Ok((TextFilter::Wc(opts), operands))
}

/// `bytes` is the length of the raw input, before any lossy decoding.
fn wc(opts: WcOptions, input: &str, bytes: usize) -> String {
    let mut columns = Vec::new();
    if opts.lines {
        columns.push(input.lines().count());
    }
    if opts.words {
        columns.push(input.split_whitespace().count());
    }
    if opts.bytes {
        columns.push(bytes);
    }
    let cells: Vec<String> = columns.iter().map(|n| format!("{n:>8}")).collect();
    format!("{}\n", cells.join(" "))
}

fn parse_sort(args: &[String]) -> ShellResult<(TextFilter, Vec<String>)> {
    let mut opts = SortOptions::default();
    let mut operands = Vec::new();
    for arg in args {
        if arg.starts_with('-') && arg.len() > 1 {
            for flag in arg[1..].chars() {
                match flag {
                    'r' => opts.reverse = true,
                    'n' => opts.numeric = true,
                    other => return Err(err(format!("sort: invalid option -- '{other}'"))),
                }
            }
        } else {
            operands.push(arg.clone());
        }
    }
    Ok((TextFilter::Sort(opts), operands))
}

/// Leading number of a line, `0` when there is none.
fn numeric_key(line: &str) -> f64 {
    let trimmed = line.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0.0)
}

fn sort(opts: SortOptions, input: &str) -> String {
    let mut lines: Vec<&str> = input.lines().collect();
    if opts.numeric {
        lines.sort_by(|a, b| {
            numeric_key(a)
                .partial_cmp(&numeric_key(b))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        });
    } else {
        lines.sort_unstable();
    }
    if opts.reverse {
        lines.reverse();
    }
    lines_out(lines)
}

fn parse_cut(args: &[String]) -> ShellResult<(TextFilter, Vec<String>)> {
    let mut fields = None;
    let mut delimiter = None;
    let mut operands = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if let Some(spec) = arg.strip_prefix("-f") {
            let spec = if spec.is_empty() {
                iter.next().map(String::as_str).unwrap_or_default()
            } else {
                spec
            };
            fields = Some(parse_field_list(spec)?);
        } else if let Some(delim) = arg.strip_prefix("-d") {
            let delim = if delim.is_empty() {
                iter.next()
                    .cloned()
                    .ok_or_else(|| err("cut: option requires an argument -- 'd'".to_string()))?
            } else {
                delim.to_string()
            };
            if delim.is_empty() {
                return Err(err("cut: the delimiter must not be empty".to_string()));
            }
            delimiter = Some(delim);
        } else {
            operands.push(arg.clone());
        }
    }

    let fields = fields
        .ok_or_else(|| err("cut: field specification required for piped input".to_string()))?;
    Ok((TextFilter::Cut(CutOptions { fields, delimiter }), operands))
}

/// `1,3` or `2-4` style list of 1-based fields.
fn parse_field_list(spec: &str) -> ShellResult<Vec<(usize, usize)>> {
    let invalid = || err("cut: invalid field specification".to_string());
    let number = |s: &str| -> ShellResult<usize> {
        match s.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(invalid()),
        }
    };

    let mut fields = Vec::new();
    for part in spec.split(',') {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (number(lo)?, number(hi)?);
                if lo > hi {
                    return Err(invalid());
                }
                fields.push((lo, hi));
            }
            None => {
                let n = number(part)?;
                fields.push((n, n));
            }
        }
    }
    if fields.is_empty() {
        return Err(invalid());
    }
    Ok(fields)
}

fn cut(opts: &CutOptions, input: &str) -> String {
    let mut out = String::new();
    for line in input.lines() {
        let parts: Vec<&str> = match &opts.delimiter {
            Some(d) => line.split(d.as_str()).collect(),
            None => line.split_whitespace().collect(),
        };
        let mut picked: Vec<&str> = Vec::new();
        for &(lo, hi) in &opts.fields {
            if lo >= parts.len() {
                continue;
            }
            picked.extend_from_slice(&parts[lo..=hi.min(parts.len() - 1)]);
        }
        if picked.is_empty() {
            continue;
        }
        out.push_str(&picked.join(opts.delimiter.as_deref().unwrap_or(" ")));
        out.push('\n');
    }
    out
}

fn lines_out<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn piped(name: &str, a: &[&str], input: &str) -> FilterOutput {
        run(name, &args(a), input.as_bytes()).unwrap()
    }

    #[test]
    fn test_grep_literal_and_regex() {
        let input = "apple\nbanana\napricot\na.c\n";
        assert_eq!(piped("grep", &["ap"], input).stdout, "apple\napricot\n");
        assert_eq!(piped("grep", &["a.c"], input).stdout, "a.c\n");
        assert_eq!(piped("grep", &["/^b/"], input).stdout, "banana\n");
    }

    #[test]
    fn test_grep_flags() {
        let input = "Alpha\nbeta\nALPS\n";
        assert_eq!(piped("grep", &["-i", "al"], input).stdout, "Alpha\nALPS\n");
        assert_eq!(piped("grep", &["-v", "beta"], input).stdout, "Alpha\nALPS\n");
        assert_eq!(piped("grep", &["-ic", "al"], input).stdout, "2\n");
    }

    #[test]
    fn test_grep_no_match_status() {
        let out = piped("grep", &["zzz"], "a\nb\n");
        assert_eq!(out.stdout, "");
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn test_grep_errors() {
        assert!(matches!(run("grep", &[], b"x"), Err(ShellError::Emulation(_))));
        let e = run("grep", &args(&["/(/"]), b"x").unwrap_err();
        assert_eq!(e.to_string(), "grep: invalid pattern: /(/");
    }

    #[test]
    fn test_wc_columns() {
        let input = "one two\nthree\n";
        assert_eq!(piped("wc", &[], input).stdout, "       2        3       14\n");
        assert_eq!(piped("wc", &["-l"], input).stdout, "       2\n");
        assert_eq!(piped("wc", &["-w"], input).stdout, "       3\n");
        assert_eq!(piped("wc", &["-c"], input).stdout, "      14\n");
    }

    #[test]
    fn test_sort_variants() {
        assert_eq!(piped("sort", &[], "hi\n").stdout, "hi\n");
        assert_eq!(piped("sort", &[], "b\na\nc\n").stdout, "a\nb\nc\n");
        assert_eq!(piped("sort", &["-r"], "b\na\nc\n").stdout, "c\nb\na\n");
        assert_eq!(piped("sort", &["-n"], "10\n9\n-1\nx\n").stdout, "-1\nx\n9\n10\n");
        assert_eq!(piped("sort", &["-rn"], "1\n3\n2\n").stdout, "3\n2\n1\n");
    }

    #[test]
    fn test_cut_fields() {
        let input = "a:b:c\nd:e:f\n";
        assert_eq!(piped("cut", &["-f", "2", "-d", ":"], input).stdout, "b\ne\n");
        assert_eq!(piped("cut", &["-f1,3", "-d:"], input).stdout, "a:c\nd:f\n");
        assert_eq!(piped("cut", &["-f", "2-3", "-d", ":"], input).stdout, "b:c\ne:f\n");
        assert_eq!(piped("cut", &["-f", "2"], "x  y z\nshort\n").stdout, "y\n");
    }

    #[test]
    fn test_cut_open_ended_range() {
        let out = piped("cut", &["-f", "1-18446744073709551615"], "a b\nc d e\n");
        assert_eq!(out.stdout, "a b\nc d e\n");
        assert_eq!(piped("cut", &["-f", "2-9,1"], "a b c\n").stdout, "b c a\n");
        assert_eq!(piped("cut", &["-f", "5-7"], "a b\n").stdout, "");
    }

    #[test]
    fn test_wc_counts_raw_bytes() {
        let out = run("wc", &args(&["-c"]), b"a\xff\xfe\n").unwrap();
        assert_eq!(out.stdout, "       4\n");
    }

    #[test]
    fn test_cut_errors() {
        let e = run("cut", &args(&["-d", ":"]), b"x").unwrap_err();
        assert_eq!(e.to_string(), "cut: field specification required for piped input");
        let e = run("cut", &args(&["-f", "0"]), b"x").unwrap_err();
        assert_eq!(e.to_string(), "cut: invalid field specification");
        assert!(run("cut", &args(&["-f", "x"]), b"x").is_err());
    }

    #[test]
    fn test_operands_are_reported() {
        let (_, operands) = TextFilter::parse("grep", &args(&["-i", "pat", "a.txt", "b.txt"])).unwrap();
        assert_eq!(operands, vec!["a.txt", "b.txt"]);
        let (_, operands) = TextFilter::parse("wc", &args(&["-l", "f"])).unwrap();
        assert_eq!(operands, vec!["f"]);
    }

    #[test]
    fn test_closed_set() {
        assert!(is_emulated("sort"));
        assert!(!is_emulated("cat"));
    }
}
