//! Command history and bang/caret recall

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::HistoryExpansionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub unique: usize,
    /// Most frequent first word and its count.
    pub most_used: Option<(String, usize)>,
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: Vec<String>,
    max_size: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Lines that ask for recall instead of naming a command.
pub fn is_recall_expression(line: &str) -> bool {
    (line.starts_with('^') && line.matches('^').count() >= 2)
        || (line.starts_with('!') && line.len() > 1)
}

impl HistoryBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Record an accepted line. Returns whether it was kept.
    pub fn add(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty()
            || self.entries.last().is_some_and(|last| last == line)
            || line.starts_with("history")
            || is_recall_expression(line)
        {
            return false;
        }
        self.entries.push(line.to_string());
        self.trim();
        true
    }

    fn trim(&mut self) {
        if self.entries.len() > self.max_size {
            let excess = self.entries.len() - self.max_size;
            self.entries.drain(..excess);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest `count` entries, oldest first.
    pub fn last(&self, count: usize) -> &[String] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    /// Entries containing `pattern`, ignoring case.
    pub fn search(&self, pattern: &str) -> Vec<&str> {
        let needle = pattern.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries paired with their 1-based recall numbers.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().enumerate().map(|(i, e)| (i + 1, e.as_str()))
    }

    pub fn stats(&self) -> HistoryStats {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for entry in &self.entries {
            let base = entry.split_whitespace().next().unwrap_or(entry);
            let count = counts.entry(base).or_insert(0);
            if *count == 0 {
                order.push(base);
            }
            *count += 1;
        }

        // Ties go to the command seen first
        let mut most_used: Option<(String, usize)> = None;
        for base in order {
            let count = counts[base];
            if most_used.as_ref().map_or(true, |(_, best)| count > *best) {
                most_used = Some((base.to_string(), count));
            }
        }

        HistoryStats {
            total: self.entries.len(),
            unique: self.entries.iter().collect::<HashSet<_>>().len(),
            most_used,
        }
    }

    /// Rewrite a recall expression into the command it names.
    ///
    /// - `^old^new` replaces the first `old` in the newest entry
    /// - `!!` is the newest entry, `!N` the N-th (1-based)
    /// - `!prefix` is the newest entry starting with `prefix`
    ///
    /// Any other line comes back unchanged.
    pub fn expand(&self, line: &str) -> Result<String, HistoryExpansionError> {
        let trimmed = line.trim();
        if trimmed.starts_with('^') && trimmed.matches('^').count() >= 2 {
            return self.substitute(trimmed);
        }
        if !(trimmed.starts_with('!') && trimmed.len() > 1) {
            return Ok(line.to_string());
        }

        let newest = self.entries.last().ok_or(HistoryExpansionError::EmptyHistory)?;
        let rest = &trimmed[1..];
        if rest == "!" {
            return Ok(newest.clone());
        }
        if rest.chars().all(|c| c.is_ascii_digit()) {
            let len = self.entries.len();
            let index: usize = rest
                .parse()
                .map_err(|_| HistoryExpansionError::OutOfRange { index: usize::MAX, len })?;
            if index == 0 || index > len {
                return Err(HistoryExpansionError::OutOfRange { index, len });
            }
            return Ok(self.entries[index - 1].clone());
        }
        self.entries
            .iter()
            .rev()
            .find(|e| e.starts_with(rest))
            .cloned()
            .ok_or_else(|| HistoryExpansionError::PrefixNotFound(rest.to_string()))
    }

    fn substitute(&self, line: &str) -> Result<String, HistoryExpansionError> {
        let newest = self.entries.last().ok_or(HistoryExpansionError::EmptyHistory)?;
        let mut parts = line[1..].splitn(3, '^');
        let old = parts.next().unwrap_or_default();
        let new = parts.next().ok_or(HistoryExpansionError::InvalidSubstitution)?;
        if old.is_empty() {
            return Err(HistoryExpansionError::InvalidSubstitution);
        }
        if !newest.contains(old) {
            return Err(HistoryExpansionError::SubstitutionNotFound {
                old: old.to_string(),
                entry: newest.clone(),
            });
        }
        Ok(newest.replacen(old, new, 1))
    }

    /// Replace the buffer with the non-blank lines of `path`, newest last.
    /// A missing file leaves the buffer empty.
    pub fn load(&mut self, path: &Path) -> std::io::Result<()> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        self.entries = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect();
        self.trim();
        Ok(())
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(entry);
            content.push('\n');
        }
        std::fs::write(path, content)
    }
}
