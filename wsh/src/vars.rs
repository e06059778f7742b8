//! Session variables and `$name` / `${name}` expansion

use std::collections::BTreeMap;

pub struct ShellVariables {
    values: BTreeMap<String, String>,
    last_exit_code: i32,
    env_fallback: bool,
}

impl Default for ShellVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellVariables {
    pub fn new() -> Self {
        let mut values = BTreeMap::new();
        for (name, value) in [
            ("PWD", "/"),
            ("USER", "root"),
            ("HOME", "/root"),
            ("SHELL", "/bin/wsh"),
            ("PATH", "/usr/local/bin:/usr/bin:/bin"),
        ] {
            values.insert(name.to_string(), value.to_string());
        }
        Self {
            values,
            last_exit_code: 0,
            env_fallback: true,
        }
    }

    /// Whether unknown names are looked up in the local process environment.
    pub fn set_env_fallback(&mut self, enabled: bool) {
        self.env_fallback = enabled;
    }

    /// Value of `name`, or `""` when it is unset everywhere.
    pub fn get(&self, name: &str) -> String {
        if name == "?" {
            return self.last_exit_code.to_string();
        }
        if let Some(value) = self.values.get(name) {
            return value.clone();
        }
        if self.env_fallback {
            return std::env::var(name).unwrap_or_default();
        }
        String::new()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    pub fn unset(&mut self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Session-defined variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub const fn last_exit_code(&self) -> i32 {
        self.last_exit_code
    }

    pub fn set_last_exit_code(&mut self, code: i32) {
        self.last_exit_code = code;
    }

    /// Substitute `${name}`, `$name` and `$?` in one left-to-right pass.
    ///
    /// Substituted text is never rescanned. A `$` that does not start a
    /// valid reference is kept as is.
    pub fn expand(&self, text: &str) -> String {
        if !text.contains('$') {
            return text.to_string();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < chars.len() {
            if chars[i] != '$' {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            match chars.get(i + 1) {
                Some('{') => {
                    let close = chars[i + 2..].iter().position(|c| *c == '}');
                    match close {
                        Some(len) => {
                            let name: String = chars[i + 2..i + 2 + len].iter().collect();
                            if is_valid_name(&name) || name == "?" {
                                out.push_str(&self.get(&name));
                            } else {
                                out.extend(&chars[i..i + 3 + len]);
                            }
                            i += 3 + len;
                        }
                        None => {
                            out.push('$');
                            i += 1;
                        }
                    }
                }
                Some('?') => {
                    out.push_str(&self.last_exit_code.to_string());
                    i += 2;
                }
                Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                    {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    out.push_str(&self.get(&name));
                    i = end;
                }
                _ => {
                    out.push('$');
                    i += 1;
                }
            }
        }

        out
    }
}

/// Letter or underscore, then letters, digits or underscores.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
