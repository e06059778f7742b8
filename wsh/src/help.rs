//! Help text for the command registry

use std::fmt::Write;

use crate::commands::{Category, CommandRegistry};

/// Verbs the shell handles itself, listed after the registered commands.
pub const GENERAL_COMMANDS: &[(&str, &str)] = &[
    ("clear", "Clear the screen"),
    ("exit", "Exit the shell: exit [CODE]"),
    ("help", "Show this help: help [GROUP]"),
];

const GENERAL: &str = "General";

fn section(out: &mut String, title: &str, rows: &[(String, String)]) {
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    let _ = writeln!(out, "{title} Commands:");
    for (name, summary) in rows {
        let _ = writeln!(out, "  {name:<width$}  {summary}");
    }
}

fn group_matches(title: &str, group: &str) -> bool {
    let title = title.to_lowercase();
    title.starts_with(group) || title.contains(group)
}

fn general_rows() -> Vec<(String, String)> {
    GENERAL_COMMANDS
        .iter()
        .map(|(name, summary)| ((*name).to_string(), (*summary).to_string()))
        .collect()
}

/// Render help for every category, or the first category matching `group`.
///
/// Returns the error line when `group` matches nothing.
pub fn render(registry: &CommandRegistry, group: Option<&str>) -> Result<String, String> {
    let by_category = registry.by_category();
    let rows_for = |category: Category| -> Vec<(String, String)> {
        by_category
            .get(&category)
            .map(|commands| {
                commands
                    .iter()
                    .map(|c| (c.name().to_string(), c.help().to_string()))
                    .collect()
            })
            .unwrap_or_default()
    };

    let mut out = String::new();
    match group {
        Some(group) => {
            let needle = group.to_lowercase();
            let category = Category::ALL
                .into_iter()
                .filter(|c| by_category.contains_key(c))
                .find(|c| group_matches(c.label(), &needle));
            match category {
                Some(category) => section(&mut out, category.label(), &rows_for(category)),
                None if group_matches(GENERAL, &needle) => {
                    section(&mut out, GENERAL, &general_rows());
                }
                None => return Err(format!("No command group found matching '{group}'.")),
            }
        }
        None => {
            for category in Category::ALL {
                let rows = rows_for(category);
                if rows.is_empty() {
                    continue;
                }
                section(&mut out, category.label(), &rows);
                out.push('\n');
            }
            section(&mut out, GENERAL, &general_rows());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_help_order() {
        let text = render(&CommandRegistry::with_builtins(), None).unwrap();
        let fs = text.find("Filesystem Commands:").unwrap();
        let txt = text.find("Text Commands:").unwrap();
        let process = text.find("Process Commands:").unwrap();
        let shell = text.find("Shell Commands:").unwrap();
        let general = text.find("General Commands:").unwrap();
        assert!(fs < txt && txt < process && process < shell && shell < general);
        assert!(text.contains("  exit "));
    }

    #[test]
    fn test_group_by_prefix_and_substring() {
        let registry = CommandRegistry::with_builtins();
        let text = render(&registry, Some("FILE")).unwrap();
        assert!(text.starts_with("Filesystem Commands:"));
        assert!(text.contains("  ls "));
        assert!(!text.contains("echo"));

        let text = render(&registry, Some("cess")).unwrap();
        assert!(text.starts_with("Process Commands:"));

        let text = render(&registry, Some("gen")).unwrap();
        assert!(text.starts_with("General Commands:"));
    }

    #[test]
    fn test_unknown_group() {
        let err = render(&CommandRegistry::with_builtins(), Some("zz")).unwrap_err();
        assert_eq!(err, "No command group found matching 'zz'.");
    }
}
