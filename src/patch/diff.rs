//! Diff & validation utilities.
//!
//! Pure functions, no I/O: a line-aligned diff for human review and a
//! pre-flight safety check for manual replacement flows. Both are usable
//! independently of the patch engine.

use regex::Regex;

/// Outcome of a pre-flight replacement check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    /// Exact occurrence count of the old value
    pub occurrences: usize,
    pub error: Option<String>,
}

/// Line-aligned diff between two contents.
///
/// For each line index up to the longer side, emits `- ` and/or `+ `
/// lines where the sides differ, or a two-space-prefixed line where they
/// match. A side that has no line at an index contributes nothing at that
/// index, so collecting the `+` and unchanged lines reconstructs the new
/// content exactly.
pub fn content_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let max = old_lines.len().max(new_lines.len());

    let mut out = Vec::new();
    for i in 0..max {
        let old_line = old_lines.get(i);
        let new_line = new_lines.get(i);
        match (old_line, new_line) {
            (Some(o), Some(n)) if o == n => out.push(format!("  {}", o)),
            _ => {
                if let Some(o) = old_line {
                    out.push(format!("- {}", o));
                }
                if let Some(n) = new_line {
                    out.push(format!("+ {}", n));
                }
            }
        }
    }
    out.join("\n")
}

/// Pre-flight check that replacing `old_value` with `new_value` is safe.
///
/// Zero occurrences and ambiguous (multiple) occurrences are rejected
/// outright; a single occurrence is simulated and the result must keep
/// single-quote, double-quote and backtick counts even — a cheap syntax
/// sanity check for markup-embedding sources.
pub fn validate_replacement(content: &str, old_value: &str, new_value: &str) -> ValidationResult {
    let pattern = Regex::new(&regex::escape(old_value));
    let occurrences = match pattern {
        Ok(re) => re.find_iter(content).count(),
        Err(_) => content.matches(old_value).count(),
    };

    if occurrences == 0 {
        return ValidationResult {
            valid: false,
            occurrences,
            error: Some("Content not found in file".to_string()),
        };
    }
    if occurrences > 1 {
        return ValidationResult {
            valid: false,
            occurrences,
            error: Some(format!(
                "Ambiguous replacement: content appears {} times in file",
                occurrences
            )),
        };
    }

    let simulated = content.replacen(old_value, new_value, 1);
    for quote in ['\'', '"', '`'] {
        if simulated.matches(quote).count() % 2 != 0 {
            return ValidationResult {
                valid: false,
                occurrences,
                error: Some("Replacement would result in unbalanced quotes".to_string()),
            };
        }
    }

    ValidationResult {
        valid: true,
        occurrences,
        error: None,
    }
}
