//! Source Locator.
//!
//! Best-effort lookup of an approximate text fragment inside the
//! repository tree, via remote code search plus extension-priority
//! ranking. Never fatal to callers: every remote error reduces to
//! "not found".

use crate::github::RepoHost;
use crate::models::SourceLocation;

/// Fragments shorter than this after normalization are too ambiguous to
/// search.
const MIN_FRAGMENT_LEN: usize = 5;

/// Search uses a truncated fragment; line scanning uses a shorter prefix
/// to tolerate trailing drift.
const SEARCH_FRAGMENT_LEN: usize = 50;
const LINE_SCAN_PREFIX_LEN: usize = 30;

pub struct SourceLocator<'a> {
    host: &'a dyn RepoHost,
}

impl<'a> SourceLocator<'a> {
    pub fn new(host: &'a dyn RepoHost) -> Self {
        Self { host }
    }

    /// Find the best-matching file and line for `fragment`.
    pub async fn locate(&self, fragment: &str, git_ref: Option<&str>) -> Option<SourceLocation> {
        let normalized = normalize_fragment(fragment);
        if normalized.len() < MIN_FRAGMENT_LEN {
            return None;
        }

        let hits = match self.host.search_code(&normalized).await {
            Ok(hits) => hits,
            Err(e) => {
                log::debug!("code search failed for {:?}: {}", normalized, e);
                return None;
            }
        };
        if hits.is_empty() {
            return None;
        }

        let mut paths: Vec<String> = hits.into_iter().map(|h| h.path).collect();
        paths.sort_by_key(|p| extension_priority(p));
        let path = paths.into_iter().next()?;

        let file = match self.host.get_file(&path, git_ref).await {
            Ok(file) => file,
            Err(e) => {
                log::debug!("fetch of {} failed during locate: {}", path, e);
                return None;
            }
        };

        Some(scan_for_fragment(&path, &file.content, &normalized))
    }
}

/// Truncate, strip quote characters, collapse whitespace, trim.
pub fn normalize_fragment(fragment: &str) -> String {
    let truncated: String = fragment.chars().take(SEARCH_FRAGMENT_LEN).collect();
    let stripped: String = truncated
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}'))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower sorts first. `.tsx > .jsx > .ts > .js > .mdx > .json`;
/// unrecognized extensions sort last.
fn extension_priority(path: &str) -> u8 {
    match path.rsplit('.').next().unwrap_or("") {
        "tsx" => 0,
        "jsx" => 1,
        "ts" => 2,
        "js" => 3,
        "mdx" => 4,
        "json" => 5,
        _ => u8::MAX,
    }
}

/// Scan for a prefix of the normalized fragment; the file is still a
/// useful answer when no line matches (line = 0, position unknown).
fn scan_for_fragment(path: &str, content: &str, normalized: &str) -> SourceLocation {
    let prefix: String = normalized.chars().take(LINE_SCAN_PREFIX_LEN).collect();
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(col) = line.find(prefix.as_str()) {
            let from = idx.saturating_sub(2);
            let to = (idx + 3).min(lines.len());
            return SourceLocation {
                file_path: path.to_string(),
                line: (idx + 1) as u32,
                column: (col + 1) as u32,
                context: lines[from..to].join("\n"),
            };
        }
    }

    SourceLocation {
        file_path: path.to_string(),
        line: 0,
        column: 0,
        context: String::new(),
    }
}
