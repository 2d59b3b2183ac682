//! Patch engine.
//!
//! Applies one edit instruction to one file's content through a two-tier
//! strategy: an oracle-guided surgical search/replace behind a hard
//! verification gate, then a deterministic fallback. A failed result
//! always carries content byte-identical to the input, and how the edit
//! landed (oracle, fallback, or not at all) is preserved for audit.
//! There is no retry loop here; retries belong to the orchestrator.

use serde::Deserialize;
use serde_json::json;

use crate::models::{truncate_for_display, EditInstruction, PatchPath, PatchResult};
use crate::oracle::{OracleResponse, TextOracle};

const CONTEXT_RADIUS: usize = 5;
const DISPLAY_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Confidence {
    High,
    Medium,
    Low,
}

/// The structured object the oracle must produce for tier 1.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SurgicalReplace {
    search_string: String,
    replace_string: String,
    #[allow(dead_code)]
    #[serde(default)]
    line_number: u32,
    confidence: Confidence,
}

pub struct PatchEngine<'a> {
    oracle: &'a dyn TextOracle,
}

enum TierOneOutcome {
    Applied { content: String, line: u32 },
    Abandoned(String),
}

impl<'a> PatchEngine<'a> {
    pub fn new(oracle: &'a dyn TextOracle) -> Self {
        Self { oracle }
    }

    /// Apply one edit to `content`. Never errors: the result says whether
    /// and how the edit landed.
    pub async fn apply_edit(
        &self,
        content: &str,
        file_path: &str,
        edit: &EditInstruction,
    ) -> PatchResult {
        let description = describe_edit(edit);

        // Nothing to change: success with the input untouched.
        if !edit.changes_text() && !edit.changes_href() {
            return PatchResult {
                success: true,
                content: content.to_string(),
                changed_line: None,
                reason: None,
                path: None,
                description,
            };
        }

        let abandoned = match self.try_oracle_tier(content, file_path, edit).await {
            TierOneOutcome::Applied { content, line } => {
                return PatchResult {
                    success: true,
                    content,
                    changed_line: Some(line),
                    reason: None,
                    path: Some(PatchPath::Oracle),
                    description,
                };
            }
            TierOneOutcome::Abandoned(reason) => {
                log::debug!("oracle tier abandoned for {}: {}", file_path, reason);
                reason
            }
        };

        self.apply_fallback(content, edit, abandoned, description)
    }

    /// Tier 1: ask the oracle for a verbatim search/replace pair and gate
    /// it hard. Any verification failure or oracle error abandons the
    /// tier; nothing here is fatal.
    async fn try_oracle_tier(
        &self,
        content: &str,
        file_path: &str,
        edit: &EditInstruction,
    ) -> TierOneOutcome {
        let prompt = build_surgical_prompt(content, file_path, edit);
        let schema = json!({
            "type": "object",
            "properties": {
                "searchString": { "type": "string" },
                "replaceString": { "type": "string" },
                "lineNumber": { "type": "integer" },
                "confidence": { "type": "string", "enum": ["high", "medium", "low"] }
            },
            "required": ["searchString", "replaceString", "lineNumber", "confidence"],
            "additionalProperties": false
        });
        let system = "You produce exact search/replace pairs for surgical \
                      source edits. Copy searchString verbatim from the source, \
                      including whitespace and quoting, with enough surrounding \
                      context to be unambiguous.";

        let value = match self.oracle.generate_structured(system, &prompt, &schema).await {
            Ok(value) => value,
            Err(e) => return TierOneOutcome::Abandoned(format!("oracle error: {}", e)),
        };

        let surgical = match OracleResponse::<SurgicalReplace>::from_value(value) {
            OracleResponse::Parsed(s) => s,
            OracleResponse::Malformed(_) => {
                return TierOneOutcome::Abandoned("malformed oracle response".to_string())
            }
        };

        if surgical.search_string.is_empty() {
            return TierOneOutcome::Abandoned("empty search string".to_string());
        }

        let Some(offset) = content.find(&surgical.search_string) else {
            return TierOneOutcome::Abandoned("search string not found in file".to_string());
        };
        let occurrences = content.matches(&surgical.search_string).count();
        if occurrences > 1 && surgical.confidence == Confidence::Low {
            return TierOneOutcome::Abandoned(format!(
                "search string is ambiguous ({} occurrences) with low confidence",
                occurrences
            ));
        }

        // First-occurrence semantics; multi-occurrence replace is never
        // attempted in one shot.
        let candidate = content.replacen(&surgical.search_string, &surgical.replace_string, 1);

        if edit.changes_text() && !candidate.contains(&edit.new_value) {
            return TierOneOutcome::Abandoned(
                "replacement did not introduce the new text".to_string(),
            );
        }
        if edit.changes_href() {
            let new_href = edit.new_href.as_deref().unwrap_or_default();
            if !candidate.contains(new_href) {
                return TierOneOutcome::Abandoned(
                    "replacement did not introduce the new href".to_string(),
                );
            }
        }

        TierOneOutcome::Applied {
            content: candidate,
            line: line_of_offset(content, offset),
        }
    }

    /// Tier 2: deterministic replace. Line-scoped when a hint exists
    /// (precision over recall once a hint is trusted), whole-file first
    /// occurrence otherwise. Unlike tier 1 this never fails on ambiguity.
    fn apply_fallback(
        &self,
        content: &str,
        edit: &EditInstruction,
        fallback_reason: String,
        description: String,
    ) -> PatchResult {
        let mut current = content.to_string();
        let mut changed_line = None;

        if edit.changes_text() {
            match edit.line {
                Some(hint) => {
                    match replace_on_line(&current, hint, &edit.old_value, &edit.new_value) {
                        Some(updated) => {
                            current = updated;
                            changed_line = Some(hint);
                        }
                        None => {
                            // Do not widen the search once a hint exists.
                            return PatchResult::failed(
                                content,
                                format!(
                                    "\"{}\" not found on line {}",
                                    truncate_for_display(&edit.old_value, DISPLAY_LEN),
                                    hint
                                ),
                                description,
                            );
                        }
                    }
                }
                None => {
                    if let Some(offset) = current.find(&edit.old_value) {
                        changed_line = Some(line_of_offset(&current, offset));
                        current = current.replacen(&edit.old_value, &edit.new_value, 1);
                    } else {
                        return PatchResult::failed(
                            content,
                            format!(
                                "\"{}\" not found in file",
                                truncate_for_display(&edit.old_value, DISPLAY_LEN)
                            ),
                            description,
                        );
                    }
                }
            }
        }

        if edit.changes_href() {
            let old_href = edit.old_href.as_deref().unwrap_or_default();
            let new_href = edit.new_href.as_deref().unwrap_or_default();
            if current.contains(old_href) {
                current = current.replacen(old_href, new_href, 1);
            } else {
                // Soft warning: the text-only result (if any) still stands.
                log::warn!(
                    "href \"{}\" not found while patching {}; text change kept",
                    old_href,
                    edit.element_name
                );
            }
        }

        PatchResult {
            success: true,
            content: current,
            changed_line,
            reason: None,
            path: Some(PatchPath::Fallback {
                reason: fallback_reason,
            }),
            description,
        }
    }
}

fn build_surgical_prompt(content: &str, file_path: &str, edit: &EditInstruction) -> String {
    let hint = edit.line.unwrap_or(1);
    let lines: Vec<&str> = content.lines().collect();
    let center = (hint as usize).saturating_sub(1).min(lines.len().saturating_sub(1));
    let from = center.saturating_sub(CONTEXT_RADIUS);
    let to = (center + CONTEXT_RADIUS + 1).min(lines.len());
    let window: String = (from..to)
        .map(|i| format!("{}: {}\n", i + 1, lines[i]))
        .collect();

    let change = match (edit.changes_text(), edit.changes_href()) {
        (true, true) => format!(
            "Change the text from \"{}\" to \"{}\" AND the link target from \"{}\" to \"{}\". \
             Both changes must be covered by a single search/replace pair spanning the \
             enclosing tag.",
            edit.old_value,
            edit.new_value,
            edit.old_href.as_deref().unwrap_or_default(),
            edit.new_href.as_deref().unwrap_or_default()
        ),
        (true, false) => format!(
            "Change the text from \"{}\" to \"{}\".",
            edit.old_value, edit.new_value
        ),
        _ => format!(
            "Change the link target from \"{}\" to \"{}\". The visible text stays \"{}\".",
            edit.old_href.as_deref().unwrap_or_default(),
            edit.new_href.as_deref().unwrap_or_default(),
            edit.old_value
        ),
    };

    format!(
        "File: {path}\nElement: {name} ({kind})\n\nContext around line {hint}:\n{window}\n{change}",
        path = file_path,
        name = edit.element_name,
        kind = edit.element_type.as_str(),
        hint = hint,
        window = window,
        change = change
    )
}

/// Replace the first occurrence of `old` within one specific 1-based
/// line, case-sensitive. `None` when the line is absent or does not
/// contain `old`. Every other byte of the file, line terminators
/// included, passes through untouched.
fn replace_on_line(content: &str, line: u32, old: &str, new: &str) -> Option<String> {
    if line == 0 {
        return None;
    }
    let idx = (line - 1) as usize;
    let segments: Vec<&str> = content.split_inclusive('\n').collect();
    let target = segments.get(idx)?;
    if !target.contains(old) {
        return None;
    }
    let replaced = target.replacen(old, new, 1);

    let mut out = String::with_capacity(content.len() + new.len());
    for (i, segment) in segments.iter().enumerate() {
        if i == idx {
            out.push_str(&replaced);
        } else {
            out.push_str(segment);
        }
    }
    Some(out)
}

/// One-line audit summary with values truncated for display.
fn describe_edit(edit: &EditInstruction) -> String {
    let mut description = format!(
        "Update {}: \"{}\" → \"{}\"",
        edit.element_name,
        truncate_for_display(&edit.old_value, DISPLAY_LEN),
        truncate_for_display(&edit.new_value, DISPLAY_LEN)
    );
    if edit.changes_href() {
        description.push_str(&format!(
            ", href: \"{}\" → \"{}\"",
            truncate_for_display(edit.old_href.as_deref().unwrap_or_default(), DISPLAY_LEN),
            truncate_for_display(edit.new_href.as_deref().unwrap_or_default(), DISPLAY_LEN)
        ));
    }
    description
}

fn line_of_offset(content: &str, offset: usize) -> u32 {
    (content[..offset].matches('\n').count() + 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElementType;
    use crate::test_support::ScriptedOracle;
    use serde_json::json;

    fn edit(old: &str, new: &str, line: Option<u32>) -> EditInstruction {
        EditInstruction {
            element_name: "Primary CTA".into(),
            element_type: ElementType::Button,
            old_value: old.into(),
            new_value: new.into(),
            old_href: None,
            new_href: None,
            line,
        }
    }

    #[tokio::test]
    async fn noop_edit_succeeds_without_touching_content() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "const label = \"Hello\";\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Hello", "Hello", Some(1)))
            .await;
        assert!(result.success);
        assert_eq!(result.content, content);
        assert!(result.path.is_none());
    }

    #[tokio::test]
    async fn oracle_tier_applies_verified_replacement() {
        let oracle = ScriptedOracle::new().with_structured(json!({
            "searchString": "<h1>Welcome to Acme</h1>",
            "replaceString": "<h1>Welcome to Apex</h1>",
            "lineNumber": 2,
            "confidence": "high"
        }));
        let engine = PatchEngine::new(&oracle);
        let content = "<section>\n  <h1>Welcome to Acme</h1>\n</section>\n";

        let result = engine
            .apply_edit(
                content,
                "src/Hero.tsx",
                &edit("Welcome to Acme", "Welcome to Apex", Some(2)),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.path, Some(PatchPath::Oracle));
        assert_eq!(result.changed_line, Some(2));
        assert!(result.content.contains("Welcome to Apex"));
        assert!(!result.content.contains("Welcome to Acme"));
    }

    #[tokio::test]
    async fn oracle_search_miss_falls_back() {
        let oracle = ScriptedOracle::new().with_structured(json!({
            "searchString": "<h1>Not In The File</h1>",
            "replaceString": "<h1>Welcome to Apex</h1>",
            "lineNumber": 2,
            "confidence": "high"
        }));
        let engine = PatchEngine::new(&oracle);
        let content = "<section>\n  <h1>Welcome to Acme</h1>\n</section>\n";

        let result = engine
            .apply_edit(
                content,
                "src/Hero.tsx",
                &edit("Welcome to Acme", "Welcome to Apex", Some(2)),
            )
            .await;
        assert!(result.success);
        match result.path {
            Some(PatchPath::Fallback { ref reason }) => {
                assert!(reason.contains("not found"));
            }
            ref other => panic!("expected fallback, got {:?}", other),
        }
        assert!(result.content.contains("Welcome to Apex"));
    }

    #[tokio::test]
    async fn ambiguous_low_confidence_is_rejected() {
        let oracle = ScriptedOracle::new().with_structured(json!({
            "searchString": "Save",
            "replaceString": "Store",
            "lineNumber": 1,
            "confidence": "low"
        }));
        let engine = PatchEngine::new(&oracle);
        let content = "<button>Save</button>\n<a>Save</a>\n<span>Save draft</span>\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Save draft", "Keep draft", Some(3)))
            .await;
        // Tier 1 is rejected for ambiguity; tier 2 edits only line 3.
        assert!(result.success);
        assert!(matches!(result.path, Some(PatchPath::Fallback { .. })));
        assert_eq!(
            result.content,
            "<button>Save</button>\n<a>Save</a>\n<span>Keep draft</span>\n"
        );
    }

    #[tokio::test]
    async fn unverified_new_text_falls_back() {
        // The oracle replaces the wrong thing; the gate notices the new
        // value never appeared.
        let oracle = ScriptedOracle::new().with_structured(json!({
            "searchString": "<section>",
            "replaceString": "<section id=\"hero\">",
            "lineNumber": 1,
            "confidence": "high"
        }));
        let engine = PatchEngine::new(&oracle);
        let content = "<section>\n  <h1>Welcome to Acme</h1>\n</section>\n";

        let result = engine
            .apply_edit(
                content,
                "src/Hero.tsx",
                &edit("Welcome to Acme", "Welcome to Apex", Some(2)),
            )
            .await;
        assert!(result.success);
        assert!(matches!(result.path, Some(PatchPath::Fallback { .. })));
        assert!(result.content.contains("Welcome to Apex"));
        // Tier 1's candidate was discarded entirely.
        assert!(!result.content.contains("id=\"hero\""));
    }

    #[tokio::test]
    async fn fallback_replaces_only_the_hinted_line() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "\n\n\n\nSale Sale\n\n\n\nSale\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Sale", "Deal", Some(9)))
            .await;
        assert!(result.success);
        assert_eq!(result.changed_line, Some(9));
        assert_eq!(result.content, "\n\n\n\nSale Sale\n\n\n\nDeal\n");
    }

    #[tokio::test]
    async fn fallback_keeps_crlf_line_endings() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "<header>\r\n<h1>Old Title</h1>\r\n<p>Body stays</p>\r\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Old Title", "New Title", Some(2)))
            .await;
        assert!(result.success);
        assert_eq!(
            result.content,
            "<header>\r\n<h1>New Title</h1>\r\n<p>Body stays</p>\r\n"
        );
    }

    #[tokio::test]
    async fn fallback_line_scoped_miss_fails_without_widening() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "line one\nSale is here\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Sale", "Deal", Some(1)))
            .await;
        assert!(!result.success);
        assert_eq!(result.content, content);
        let reason = result.reason.unwrap();
        assert!(reason.contains("line 1"));
    }

    #[tokio::test]
    async fn fallback_without_hint_searches_whole_file() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "a\nb\nOld copy here\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Old copy", "New copy", None))
            .await;
        assert!(result.success);
        assert_eq!(result.changed_line, Some(3));
        assert!(result.content.contains("New copy here"));
    }

    #[tokio::test]
    async fn fallback_missing_value_fails_byte_identical() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "nothing relevant\n";

        let result = engine
            .apply_edit(content, "src/a.tsx", &edit("Absent", "Present", None))
            .await;
        assert!(!result.success);
        assert_eq!(result.content, content);
        assert!(result.path.is_none());
    }

    #[tokio::test]
    async fn fallback_applies_text_and_href_together() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "<a href=\"/old\">Click</a>\n";

        let mut instruction = edit("Click", "Go", Some(1));
        instruction.element_type = ElementType::Link;
        instruction.old_href = Some("/old".into());
        instruction.new_href = Some("/new".into());

        let result = engine.apply_edit(content, "src/a.tsx", &instruction).await;
        assert!(result.success);
        assert_eq!(result.content, "<a href=\"/new\">Go</a>\n");
    }

    #[tokio::test]
    async fn missing_href_is_a_soft_warning() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let content = "<a href=\"/already-moved\">Click</a>\n";

        let mut instruction = edit("Click", "Go", Some(1));
        instruction.old_href = Some("/old".into());
        instruction.new_href = Some("/new".into());

        let result = engine.apply_edit(content, "src/a.tsx", &instruction).await;
        // The text-only result is still the outcome.
        assert!(result.success);
        assert_eq!(result.content, "<a href=\"/already-moved\">Go</a>\n");
    }

    #[tokio::test]
    async fn description_truncates_long_values() {
        let oracle = ScriptedOracle::new();
        let engine = PatchEngine::new(&oracle);
        let long_old = "word ".repeat(30);
        let content = format!("{}\n", long_old.trim());

        let result = engine
            .apply_edit(&content, "src/a.tsx", &edit(long_old.trim(), "Short", Some(1)))
            .await;
        assert!(result.description.starts_with("Update Primary CTA: \""));
        assert!(result.description.contains("..."));
        assert!(result.description.contains("\"Short\""));
    }
}
