//! Shared data model for the patch pipeline.
//!
//! These types flow between the extractor, grouping, template, patch and
//! publish layers. Wire-facing structs use camelCase field names so the
//! payloads persisted by the application layer stay stable.

use serde::{Deserialize, Serialize};

/// Kind of user-facing content an element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Heading,
    Paragraph,
    Button,
    Link,
    ImageAlt,
    Text,
    Attribute,
    Custom,
}

impl ElementType {
    /// Parse the loose type strings the oracle emits. Unknown kinds map to
    /// `Text` rather than being dropped.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "heading" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ElementType::Heading,
            "paragraph" | "p" => ElementType::Paragraph,
            "button" => ElementType::Button,
            "link" | "a" | "anchor" => ElementType::Link,
            "image-alt" | "alt" => ElementType::ImageAlt,
            "attribute" => ElementType::Attribute,
            "custom" => ElementType::Custom,
            _ => ElementType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Heading => "heading",
            ElementType::Paragraph => "paragraph",
            ElementType::Button => "button",
            ElementType::Link => "link",
            ElementType::ImageAlt => "image-alt",
            ElementType::Text => "text",
            ElementType::Attribute => "attribute",
            ElementType::Custom => "custom",
        }
    }
}

/// A located, named point of user-facing content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableElement {
    /// Stable identifier
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Human name/title (role-based, e.g. "Primary CTA")
    pub name: String,
    /// Source file path, repository-relative
    pub file_path: String,
    /// 1-based line number (0 = position unknown)
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// 3-lines-before/after snapshot for diff rendering independent of
    /// later file drift
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Current text value
    pub value: String,
    /// Link target when the element is link-like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_index: Option<u32>,
    /// 0-1 score from whichever extraction path produced this element
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl EditableElement {
    pub fn new(element_type: ElementType, name: &str, file_path: &str, line: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            element_type,
            name: name.to_string(),
            file_path: file_path.to_string(),
            line,
            column: None,
            context: None,
            value: String::new(),
            href: None,
            group_id: None,
            group_index: None,
            confidence: 1.0,
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// Content kind a template placeholder substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderType {
    Text,
    Href,
    Src,
    Alt,
}

/// A named placeholder inside a group template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePlaceholder {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content_type: PlaceholderType,
}

/// Reusable per-item markup template derived from a repeating block.
///
/// Placeholders are limited to `{{TEXT}}` and `{{HREF}}`; finer-grained
/// templating is intentionally avoided to keep add/remove tractable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub template: String,
    pub container_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_class: Option<String>,
    /// Whitespace prefix applied to each item line on insertion
    pub indentation: String,
}

/// A detected list/repeating structure (e.g. nav links).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementGroup {
    pub id: String,
    pub name: String,
    pub file_path: String,
    /// 1-based inclusive line span of the whole group
    pub start_line: u32,
    pub end_line: u32,
    pub item_count: u32,
    /// Null until template extraction runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,
    pub placeholders: Vec<TemplatePlaceholder>,
}

/// Raw extractor output: one candidate editable element before grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub content: String,
    /// 1-based source line
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// 0-1 score; fixed at 0.9 for the rule-based path, as reported for
    /// the oracle-assisted path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// A named member of a section, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionElement {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub content: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// A logical page section grouping related elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub elements: Vec<SectionElement>,
}

/// The unit of work submitted to the patch engine.
///
/// A link-target change is tracked independently of a text change; either,
/// both, or neither of the href fields may be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditInstruction {
    pub element_name: String,
    pub element_type: ElementType,
    pub old_value: String,
    pub new_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_href: Option<String>,
    /// 1-based line hint; absence forces content-search fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl EditInstruction {
    /// Whether the text value actually changes.
    pub fn changes_text(&self) -> bool {
        self.old_value != self.new_value
    }

    /// Whether a link-target change was requested.
    pub fn changes_href(&self) -> bool {
        match (&self.old_href, &self.new_href) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        }
    }
}

/// How a successful patch was produced, kept end to end for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "via")]
pub enum PatchPath {
    /// Oracle-guided surgical replace passed the verification gate
    Oracle,
    /// Deterministic fallback ran; `reason` records why the oracle tier
    /// was abandoned
    Fallback { reason: String },
}

/// Outcome of applying one [`EditInstruction`] to one file's content.
///
/// Invariant: when `success` is false, `content` is byte-identical to the
/// input — partial writes are never surfaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_line: Option<u32>,
    /// Human-readable failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// How the edit landed, when it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PatchPath>,
    /// One-line summary, always produced
    pub description: String,
}

impl PatchResult {
    pub fn failed(content: &str, reason: String, description: String) -> Self {
        Self {
            success: false,
            content: content.to_string(),
            changed_line: None,
            reason: Some(reason),
            path: None,
            description,
        }
    }
}

/// An aggregated, file-scoped change ready to commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    pub file_path: String,
    pub original_content: String,
    pub new_content: String,
    /// One line per constituent edit, in edit order
    pub description: String,
}

/// An edit bound to its target file, as submitted to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEdit {
    pub file_path: String,
    pub instruction: EditInstruction,
}

/// Best-match position of a text fragment inside the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file_path: String,
    /// 1-based; 0 when the file matched but no line did
    pub line: u32,
    pub column: u32,
    /// Up to 5 lines: 2 before, match, 2 after
    pub context: String,
}

/// Truncate a value for human-readable summaries.
pub(crate) fn truncate_for_display(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_parse_is_lenient() {
        assert_eq!(ElementType::parse("Heading"), ElementType::Heading);
        assert_eq!(ElementType::parse("h2"), ElementType::Heading);
        assert_eq!(ElementType::parse("anchor"), ElementType::Link);
        assert_eq!(ElementType::parse("alt"), ElementType::ImageAlt);
        assert_eq!(ElementType::parse("garbage"), ElementType::Text);
    }

    #[test]
    fn href_change_requires_both_sides() {
        let mut edit = EditInstruction {
            element_name: "CTA".into(),
            element_type: ElementType::Link,
            old_value: "Click".into(),
            new_value: "Go".into(),
            old_href: Some("/old".into()),
            new_href: None,
            line: None,
        };
        assert!(!edit.changes_href());
        edit.new_href = Some("/new".into());
        assert!(edit.changes_href());
        edit.new_href = Some("/old".into());
        assert!(!edit.changes_href());
    }

    #[test]
    fn display_truncation() {
        assert_eq!(truncate_for_display("short", 50), "short");
        let long = "x".repeat(60);
        let shown = truncate_for_display(&long, 50);
        assert_eq!(shown.len(), 53);
        assert!(shown.ends_with("..."));
    }
}
