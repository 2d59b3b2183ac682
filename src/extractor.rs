//! Element Extractor.
//!
//! Produces candidate editable elements from one file's text. Two
//! interchangeable strategies share one output contract: a deterministic
//! rule-based pass over markup patterns, and an oracle-assisted pass that
//! asks the model for the same element list directly. Neither strategy is
//! permitted to raise for a single file — failures narrow to zero
//! elements so a many-files batch analysis always completes.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::models::{ElementType, RawElement};
use crate::oracle::{OracleResponse, TextOracle};

/// Confidence attached to every rule-based match.
pub const RULE_CONFIDENCE: f32 = 0.9;

const MIN_CONTENT_LEN: usize = 2;
const MAX_CONTENT_LEN: usize = 500;

/// Extensions the rule-based strategy understands; everything else yields
/// an empty list.
const MARKUP_EXTENSIONS: &[&str] = &["jsx", "tsx", "js", "ts", "html", "astro", "vue", "svelte"];

lazy_static! {
    // Multi-line structural patterns, matched against the whole file in
    // fixed precedence order.
    static ref HEADING_RE: Regex = Regex::new(r"(?is)<h[1-6]\b[^>]*>(.*?)</h[1-6]>").unwrap();
    static ref PARAGRAPH_RE: Regex = Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap();
    static ref BUTTON_RE: Regex = Regex::new(r"(?is)<button\b[^>]*>(.*?)</button>").unwrap();
    static ref LINK_RE: Regex = Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").unwrap();
    static ref SPAN_RE: Regex = Regex::new(r"(?is)<span\b[^>]*>(.*?)</span>").unwrap();
    static ref SHORT_DIV_RE: Regex = Regex::new(r"(?is)<div\b[^>]*>([^<>{}]{3,50})</div>").unwrap();

    static ref HREF_RE: Regex = Regex::new(r#"(?i)href\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();

    // Single-line patterns, scanned per physical line.
    static ref ATTR_RE: Regex =
        Regex::new(r#"(?i)\b(title|alt|placeholder|aria-label)\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref JSX_TEXT_RE: Regex =
        Regex::new(r#"\{\s*(?:"([^"]{3,})"|'([^']{3,})')\s*\}"#).unwrap();
}

/// Strategy selector; output shape is identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    RuleBased,
    OracleAssisted,
}

pub struct ElementExtractor<'a> {
    oracle: &'a dyn TextOracle,
}

impl<'a> ElementExtractor<'a> {
    pub fn new(oracle: &'a dyn TextOracle) -> Self {
        Self { oracle }
    }

    /// Extract candidate elements from one file. Never fails: an
    /// unparsable file or a misbehaving oracle yields zero elements.
    pub async fn extract(
        &self,
        content: &str,
        file_path: &str,
        strategy: ExtractionStrategy,
    ) -> Vec<RawElement> {
        match strategy {
            ExtractionStrategy::RuleBased => extract_with_rules(content, file_path),
            ExtractionStrategy::OracleAssisted => self.extract_with_oracle(content, file_path).await,
        }
    }

    async fn extract_with_oracle(&self, content: &str, file_path: &str) -> Vec<RawElement> {
        let numbered: String = content
            .lines()
            .enumerate()
            .map(|(i, l)| format!("{}: {}\n", i + 1, l))
            .collect();

        let system = "You identify user-facing text content in source files \
                      for a copy-editing tool. Respond with a JSON array only.";
        let prompt = format!(
            "List every piece of user-facing text in {path}. For each, emit an object \
             {{\"type\": one of heading|paragraph|button|link|image-alt|text|attribute, \
             \"content\": the exact text, \"line\": its 1-based line number, \
             \"href\": the link target if the element is a link, \
             \"confidence\": 0-1}}. \
             Keep repeated items (e.g. multiple nav links with the same label) as \
             separate entries - do not merge them. Skip code identifiers, class names \
             and configuration values.\n\nFile with line numbers:\n{numbered}",
            path = file_path,
            numbered = numbered
        );

        let text = match self.oracle.generate_text(system, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("oracle extraction failed for {}: {}", file_path, e);
                return Vec::new();
            }
        };

        #[derive(Deserialize)]
        struct OracleElement {
            #[serde(rename = "type")]
            element_type: String,
            content: String,
            #[serde(default)]
            line: u32,
            #[serde(default)]
            href: Option<String>,
            #[serde(default)]
            confidence: Option<f32>,
        }

        let parsed: Vec<OracleElement> =
            match OracleResponse::<Vec<OracleElement>>::from_text_array(&text) {
                OracleResponse::Parsed(list) => list,
                OracleResponse::Malformed(raw) => {
                    log::warn!(
                        "unparseable oracle extraction output for {} ({} chars)",
                        file_path,
                        raw.len()
                    );
                    return Vec::new();
                }
            };

        // The length/punctuation guard is reapplied regardless of which
        // strategy produced the candidates.
        parsed
            .into_iter()
            .filter_map(|e| {
                let cleaned = clean_text(&e.content);
                if !passes_content_guard(&cleaned) {
                    return None;
                }
                Some(RawElement {
                    element_type: ElementType::parse(&e.element_type),
                    content: cleaned,
                    line: e.line,
                    context: None,
                    href: e.href.filter(|h| !h.is_empty()),
                    confidence: e.confidence.map(|c| c.clamp(0.0, 1.0)),
                })
            })
            .collect()
    }
}

/// Whether the rule-based strategy understands this file's extension.
pub fn is_markup_file(path: &str) -> bool {
    MARKUP_EXTENSIONS.contains(&path.rsplit('.').next().unwrap_or(""))
}

/// Deterministic, oracle-free extraction pass.
///
/// Elements are deduplicated by (type, cleaned content), so repeated
/// labels of the same type collapse to one entry. Known limitation:
/// group/template handling downstream covers legitimate repetition.
pub fn extract_with_rules(content: &str, file_path: &str) -> Vec<RawElement> {
    let ext = file_path.rsplit('.').next().unwrap_or("");
    if !MARKUP_EXTENSIONS.contains(&ext) {
        return Vec::new();
    }

    let mut elements = Vec::new();

    // Structural pass, fixed precedence order.
    collect_tag_matches(content, &HEADING_RE, ElementType::Heading, &mut elements);
    collect_tag_matches(content, &PARAGRAPH_RE, ElementType::Paragraph, &mut elements);
    collect_tag_matches(content, &BUTTON_RE, ElementType::Button, &mut elements);
    collect_link_matches(content, &mut elements);
    collect_tag_matches(content, &SPAN_RE, ElementType::Text, &mut elements);
    collect_tag_matches(content, &SHORT_DIV_RE, ElementType::Text, &mut elements);

    // Per-line pass, independent of the structural one.
    for (idx, line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;

        for caps in ATTR_RE.captures_iter(line) {
            let attr = caps[1].to_ascii_lowercase();
            let element_type = if attr == "alt" {
                ElementType::ImageAlt
            } else {
                ElementType::Attribute
            };
            push_candidate(&mut elements, element_type, &caps[2], line_no, content, None);
        }

        for caps in JSX_TEXT_RE.captures_iter(line) {
            let quoted = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            if let Some(text) = quoted {
                push_candidate(&mut elements, ElementType::Text, text, line_no, content, None);
            }
        }

        if looks_like_bare_prose(line) {
            push_candidate(
                &mut elements,
                ElementType::Text,
                line.trim(),
                line_no,
                content,
                None,
            );
        }
    }

    dedup_by_type_and_content(elements)
}

fn collect_tag_matches(
    content: &str,
    pattern: &Regex,
    element_type: ElementType,
    out: &mut Vec<RawElement>,
) {
    for caps in pattern.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let line = line_of_offset(content, whole.start());
        push_candidate(out, element_type, inner, line, content, None);
    }
}

fn collect_link_matches(content: &str, out: &mut Vec<RawElement>) {
    for caps in LINK_RE.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let inner = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let href = HREF_RE
            .captures(attrs)
            .map(|h| h[1].to_string())
            .filter(|h| !h.is_empty());
        let line = line_of_offset(content, whole.start());
        push_candidate(out, ElementType::Link, inner, line, content, href);
    }
}

fn push_candidate(
    out: &mut Vec<RawElement>,
    element_type: ElementType,
    raw: &str,
    line: u32,
    content: &str,
    href: Option<String>,
) {
    let cleaned = clean_text(raw);
    if !passes_content_guard(&cleaned) {
        return;
    }
    out.push(RawElement {
        element_type,
        content: cleaned,
        line,
        context: context_window(content, line),
        href,
        confidence: Some(RULE_CONFIDENCE),
    });
}

/// Strip nested tags and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accept 2-500 chars that are not solely punctuation/digits/whitespace.
pub fn passes_content_guard(cleaned: &str) -> bool {
    let len = cleaned.chars().count();
    if !(MIN_CONTENT_LEN..=MAX_CONTENT_LEN).contains(&len) {
        return false;
    }
    cleaned.chars().any(|c| c.is_alphabetic())
}

/// Heuristic for bare prose sitting between tags on its own line.
fn looks_like_bare_prose(line: &str) -> bool {
    let trimmed = line.trim();
    let len = trimmed.chars().count();
    if !(10..=100).contains(&len) {
        return false;
    }
    if trimmed.contains(['<', '>', '{', '}']) {
        return false;
    }
    trimmed
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

fn line_of_offset(content: &str, offset: usize) -> u32 {
    (content[..offset].matches('\n').count() + 1) as u32
}

fn context_window(content: &str, line: u32) -> Option<String> {
    if line == 0 {
        return None;
    }
    let lines: Vec<&str> = content.lines().collect();
    let idx = (line as usize).saturating_sub(1);
    if idx >= lines.len() {
        return None;
    }
    let from = idx.saturating_sub(2);
    let to = (idx + 3).min(lines.len());
    Some(lines[from..to].join("\n"))
}

fn dedup_by_type_and_content(elements: Vec<RawElement>) -> Vec<RawElement> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(elements.len());
    for e in elements {
        if seen.insert((e.element_type, e.content.clone())) {
            out.push(e);
        }
    }
    out
}
