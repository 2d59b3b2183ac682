//! Template extraction for repeating blocks.
//!
//! Derives a reusable per-item template (`{{TEXT}}` / `{{HREF}}`
//! placeholders only) from a detected list such as a row of nav links,
//! then synthesizes add-item and remove-item changes from it. Insertion
//! is always at the end of the group; mid-list insertion is a documented
//! extension point, not supported here.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::models::{ElementGroup, Template};
use crate::oracle::{OracleResponse, TextOracle};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{([A-Z_]+)\}\}").unwrap();
}

pub struct TemplateExtractor<'a> {
    oracle: &'a dyn TextOracle,
}

impl<'a> TemplateExtractor<'a> {
    pub fn new(oracle: &'a dyn TextOracle) -> Self {
        Self { oracle }
    }

    /// Derive a template from the repeating block at `start_line..=end_line`.
    ///
    /// Returns `None` when the oracle fails or produces a template that
    /// violates the placeholder contract.
    pub async fn extract_template(
        &self,
        content: &str,
        file_path: &str,
        start_line: u32,
        end_line: u32,
        item_count: u32,
    ) -> Option<Template> {
        let lines: Vec<&str> = content.lines().collect();
        let from = (start_line as usize).saturating_sub(1);
        let to = (end_line as usize).min(lines.len());
        if from >= to {
            return None;
        }
        let block = lines[from..to].join("\n");

        let schema = json!({
            "type": "object",
            "properties": {
                "template": { "type": "string" },
                "containerTag": { "type": "string" },
                "containerClass": { "type": ["string", "null"] },
                "indentation": { "type": "string" }
            },
            "required": ["template", "containerTag", "indentation"],
            "additionalProperties": false
        });

        let system = "You derive per-item markup templates from repeated \
                      blocks for a content editing tool.";
        let prompt = format!(
            "This block from {path} (lines {start}-{end}) repeats {count} similar items:\n\n\
             {block}\n\n\
             Produce ONE template string for a single item. Use the placeholder \
             {{{{TEXT}}}} for the item's visible text and, only if items carry a link \
             target, {{{{HREF}}}} for it. Use NO other placeholder names and no \
             additional placeholders. Also report the container tag, its class if \
             any, and the exact whitespace indentation used per item.",
            path = file_path,
            start = start_line,
            end = end_line,
            count = item_count,
            block = block
        );

        let value = match self.oracle.generate_structured(system, &prompt, &schema).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("template extraction failed for {}: {}", file_path, e);
                return None;
            }
        };

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct OracleTemplate {
            template: String,
            container_tag: String,
            #[serde(default)]
            container_class: Option<String>,
            #[serde(default)]
            indentation: String,
        }

        let parsed = match OracleResponse::<OracleTemplate>::from_value(value) {
            OracleResponse::Parsed(t) => t,
            OracleResponse::Malformed(raw) => {
                log::warn!("malformed template response for {}: {}", file_path, raw);
                return None;
            }
        };

        if !template_placeholders_valid(&parsed.template) {
            log::warn!(
                "template for {} violated the placeholder contract: {}",
                file_path,
                parsed.template
            );
            return None;
        }

        Some(Template {
            template: parsed.template,
            container_tag: parsed.container_tag,
            container_class: parsed.container_class.filter(|c| !c.is_empty()),
            indentation: parsed.indentation,
        })
    }
}

/// Only `{{TEXT}}` (mandatory) and `{{HREF}}` (optional) may appear.
fn template_placeholders_valid(template: &str) -> bool {
    let mut saw_text = false;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        match &caps[1] {
            "TEXT" => saw_text = true,
            "HREF" => {}
            _ => return false,
        }
    }
    saw_text
}

/// Pure substitution: every `{{KEY}}` occurrence becomes `values[KEY]`.
/// Unknown keys are left untouched, which makes partial value sets safe
/// for previews.
pub fn fill_template(template: &str, values: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| {
            match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Synthesize an add-item change: the filled, indented snippet is inserted
/// after the group's end line. The file's own line terminator is reused
/// and all surrounding bytes pass through untouched.
pub fn add_item(content: &str, group: &ElementGroup, values: &HashMap<String, String>) -> Option<String> {
    let template = group.template.as_ref()?;
    let filled = fill_template(&template.template, values);
    let eol = line_terminator(content);
    let snippet: String = filled
        .lines()
        .map(|l| format!("{}{}{}", template.indentation, l, eol))
        .collect();

    let segments: Vec<&str> = content.split_inclusive('\n').collect();
    let at = (group.end_line as usize).min(segments.len());

    let mut out = String::with_capacity(content.len() + snippet.len() + eol.len());
    if at == 0 {
        out.push_str(&snippet);
    }
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(segment);
        if i + 1 == at {
            if !segment.ends_with('\n') {
                out.push_str(eol);
            }
            out.push_str(&snippet);
        }
    }
    if !content.ends_with('\n') && out.ends_with(eol) {
        out.truncate(out.len() - eol.len());
    }
    Some(out)
}

/// Synthesize a delete-item change: the 1-based inclusive line range
/// occupied by one item is removed, terminators included.
pub fn remove_item(content: &str, start_line: u32, end_line: u32) -> String {
    let from = (start_line as usize).saturating_sub(1);
    content
        .split_inclusive('\n')
        .enumerate()
        .filter(|(i, _)| *i < from || *i >= end_line as usize)
        .map(|(_, segment)| segment)
        .collect()
}

fn line_terminator(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
