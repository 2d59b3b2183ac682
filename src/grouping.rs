//! Section grouping.
//!
//! Partitions extracted elements into logical page sections. The oracle
//! assigns role-based titles ("Primary CTA") rather than content-derived
//! ones, so names stay valid after the underlying text changes. A total
//! deterministic fallback splits on headings whenever the oracle call
//! fails or returns unparseable output.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{truncate_for_display, ElementType, RawElement, SectionElement, SectionGroup};
use crate::oracle::{OracleResponse, TextOracle};

/// An extracted element bound to its source file, the grouping input.
#[derive(Debug, Clone)]
pub struct FileElement {
    pub file_path: String,
    pub element: RawElement,
}

pub struct SectionGrouper<'a> {
    oracle: &'a dyn TextOracle,
}

impl<'a> SectionGrouper<'a> {
    pub fn new(oracle: &'a dyn TextOracle) -> Self {
        Self { oracle }
    }

    /// Group elements into sections, top-to-bottom reading order.
    pub async fn group(&self, mut elements: Vec<FileElement>) -> Vec<SectionGroup> {
        if elements.is_empty() {
            return Vec::new();
        }

        // Reading order before anything else; the oracle sees and returns
        // indices into this ordering.
        elements.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.element.line.cmp(&b.element.line))
        });

        let mut sections = match self.group_with_oracle(&elements).await {
            Some(sections) if !sections.is_empty() => sections,
            _ => {
                log::warn!("section grouping fell back to heading splits");
                fallback_sections(&elements)
            }
        };

        // Stable top-to-bottom presentation regardless of oracle ordering.
        sections.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.start_line.cmp(&b.start_line))
        });
        sections
    }

    async fn group_with_oracle(&self, elements: &[FileElement]) -> Option<Vec<SectionGroup>> {
        let listing: String = elements
            .iter()
            .enumerate()
            .map(|(i, fe)| {
                format!(
                    "{}. [{}] \"{}\" ({}:{})\n",
                    i,
                    fe.element.element_type.as_str(),
                    truncate_for_display(&fe.element.content, 60),
                    fe.file_path,
                    fe.element.line
                )
            })
            .collect();

        let system = "You organize website copy elements into logical page \
                      sections for a content editing tool. Respond with a JSON array only.";
        let prompt = format!(
            "Partition these indexed elements into sections. Emit a JSON array of \
             {{\"name\": section name, \"description\": optional, \"elements\": \
             [{{\"idx\": element index, \"title\": element title}}]}}. Titles must \
             describe the element's ROLE (e.g. \"Primary CTA\"), never its current \
             text (not \"Learn More Button\"), so they stay valid after edits. \
             Every element needs a title.\n\nElements:\n{}",
            listing
        );

        let text = match self.oracle.generate_text(system, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("section grouping oracle call failed: {}", e);
                return None;
            }
        };

        #[derive(Deserialize)]
        struct OracleSection {
            name: String,
            #[serde(default)]
            description: Option<String>,
            #[serde(default)]
            elements: Vec<Value>,
        }

        let parsed: Vec<OracleSection> =
            match OracleResponse::<Vec<OracleSection>>::from_text_array(&text) {
                OracleResponse::Parsed(list) => list,
                OracleResponse::Malformed(_) => return None,
            };

        let mut sections = Vec::new();
        for raw_section in parsed {
            let mut members = Vec::new();
            let mut file_path: Option<String> = None;

            for entry in &raw_section.elements {
                // Two historical shapes: {idx, title} objects, or bare
                // indices. A bare index has no title, and title is
                // mandatory, so the element is dropped.
                let (idx, title) = match entry {
                    Value::Object(obj) => {
                        let idx = obj.get("idx").and_then(|v| v.as_u64());
                        let title = obj
                            .get("title")
                            .and_then(|v| v.as_str())
                            .filter(|t| !t.trim().is_empty());
                        match (idx, title) {
                            (Some(idx), Some(title)) => (idx as usize, title.to_string()),
                            _ => continue,
                        }
                    }
                    Value::Number(_) => continue,
                    _ => continue,
                };

                let Some(fe) = elements.get(idx) else {
                    continue;
                };
                file_path.get_or_insert_with(|| fe.file_path.clone());
                members.push(SectionElement {
                    name: title,
                    element_type: fe.element.element_type,
                    content: fe.element.content.clone(),
                    line: fe.element.line,
                    href: fe.element.href.clone(),
                });
            }

            if members.is_empty() {
                continue;
            }
            let start_line = members.iter().map(|m| m.line).min().unwrap_or(0);
            let end_line = members.iter().map(|m| m.line).max().unwrap_or(0);
            sections.push(SectionGroup {
                name: raw_section.name,
                description: raw_section.description,
                file_path: file_path.unwrap_or_default(),
                start_line,
                end_line,
                elements: members,
            });
        }

        Some(sections)
    }
}

/// Deterministic heading-split fallback. Total: never fails and never
/// drops elements.
pub fn fallback_sections(elements: &[FileElement]) -> Vec<SectionGroup> {
    let mut sections: Vec<SectionGroup> = Vec::new();
    let mut current: Vec<&FileElement> = Vec::new();

    let flush = |current: &mut Vec<&FileElement>, sections: &mut Vec<SectionGroup>| {
        if current.is_empty() {
            return;
        }
        let members: Vec<SectionElement> = current
            .iter()
            .map(|fe| SectionElement {
                name: synthesize_name(&fe.element),
                element_type: fe.element.element_type,
                content: fe.element.content.clone(),
                line: fe.element.line,
                href: fe.element.href.clone(),
            })
            .collect();
        let start_line = members.iter().map(|m| m.line).min().unwrap_or(0);
        let end_line = members.iter().map(|m| m.line).max().unwrap_or(0);
        sections.push(SectionGroup {
            name: format!("Section {}", sections.len() + 1),
            description: None,
            file_path: current[0].file_path.clone(),
            start_line,
            end_line,
            elements: members,
        });
        current.clear();
    };

    let mut prev_file: Option<&str> = None;
    for fe in elements {
        let file_changed = prev_file.is_some_and(|p| p != fe.file_path);
        let heading_split =
            fe.element.element_type == ElementType::Heading && !current.is_empty();
        if file_changed || heading_split {
            flush(&mut current, &mut sections);
        }
        current.push(fe);
        prev_file = Some(&fe.file_path);
    }
    flush(&mut current, &mut sections);

    sections
}

fn synthesize_name(element: &RawElement) -> String {
    let label = match element.element_type {
        ElementType::Heading => "Heading",
        ElementType::Paragraph => "Paragraph",
        ElementType::Button => "Button",
        ElementType::Link => "Link",
        ElementType::ImageAlt => "Image Alt",
        ElementType::Text => "Text",
        ElementType::Attribute => "Attribute",
        ElementType::Custom => "Element",
    };
    format!("{}: {}", label, truncate_for_display(&element.content, 30))
}
