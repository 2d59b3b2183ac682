//! Repository analysis pipeline.
//!
//! Walks the remote tree, extracts candidate elements from every
//! markup-bearing source file, and groups them into sections. Files are
//! processed in small concurrent batches with a deliberate pause in
//! between — a throttling policy for the code host's rate limits, not a
//! correctness requirement. A single file failing narrows to zero
//! elements; only the tree listing itself is fatal to the pass.

use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::error::HostError;
use crate::events::{stage_names, StageObserver, StageOutcome};
use crate::extractor::{is_markup_file, ElementExtractor, ExtractionStrategy};
use crate::github::RepoHost;
use crate::grouping::{FileElement, SectionGrouper};
use crate::models::{EditableElement, SectionGroup};
use crate::oracle::TextOracle;

/// Directories worth scanning for user-facing copy.
const CANDIDATE_ROOTS: &[&str] = &["src/", "app/", "components/", "pages/"];

pub struct AnalysisReport {
    pub elements: Vec<FileElement>,
    pub sections: Vec<SectionGroup>,
    /// Identified editable elements, one per section member, ready for the
    /// application layer to persist
    pub catalog: Vec<EditableElement>,
    pub files_scanned: usize,
}

pub struct RepoAnalyzer<'a> {
    host: &'a dyn RepoHost,
    oracle: &'a dyn TextOracle,
    observer: &'a dyn StageObserver,
    batch_size: usize,
    batch_pause: Duration,
}

impl<'a> RepoAnalyzer<'a> {
    pub fn new(
        host: &'a dyn RepoHost,
        oracle: &'a dyn TextOracle,
        observer: &'a dyn StageObserver,
    ) -> Self {
        Self {
            host,
            oracle,
            observer,
            batch_size: 5,
            batch_pause: Duration::from_millis(1000),
        }
    }

    pub fn with_batching(mut self, batch_size: usize, batch_pause: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_pause = batch_pause;
        self
    }

    /// Run the full analysis pass over `git_ref`.
    pub async fn analyze(
        &self,
        git_ref: &str,
        strategy: ExtractionStrategy,
    ) -> Result<AnalysisReport, HostError> {
        let started = Instant::now();

        let tree = self.host.list_tree(git_ref, true).await.map_err(|e| {
            self.observer.on_stage_complete(
                stage_names::ANALYZE_REPO,
                started.elapsed().as_millis(),
                &StageOutcome::Failed(e.to_string()),
            );
            e
        })?;

        let paths: Vec<String> = tree
            .into_iter()
            .filter(|entry| entry.entry_type == "blob" && is_candidate_path(&entry.path))
            .map(|entry| entry.path)
            .collect();

        let extractor = ElementExtractor::new(self.oracle);
        let mut elements: Vec<FileElement> = Vec::new();

        for (batch_idx, batch) in paths.chunks(self.batch_size).enumerate() {
            if batch_idx > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }

            let futures = batch.iter().map(|path| {
                let extractor = &extractor;
                async move {
                    let file_started = Instant::now();
                    let extracted = match self.host.get_file(path, Some(git_ref)).await {
                        Ok(file) => extractor.extract(&file.content, path, strategy).await,
                        Err(e) => {
                            // Best-effort batch: one bad file must not
                            // stop the analysis.
                            log::warn!("skipping {} during analysis: {}", path, e);
                            Vec::new()
                        }
                    };
                    let outcome = if extracted.is_empty() {
                        StageOutcome::Degraded("no elements".to_string())
                    } else {
                        StageOutcome::Ok
                    };
                    self.observer.on_stage_complete(
                        stage_names::EXTRACT_FILE,
                        file_started.elapsed().as_millis(),
                        &outcome,
                    );
                    (path.clone(), extracted)
                }
            });

            for (path, extracted) in join_all(futures).await {
                elements.extend(extracted.into_iter().map(|element| FileElement {
                    file_path: path.clone(),
                    element,
                }));
            }
        }

        let group_started = Instant::now();
        let sections = SectionGrouper::new(self.oracle).group(elements.clone()).await;
        self.observer.on_stage_complete(
            stage_names::GROUP_SECTIONS,
            group_started.elapsed().as_millis(),
            &StageOutcome::Ok,
        );

        let catalog = catalog_from_sections(&sections, &elements);

        self.observer.on_stage_complete(
            stage_names::ANALYZE_REPO,
            started.elapsed().as_millis(),
            &StageOutcome::Ok,
        );

        Ok(AnalysisReport {
            files_scanned: paths.len(),
            elements,
            sections,
            catalog,
        })
    }
}

/// Materialize the editable-element catalog from the grouped sections:
/// each member gets a stable id, its role name, its section as group
/// membership, and the confidence of the extractor match it came from.
fn catalog_from_sections(
    sections: &[SectionGroup],
    elements: &[FileElement],
) -> Vec<EditableElement> {
    let mut catalog = Vec::new();
    for section in sections {
        let group_id = uuid::Uuid::new_v4().to_string();
        for (index, member) in section.elements.iter().enumerate() {
            let source = elements.iter().find(|fe| {
                fe.file_path == section.file_path
                    && fe.element.line == member.line
                    && fe.element.content == member.content
            });
            let mut element = EditableElement::new(
                member.element_type,
                &member.name,
                &section.file_path,
                member.line,
            )
            .with_value(&member.content)
            .with_confidence(source.and_then(|fe| fe.element.confidence).unwrap_or(1.0));
            element.href = member.href.clone();
            element.context = source.and_then(|fe| fe.element.context.clone());
            element.group_id = Some(group_id.clone());
            element.group_index = Some(index as u32);
            catalog.push(element);
        }
    }
    catalog
}

/// Markup files under the usual frontend roots, skipping dependencies,
/// dotfiles and tests.
fn is_candidate_path(path: &str) -> bool {
    if !is_markup_file(path) {
        return false;
    }
    if !CANDIDATE_ROOTS.iter().any(|root| path.starts_with(root)) {
        return false;
    }
    if path.contains("node_modules/") {
        return false;
    }
    if path.split('/').any(|segment| segment.starts_with('.')) {
        return false;
    }
    let lowered = path.to_ascii_lowercase();
    if lowered.contains(".test.") || lowered.contains(".spec.") || lowered.contains("__tests__/") {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::extractor::RULE_CONFIDENCE;
    use crate::models::ElementType;
    use crate::test_support::{InMemoryHost, ScriptedOracle};

    #[test]
    fn candidate_path_filtering() {
        assert!(is_candidate_path("src/Hero.tsx"));
        assert!(is_candidate_path("components/nav/Nav.jsx"));
        assert!(is_candidate_path("pages/index.astro"));
        assert!(!is_candidate_path("src/Hero.test.tsx"));
        assert!(!is_candidate_path("src/__tests__/Hero.tsx"));
        assert!(!is_candidate_path("src/node_modules/lib/index.js"));
        assert!(!is_candidate_path("src/.hidden/Hero.tsx"));
        assert!(!is_candidate_path("docs/guide.md"));
        assert!(!is_candidate_path("scripts/build.ts"));
    }

    #[tokio::test]
    async fn analyzes_tree_with_rule_strategy() {
        let host = InMemoryHost::new();
        host.add_file(
            "src/Hero.tsx",
            "<section>\n<h1>Welcome to Acme</h1>\n<p>Ship faster with us.</p>\n</section>\n",
        );
        host.add_file(
            "src/Footer.tsx",
            "<footer>\n<a href=\"/contact\">Contact us</a>\n</footer>\n",
        );
        host.add_file("README.md", "# Not scanned\n");

        let oracle = ScriptedOracle::new(); // grouping falls back to heading splits
        let analyzer = RepoAnalyzer::new(&host, &oracle, &NullObserver)
            .with_batching(2, Duration::from_millis(0));

        let report = analyzer
            .analyze("main", ExtractionStrategy::RuleBased)
            .await
            .unwrap();

        assert_eq!(report.files_scanned, 2);
        assert!(report
            .elements
            .iter()
            .any(|fe| fe.element.element_type == ElementType::Heading));
        assert!(!report.sections.is_empty());
        // Reading order: Footer.tsx sorts before Hero.tsx.
        assert_eq!(report.sections[0].file_path, "src/Footer.tsx");

        // The catalog mirrors the section members one to one.
        let members: usize = report.sections.iter().map(|s| s.elements.len()).sum();
        assert_eq!(report.catalog.len(), members);
        let heading = report
            .catalog
            .iter()
            .find(|e| e.element_type == ElementType::Heading)
            .unwrap();
        assert!(!heading.id.is_empty());
        assert_eq!(heading.value, "Welcome to Acme");
        assert_eq!(heading.confidence, RULE_CONFIDENCE);
        assert!(heading.context.is_some());
    }

    #[tokio::test]
    async fn catalog_carries_group_membership_and_href() {
        let host = InMemoryHost::new();
        host.add_file(
            "src/Hero.tsx",
            "<section>\n<h1>Welcome to Acme</h1>\n<p>Ship faster with us.</p>\n</section>\n",
        );
        host.add_file(
            "src/Footer.tsx",
            "<footer>\n<a href=\"/contact\">Contact us</a>\n</footer>\n",
        );

        let oracle = ScriptedOracle::new();
        let analyzer = RepoAnalyzer::new(&host, &oracle, &NullObserver)
            .with_batching(2, Duration::from_millis(0));
        let report = analyzer
            .analyze("main", ExtractionStrategy::RuleBased)
            .await
            .unwrap();

        let footer: Vec<_> = report
            .catalog
            .iter()
            .filter(|e| e.file_path == "src/Footer.tsx")
            .collect();
        let hero: Vec<_> = report
            .catalog
            .iter()
            .filter(|e| e.file_path == "src/Hero.tsx")
            .collect();
        assert_eq!(footer.len(), 1);
        assert_eq!(hero.len(), 2);

        assert_eq!(footer[0].href.as_deref(), Some("/contact"));
        // Members of one section share a group id; sections differ.
        assert_eq!(hero[0].group_id, hero[1].group_id);
        assert_ne!(footer[0].group_id, hero[0].group_id);
        assert_eq!(hero[0].group_index, Some(0));
        assert_eq!(hero[1].group_index, Some(1));
    }

    #[tokio::test]
    async fn unreadable_file_yields_zero_elements() {
        let host = InMemoryHost::new();
        host.add_file("src/Hero.tsx", "<h1>Welcome to Acme</h1>\n");
        host.add_tree_entry("src/Ghost.tsx"); // listed but unreadable

        let oracle = ScriptedOracle::new();
        let analyzer = RepoAnalyzer::new(&host, &oracle, &NullObserver)
            .with_batching(5, Duration::from_millis(0));

        let report = analyzer
            .analyze("main", ExtractionStrategy::RuleBased)
            .await
            .unwrap();
        assert_eq!(report.files_scanned, 2);
        assert!(report.elements.iter().all(|fe| fe.file_path == "src/Hero.tsx"));
    }

    #[tokio::test]
    async fn tree_listing_failure_is_fatal() {
        let host = InMemoryHost::new();
        host.fail_tree_listing();
        let oracle = ScriptedOracle::new();
        let analyzer = RepoAnalyzer::new(&host, &oracle, &NullObserver);

        assert!(analyzer
            .analyze("main", ExtractionStrategy::RuleBased)
            .await
            .is_err());
    }
}
