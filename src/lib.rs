//! copydesk - content-to-source patch engine.
//!
//! Takes a human-entered "old value → new value" (optionally with a
//! link-target change) plus a fuzzy pointer into a source tree, and
//! produces a verified, minimal source edit ready to land as a pull
//! request. The pipeline locates copy inside an arbitrary codebase,
//! applies surgical changes without breaking syntax or unrelated content,
//! tolerates an unreliable language-model oracle by falling back to
//! deterministic heuristics, composes multiple edits against one file,
//! and reports verifiable pass/fail outcomes with human-readable diffs.
//!
//! The surrounding application (HTTP surface, auth, persistence, UI)
//! lives elsewhere; this crate only talks to two injected collaborators,
//! a [`github::RepoHost`] and an [`oracle::TextOracle`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod extractor;
pub mod github;
pub mod grouping;
pub mod locator;
pub mod models;
pub mod oracle;
pub mod patch;
pub mod publish;
pub mod template;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{AnalysisReport, RepoAnalyzer};
pub use config::EngineConfig;
pub use error::{HostError, OracleError};
pub use events::{LogObserver, NullObserver, StageObserver, StageOutcome};
pub use extractor::{ElementExtractor, ExtractionStrategy};
pub use github::{GithubClient, PullRequest, RepoHost};
pub use grouping::{FileElement, SectionGrouper};
pub use locator::SourceLocator;
pub use models::{
    CodeChange, EditInstruction, EditableElement, ElementGroup, ElementType, PatchPath,
    PatchResult, PendingEdit, RawElement, SectionGroup, SourceLocation, Template,
};
pub use oracle::{ChatOracle, OracleResponse, TextOracle};
pub use patch::{content_diff, validate_replacement, PatchEngine, ValidationResult};
pub use publish::Publisher;
pub use template::{add_item, fill_template, remove_item, TemplateExtractor};
