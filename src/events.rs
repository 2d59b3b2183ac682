//! Pipeline instrumentation.
//!
//! The core stays free of any particular logging backend: components report
//! stage completions through an injected [`StageObserver`], and consumers
//! decide what to do with them (emit events, record metrics, or nothing).

use serde::Serialize;

/// Stage names as constants to prevent typos
pub mod stage_names {
    /// One file's element extraction finished
    pub const EXTRACT_FILE: &str = "extract-file";

    /// Section grouping over the accumulated elements finished
    pub const GROUP_SECTIONS: &str = "group-sections";

    /// One edit went through the patch engine
    pub const APPLY_EDIT: &str = "apply-edit";

    /// All edits for one file were folded together
    pub const APPLY_FILE: &str = "apply-file";

    /// Whole-repository analysis pass finished
    pub const ANALYZE_REPO: &str = "analyze-repo";

    /// Branch/commit/PR publication finished
    pub const PUBLISH: &str = "publish";
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    /// Completed as intended
    Ok,
    /// Completed through a degraded path; the string names it
    Degraded(String),
    /// Did not complete; the string is the reason
    Failed(String),
}

/// Receives per-stage completion reports from the pipeline.
pub trait StageObserver: Send + Sync {
    fn on_stage_complete(&self, stage: &str, duration_ms: u128, outcome: &StageOutcome);
}

/// Observer that drops everything.
#[derive(Default)]
pub struct NullObserver;

impl StageObserver for NullObserver {
    fn on_stage_complete(&self, _stage: &str, _duration_ms: u128, _outcome: &StageOutcome) {}
}

/// Observer that forwards to the `log` facade.
#[derive(Default)]
pub struct LogObserver;

impl StageObserver for LogObserver {
    fn on_stage_complete(&self, stage: &str, duration_ms: u128, outcome: &StageOutcome) {
        match outcome {
            StageOutcome::Ok => log::debug!("stage {} completed in {}ms", stage, duration_ms),
            StageOutcome::Degraded(why) => {
                log::warn!("stage {} degraded after {}ms: {}", stage, duration_ms, why)
            }
            StageOutcome::Failed(why) => {
                log::warn!("stage {} failed after {}ms: {}", stage, duration_ms, why)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<(String, StageOutcome)>>);

    impl StageObserver for Recording {
        fn on_stage_complete(&self, stage: &str, _ms: u128, outcome: &StageOutcome) {
            self.0.lock().unwrap().push((stage.to_string(), outcome.clone()));
        }
    }

    #[test]
    fn observer_receives_reports() {
        let rec = Recording(Mutex::new(Vec::new()));
        rec.on_stage_complete(stage_names::APPLY_EDIT, 12, &StageOutcome::Ok);
        rec.on_stage_complete(
            stage_names::APPLY_EDIT,
            3,
            &StageOutcome::Degraded("fallback".into()),
        );
        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, StageOutcome::Ok);
    }
}
