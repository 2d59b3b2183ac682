//! Publish orchestration.
//!
//! Folds batches of edit instructions into per-file [`CodeChange`]s and
//! drives branch creation, commits and PR creation through the repo host.
//! Edits against one file are applied strictly sequentially: each patch
//! engine call sees the output of the previous one, which is what lets
//! multiple edits to the same file compose instead of clobbering each
//! other.

use std::time::Instant;

use chrono::Utc;

use crate::error::HostError;
use crate::events::{stage_names, StageObserver, StageOutcome};
use crate::github::{PullRequest, RepoHost};
use crate::models::{CodeChange, PatchPath, PendingEdit};
use crate::oracle::TextOracle;
use crate::patch::PatchEngine;

pub struct Publisher<'a> {
    host: &'a dyn RepoHost,
    oracle: &'a dyn TextOracle,
    observer: &'a dyn StageObserver,
}

impl<'a> Publisher<'a> {
    pub fn new(
        host: &'a dyn RepoHost,
        oracle: &'a dyn TextOracle,
        observer: &'a dyn StageObserver,
    ) -> Self {
        Self {
            host,
            oracle,
            observer,
        }
    }

    /// Apply a batch of edits, producing one [`CodeChange`] per file that
    /// actually changed.
    ///
    /// Each file's content is fetched exactly once. Individual edit
    /// failures are logged and skipped; a file whose fetch fails is
    /// reported and skipped without aborting the rest of the batch.
    pub async fn apply_all(
        &self,
        edits: &[PendingEdit],
        git_ref: Option<&str>,
    ) -> Vec<CodeChange> {
        let engine = PatchEngine::new(self.oracle);
        let mut changes = Vec::new();

        for (file_path, file_edits) in group_by_file(edits) {
            let started = Instant::now();
            let original = match self.host.get_file(&file_path, git_ref).await {
                Ok(file) => file.content,
                Err(e) => {
                    log::error!("failed to fetch {} for patching: {}", file_path, e);
                    self.observer.on_stage_complete(
                        stage_names::APPLY_FILE,
                        started.elapsed().as_millis(),
                        &StageOutcome::Failed(e.to_string()),
                    );
                    continue;
                }
            };

            // Sequential fold: the accumulator is the running content.
            let mut current = original.clone();
            let mut descriptions = Vec::new();

            for pending in file_edits {
                let edit_started = Instant::now();
                let result = engine
                    .apply_edit(&current, &file_path, &pending.instruction)
                    .await;

                let outcome = match (&result.success, &result.path) {
                    (true, Some(PatchPath::Fallback { reason })) => {
                        StageOutcome::Degraded(reason.clone())
                    }
                    (true, _) => StageOutcome::Ok,
                    (false, _) => {
                        StageOutcome::Failed(result.reason.clone().unwrap_or_default())
                    }
                };
                self.observer.on_stage_complete(
                    stage_names::APPLY_EDIT,
                    edit_started.elapsed().as_millis(),
                    &outcome,
                );

                if result.success {
                    current = result.content;
                    descriptions.push(result.description);
                } else {
                    log::warn!(
                        "edit skipped in {}: {}",
                        file_path,
                        result.reason.as_deref().unwrap_or("unknown reason")
                    );
                }
            }

            // No-op files are dropped silently.
            if current != original {
                changes.push(CodeChange {
                    file_path: file_path.clone(),
                    original_content: original,
                    new_content: current,
                    description: descriptions.join("\n"),
                });
            }
            self.observer.on_stage_complete(
                stage_names::APPLY_FILE,
                started.elapsed().as_millis(),
                &StageOutcome::Ok,
            );
        }

        changes
    }

    /// Publish a change set: create a branch, commit every file, open the
    /// pull request.
    ///
    /// Every commit is guarded by the sha the file currently has on the
    /// branch; if the file drifted since the changes were computed, the
    /// whole publish fails rather than retrying blindly.
    pub async fn publish(
        &self,
        changes: &[CodeChange],
        branch: Option<&str>,
        title: &str,
        base: &str,
    ) -> Result<PullRequest, HostError> {
        let started = Instant::now();
        let branch_name = match branch {
            Some(name) => name.to_string(),
            None => format!("copy-update-{}", Utc::now().format("%Y%m%d-%H%M%S")),
        };

        let result = self
            .publish_inner(changes, &branch_name, title, base)
            .await;
        let outcome = match &result {
            Ok(_) => StageOutcome::Ok,
            Err(e) => StageOutcome::Failed(e.to_string()),
        };
        self.observer.on_stage_complete(
            stage_names::PUBLISH,
            started.elapsed().as_millis(),
            &outcome,
        );
        result
    }

    async fn publish_inner(
        &self,
        changes: &[CodeChange],
        branch: &str,
        title: &str,
        base: &str,
    ) -> Result<PullRequest, HostError> {
        self.host.create_branch(branch, base).await?;

        for change in changes {
            let on_branch = self.host.get_file(&change.file_path, Some(branch)).await?;
            if on_branch.content != change.original_content {
                return Err(HostError::Api {
                    status: 409,
                    message: format!(
                        "{} changed since it was read; aborting publish",
                        change.file_path
                    ),
                });
            }
            let message = commit_message(change);
            self.host
                .update_file(
                    &change.file_path,
                    &change.new_content,
                    &message,
                    branch,
                    &on_branch.sha,
                )
                .await?;
        }

        self.host
            .create_pull_request(title, &pull_request_body(changes), branch, base)
            .await
    }
}

/// Group edits by target file, preserving first-seen file order and edit
/// order within a file.
fn group_by_file(edits: &[PendingEdit]) -> Vec<(String, Vec<&PendingEdit>)> {
    let mut grouped: Vec<(String, Vec<&PendingEdit>)> = Vec::new();
    for edit in edits {
        match grouped.iter_mut().find(|(path, _)| *path == edit.file_path) {
            Some((_, bucket)) => bucket.push(edit),
            None => grouped.push((edit.file_path.clone(), vec![edit])),
        }
    }
    grouped
}

fn commit_message(change: &CodeChange) -> String {
    format!("Update content in {}\n\n{}", change.file_path, change.description)
}

fn pull_request_body(changes: &[CodeChange]) -> String {
    let mut body = String::from("## Content updates\n");
    for change in changes {
        body.push_str(&format!("\n### `{}`\n{}\n", change.file_path, change.description));
    }
    body
}
