//! Deterministic doubles for the two remote collaborators.
//!
//! `ScriptedOracle` plays back queued responses (an exhausted queue errors,
//! which is how tests force fallback tiers); `InMemoryHost` is a
//! HashMap-backed repository with sha bookkeeping so publish flows can be
//! exercised without a network.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HostError, OracleError};
use crate::github::{PullRequest, RepoFile, RepoHost, SearchHit, TreeEntry};
use crate::oracle::TextOracle;

#[derive(Default)]
pub struct ScriptedOracle {
    text: Mutex<VecDeque<String>>,
    structured: Mutex<VecDeque<Value>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, response: &str) -> Self {
        self.text.lock().unwrap().push_back(response.to_string());
        self
    }

    pub fn with_structured(self, response: Value) -> Self {
        self.structured.lock().unwrap().push_back(response);
        self
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn generate_text(&self, _system: &str, _prompt: &str) -> Result<String, OracleError> {
        self.text
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OracleError::Empty)
    }

    async fn generate_structured(
        &self,
        _system: &str,
        _prompt: &str,
        _schema: &Value,
    ) -> Result<Value, OracleError> {
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(OracleError::Empty)
    }
}

#[derive(Default)]
struct HostState {
    /// path -> (content, revision); sha is derived from the revision
    files: HashMap<String, (String, u64)>,
    /// paths listed in the tree but not readable
    phantom_entries: Vec<String>,
    forced_hits: Vec<String>,
    fail_searches: bool,
    fail_tree: bool,
    branches: Vec<String>,
    pulls: Vec<(String, String, String, String)>,
}

fn sha_for(path: &str, revision: u64) -> String {
    format!("sha-{}-{}", path, revision)
}

#[derive(Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a file, bumping its revision (and therefore sha).
    pub fn add_file(&self, path: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        let revision = state.files.get(path).map(|(_, r)| r + 1).unwrap_or(1);
        state
            .files
            .insert(path.to_string(), (content.to_string(), revision));
    }

    /// List a path in the tree without backing content.
    pub fn add_tree_entry(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .phantom_entries
            .push(path.to_string());
    }

    /// Make `path` show up in every code search regardless of content.
    pub fn force_search_hit(&self, path: &str) {
        self.state.lock().unwrap().forced_hits.push(path.to_string());
    }

    pub fn fail_searches(&self) {
        self.state.lock().unwrap().fail_searches = true;
    }

    pub fn fail_tree_listing(&self) {
        self.state.lock().unwrap().fail_tree = true;
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .branches
            .iter()
            .any(|b| b == name)
    }

    pub fn file_content(&self, path: &str) -> String {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|(c, _)| c.clone())
            .unwrap_or_default()
    }

    pub fn last_pull_request(&self) -> Option<(String, String, String, String)> {
        self.state.lock().unwrap().pulls.last().cloned()
    }
}

#[async_trait]
impl RepoHost for InMemoryHost {
    async fn get_file(&self, path: &str, _git_ref: Option<&str>) -> Result<RepoFile, HostError> {
        let state = self.state.lock().unwrap();
        match state.files.get(path) {
            Some((content, revision)) => Ok(RepoFile {
                content: content.clone(),
                sha: sha_for(path, *revision),
            }),
            None => Err(HostError::NotFound(path.to_string())),
        }
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        _message: &str,
        _branch: &str,
        sha: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        let Some((_, revision)) = state.files.get(path) else {
            return Err(HostError::NotFound(path.to_string()));
        };
        if sha != sha_for(path, *revision) {
            return Err(HostError::Api {
                status: 409,
                message: format!("{} is out of date", path),
            });
        }
        let next = revision + 1;
        state
            .files
            .insert(path.to_string(), (content.to_string(), next));
        Ok(())
    }

    async fn create_branch(&self, name: &str, _from_ref: &str) -> Result<(), HostError> {
        self.state.lock().unwrap().branches.push(name.to_string());
        Ok(())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, HostError> {
        let mut state = self.state.lock().unwrap();
        state.pulls.push((
            title.to_string(),
            body.to_string(),
            head.to_string(),
            base.to_string(),
        ));
        let number = state.pulls.len() as u64;
        Ok(PullRequest {
            number,
            url: format!("https://example.test/pulls/{}", number),
        })
    }

    async fn search_code(&self, query: &str) -> Result<Vec<SearchHit>, HostError> {
        let state = self.state.lock().unwrap();
        if state.fail_searches {
            return Err(HostError::Api {
                status: 503,
                message: "search unavailable".to_string(),
            });
        }
        let mut paths: Vec<String> = state
            .files
            .iter()
            .filter(|(_, (content, _))| content.contains(query))
            .map(|(path, _)| path.clone())
            .chain(state.forced_hits.iter().cloned())
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths.into_iter().map(|path| SearchHit { path }).collect())
    }

    async fn list_tree(&self, _git_ref: &str, _recursive: bool) -> Result<Vec<TreeEntry>, HostError> {
        let state = self.state.lock().unwrap();
        if state.fail_tree {
            return Err(HostError::Api {
                status: 500,
                message: "tree unavailable".to_string(),
            });
        }
        let mut paths: Vec<String> = state
            .files
            .keys()
            .cloned()
            .chain(state.phantom_entries.iter().cloned())
            .collect();
        paths.sort();
        Ok(paths
            .into_iter()
            .map(|path| TreeEntry {
                path,
                entry_type: "blob".to_string(),
            })
            .collect())
    }
}
