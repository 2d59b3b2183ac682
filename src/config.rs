use serde::{Deserialize, Serialize};

/// Runtime settings for the remote collaborators and batch tuning.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default)]
    pub github_token: String,
    /// "owner/repo"
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_oracle_url")]
    pub oracle_url: String,
    #[serde(default)]
    pub oracle_api_key: String,
    #[serde(default = "default_oracle_model")]
    pub oracle_model: String,
    /// Files analyzed concurrently per batch
    #[serde(default = "default_batch_size")]
    pub analysis_batch_size: usize,
    /// Pause between analysis batches, to respect code-host rate limits
    #[serde(default = "default_batch_pause_ms")]
    pub analysis_batch_pause_ms: u64,
}

fn default_github_api_url() -> String {
    std::env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string())
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_oracle_url() -> String {
    std::env::var("ORACLE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

fn default_oracle_model() -> String {
    std::env::var("ORACLE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string())
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause_ms() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            github_api_url: default_github_api_url(),
            github_token: String::new(),
            repository: String::new(),
            base_branch: default_base_branch(),
            oracle_url: default_oracle_url(),
            oracle_api_key: String::new(),
            oracle_model: default_oracle_model(),
            analysis_batch_size: default_batch_size(),
            analysis_batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

impl EngineConfig {
    /// Load from the environment, reading a `.env` file first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            github_token: std::env::var("GITHUB_TOKEN").unwrap_or_default(),
            repository: std::env::var("GITHUB_REPOSITORY").unwrap_or_default(),
            base_branch: std::env::var("GITHUB_BASE_BRANCH")
                .unwrap_or_else(|_| default_base_branch()),
            oracle_api_key: std::env::var("ORACLE_API_KEY").unwrap_or_default(),
            ..Self::default()
        }
    }
}
