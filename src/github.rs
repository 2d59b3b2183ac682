//! Code-hosting collaborator.
//!
//! [`RepoHost`] is the capability this crate needs from the remote
//! repository API; [`GithubClient`] implements it against the GitHub REST
//! v3 API. Write safety relies on the host's own optimistic-concurrency
//! primitive: every update carries the sha the content was read at, and a
//! rejected write is a hard failure of the whole publish, never retried
//! blindly.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::error::HostError;

/// One file read from the repository, content already decoded.
#[derive(Debug, Clone)]
pub struct RepoFile {
    pub content: String,
    /// Blob sha, required for a guarded update
    pub sha: String,
}

/// One hit from a code search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub path: String,
}

/// One entry in a repository tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    /// "blob" or "tree"
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// A created pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(rename = "html_url")]
    pub url: String,
}

/// Remote repository operations this core consumes.
#[async_trait]
pub trait RepoHost: Send + Sync {
    async fn get_file(&self, path: &str, git_ref: Option<&str>) -> Result<RepoFile, HostError>;

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError>;

    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<(), HostError>;

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, HostError>;

    async fn search_code(&self, query: &str) -> Result<Vec<SearchHit>, HostError>;

    async fn list_tree(&self, git_ref: &str, recursive: bool) -> Result<Vec<TreeEntry>, HostError>;
}

/// GitHub REST v3 client.
pub struct GithubClient {
    base_url: String,
    http_client: reqwest::Client,
    token: String,
    /// "owner/repo"
    repository: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

impl GithubClient {
    pub fn new(
        base_url: String,
        http_client: reqwest::Client,
        token: String,
        repository: String,
    ) -> Self {
        Self {
            base_url,
            http_client,
            token,
            repository,
        }
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "copydesk")
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, HostError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(HostError::from_status(status, message))
    }
}

#[async_trait]
impl RepoHost for GithubClient {
    async fn get_file(&self, path: &str, git_ref: Option<&str>) -> Result<RepoFile, HostError> {
        let mut url = format!("{}/repos/{}/contents/{}", self.base_url, self.repository, path);
        if let Some(r) = git_ref {
            url.push_str(&format!("?ref={}", r));
        }
        let response = Self::check(self.request(reqwest::Method::GET, url).send().await?).await?;
        let body: ContentsResponse = response.json().await?;

        // The contents API base64-encodes with embedded newlines.
        let cleaned: String = body.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| HostError::Api {
                status: 200,
                message: format!("undecodable file content for {}: {}", path, e),
            })?;
        let content = String::from_utf8(bytes).map_err(|e| HostError::Api {
            status: 200,
            message: format!("non-UTF-8 file content for {}: {}", path, e),
        })?;

        Ok(RepoFile {
            content,
            sha: body.sha,
        })
    }

    async fn update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), HostError> {
        let url = format!("{}/repos/{}/contents/{}", self.base_url, self.repository, path);
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let body = json!({
            "message": message,
            "content": encoded,
            "branch": branch,
            "sha": sha,
        });
        Self::check(
            self.request(reqwest::Method::PUT, url)
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn create_branch(&self, name: &str, from_ref: &str) -> Result<(), HostError> {
        // Resolve the source ref to a commit sha first.
        let ref_url = format!(
            "{}/repos/{}/git/ref/heads/{}",
            self.base_url, self.repository, from_ref
        );
        let response =
            Self::check(self.request(reqwest::Method::GET, ref_url).send().await?).await?;
        let source: RefResponse = response.json().await?;

        let url = format!("{}/repos/{}/git/refs", self.base_url, self.repository);
        let body = json!({
            "ref": format!("refs/heads/{}", name),
            "sha": source.object.sha,
        });
        Self::check(
            self.request(reqwest::Method::POST, url)
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, HostError> {
        let url = format!("{}/repos/{}/pulls", self.base_url, self.repository);
        let payload = json!({
            "title": title,
            "body": body,
            "head": head,
            "base": base,
        });
        let response = Self::check(
            self.request(reqwest::Method::POST, url)
                .json(&payload)
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    async fn search_code(&self, query: &str) -> Result<Vec<SearchHit>, HostError> {
        let url = format!(
            "{}/search/code?q={}+repo:{}",
            self.base_url,
            urlencode(query),
            self.repository
        );
        let response = Self::check(self.request(reqwest::Method::GET, url).send().await?).await?;
        let body: SearchResponse = response.json().await?;
        Ok(body.items)
    }

    async fn list_tree(&self, git_ref: &str, recursive: bool) -> Result<Vec<TreeEntry>, HostError> {
        let mut url = format!(
            "{}/repos/{}/git/trees/{}",
            self.base_url, self.repository, git_ref
        );
        if recursive {
            url.push_str("?recursive=1");
        }
        let response = Self::check(self.request(reqwest::Method::GET, url).send().await?).await?;
        let body: TreeResponse = response.json().await?;
        Ok(body.tree)
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
