//! Publish by rewriting the page inside a hosted Git repository.
//!
//! Talks to the GitHub contents API: one GET for the current file plus its
//! revision handle (`sha`), one guarded PUT with the patched content. The
//! sha acts as a compare-and-swap token; if another writer got in between,
//! the PUT is rejected and we report the conflict instead of retrying.

use crate::page;
use crate::record::DocumentRecord;
use crate::target::{PublishError, PublishReceipt, PublishTarget};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use ticker_http::{Auth, HttpClient, HttpError, RequestOpts};

/// Everything the target needs, passed in explicitly at construction so the
/// component stays testable without process-environment mutation.
#[derive(Debug, Clone)]
pub struct RepositorySettings {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub commit_message: String,
    /// Contents API base; overridden in tests.
    pub api_base: String,
}

/// Fetched snapshot of the remote file. Lives for one request.
#[derive(Debug)]
pub struct RemoteFileState {
    pub content: String,
    /// Opaque token required for the conditional update.
    pub revision: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CommitResult {
    #[serde(default)]
    pub commit: Option<CommitRef>,
}

#[derive(Debug, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

pub struct RepositoryPatchTarget {
    http: HttpClient,
    settings: RepositorySettings,
}

impl RepositoryPatchTarget {
    pub fn new(settings: RepositorySettings) -> Result<Self, PublishError> {
        let http = HttpClient::new(&settings.api_base)
            .map_err(|e| PublishError::UpstreamFetch(format!("contents API base: {e}")))?;
        Ok(Self { http, settings })
    }

    fn contents_path(&self) -> String {
        format!(
            "repos/{}/{}/contents/{}",
            self.settings.owner, self.settings.repo, self.settings.path
        )
    }

    fn api_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        // GitHub rejects requests without a user agent
        headers.insert(USER_AGENT, HeaderValue::from_static("ticker"));
        headers
    }

    /// GET the current file content and its revision handle.
    pub async fn fetch_current(&self) -> Result<RemoteFileState, PublishError> {
        let resp: ContentsResponse = self
            .http
            .get_json(
                &self.contents_path(),
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.settings.token)),
                    headers: Some(self.api_headers()),
                    query: Some(vec![("ref", self.settings.branch.as_str().into())]),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| PublishError::UpstreamFetch(e.to_string()))?;

        if !resp.encoding.is_empty() && resp.encoding != "base64" {
            return Err(PublishError::UpstreamFetch(format!(
                "unexpected content encoding: {}",
                resp.encoding
            )));
        }

        // The API wraps base64 at 60 columns; strip the newlines first.
        let compact: String = resp.content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64_STANDARD
            .decode(compact)
            .map_err(|e| PublishError::UpstreamFetch(format!("content is not base64: {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| PublishError::UpstreamFetch(format!("content is not UTF-8: {e}")))?;

        tracing::debug!(
            path = %self.settings.path,
            branch = %self.settings.branch,
            bytes = content.len(),
            revision = %resp.sha,
            "fetched current page"
        );

        Ok(RemoteFileState {
            content,
            revision: resp.sha,
        })
    }

    /// PUT `new_content` guarded by `revision`.
    pub async fn commit(
        &self,
        new_content: &str,
        revision: &str,
    ) -> Result<CommitResult, PublishError> {
        let body = CommitRequest {
            message: &self.settings.commit_message,
            content: BASE64_STANDARD.encode(new_content),
            sha: revision,
            branch: &self.settings.branch,
        };

        let result: CommitResult = self
            .http
            .put_json(
                &self.contents_path(),
                &body,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.settings.token)),
                    headers: Some(self.api_headers()),
                    ..Default::default()
                },
            )
            .await
            .map_err(commit_error)?;

        Ok(result)
    }
}

fn commit_error(e: HttpError) -> PublishError {
    // 409 means the branch moved; 422 is what the contents API answers when
    // the supplied sha no longer matches the file.
    let conflict = matches!(
        e.status(),
        Some(StatusCode::CONFLICT) | Some(StatusCode::UNPROCESSABLE_ENTITY)
    );
    PublishError::UpstreamCommit {
        message: e.to_string(),
        conflict,
    }
}

#[async_trait]
impl PublishTarget for RepositoryPatchTarget {
    fn name(&self) -> &'static str {
        "repository-patch"
    }

    async fn publish(&self, record: &DocumentRecord) -> Result<PublishReceipt, PublishError> {
        let state = self.fetch_current().await?;

        let escaped = page::escape_markup(&record.text);
        let patched = page::patch_tweet_block(&state.content, &escaped)?;

        let now = Utc::now();
        let patched = match page::age_label(record.timestamp.as_deref(), now) {
            Some(label) => page::patch_timestamp_block(&patched, &label),
            None => patched,
        };

        let result = self.commit(&patched, &state.revision).await?;
        let commit_sha = result.commit.map(|c| c.sha);

        tracing::info!(
            path = %self.settings.path,
            branch = %self.settings.branch,
            commit = commit_sha.as_deref().unwrap_or("-"),
            "committed updated page"
        );

        Ok(PublishReceipt {
            message: "page updated in repository".to_string(),
            commit_sha,
            upstream: None,
        })
    }
}
