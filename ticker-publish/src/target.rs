//! The seam between the webhook handler and the two delivery mechanisms.

use crate::record::DocumentRecord;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy for a single publish attempt.
///
/// `InvalidPayload` is the only client-facing case; everything else reports a
/// downstream problem. No variant is ever retried.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("patch target not found: {0}")]
    PatchTargetNotFound(&'static str),

    #[error("upstream commit failed: {message}")]
    UpstreamCommit {
        message: String,
        /// True when the remote rejected the write because the revision
        /// handle no longer matched the file (somebody else wrote first).
        conflict: bool,
    },
}

impl PublishError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, PublishError::UpstreamCommit { conflict: true, .. })
    }
}

/// What a successful publish hands back to the webhook response.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub message: String,
    /// Commit sha when the repository target wrote a new revision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    /// Raw JSON answer when the remote API target forwarded the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<serde_json::Value>,
}

/// One delivery mechanism for an updated document record.
///
/// Implementations: [`crate::remote::RemoteApiTarget`] (forward the record to
/// a fixed update endpoint) and [`crate::repo::RepositoryPatchTarget`] (patch
/// an HTML file in a hosted repository and commit it back). The server picks
/// one at startup from configuration.
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Short name used in log lines and response context.
    fn name(&self) -> &'static str;

    async fn publish(&self, record: &DocumentRecord) -> Result<PublishReceipt, PublishError>;
}
