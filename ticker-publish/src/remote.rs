//! Publish by forwarding the record to a fixed remote update API.
//!
//! The endpoint does its own HTML rewrite; we only ship `{ text, timestamp,
//! secret }` and require a 2xx status with a JSON body back.

use crate::record::DocumentRecord;
use crate::target::{PublishError, PublishReceipt, PublishTarget};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use ticker_http::{HttpClient, RequestOpts};

#[derive(Serialize)]
struct UpdateRequest<'a> {
    text: &'a str,
    timestamp: String,
    secret: &'a str,
}

pub struct RemoteApiTarget {
    http: HttpClient,
    secret: String,
}

impl RemoteApiTarget {
    /// `endpoint` is the full update URL, e.g. `https://site.example/api/update`.
    pub fn new(endpoint: &str, secret: String) -> Result<Self, PublishError> {
        let http = HttpClient::new(endpoint).map_err(|e| PublishError::UpstreamCommit {
            message: format!("update endpoint: {e}"),
            conflict: false,
        })?;
        Ok(Self { http, secret })
    }
}

#[async_trait]
impl PublishTarget for RemoteApiTarget {
    fn name(&self) -> &'static str {
        "remote-api"
    }

    async fn publish(&self, record: &DocumentRecord) -> Result<PublishReceipt, PublishError> {
        let timestamp = record
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));

        let body = UpdateRequest {
            text: &record.text,
            timestamp,
            secret: &self.secret,
        };

        // The client is anchored at the endpoint itself; an empty reference
        // resolves to the base URL.
        let upstream: serde_json::Value = self
            .http
            .post_json("", &body, RequestOpts::default())
            .await
            .map_err(|e| PublishError::UpstreamCommit {
                message: e.to_string(),
                conflict: false,
            })?;

        tracing::info!(text_len = record.text.len(), "record forwarded to update API");

        Ok(PublishReceipt {
            message: "record forwarded to remote update API".to_string(),
            commit_sha: None,
            upstream: Some(upstream),
        })
    }
}
