//! HTTP transport
//!
//! - `GET  {base}/api/workspaces/{id}/events`   - `text/event-stream`
//! - `GET  {base}/api/workspaces/{id}/snapshot` - `WorkspaceSnapshot` JSON
//! - `POST {base}/api/workspaces/{id}/intents`  - one `CanvasIntent` per request

use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use taskgraph_types::{CanvasIntent, WorkspaceSnapshot};

use crate::dispatch::ApiClient;
use crate::error::{ApiError, StreamError};
use crate::sse::SseDecoder;
use crate::supervisor::{EventSource, EventStream};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_LIMIT: usize = 200;

fn workspace_url(base_url: &str, workspace_id: &str, tail: &str) -> String {
    format!(
        "{}/api/workspaces/{}/{}",
        base_url.trim_end_matches('/'),
        workspace_id,
        tail
    )
}

async fn error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

// ============================================================================
// EVENT SOURCE
// ============================================================================

pub struct HttpEventSource {
    http: Client,
    base_url: String,
    workspace_id: String,
}

impl HttpEventSource {
    pub fn new(base_url: impl Into<String>, workspace_id: impl Into<String>) -> Result<Self, StreamError> {
        // No overall timeout: the event stream stays open indefinitely
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            workspace_id: workspace_id.into(),
        })
    }

    fn url(&self, tail: &str) -> String {
        workspace_url(&self.base_url, &self.workspace_id, tail)
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self) -> Result<EventStream, StreamError> {
        let url = self.url("events");
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            return Err(StreamError::Unavailable(format!(
                "expected text/event-stream from {}, got '{}'",
                url, content_type
            )));
        }
        tracing::debug!(url = %url, "Event stream response received");

        let mut decoder = SseDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .map(|frame| frame.into_event().map_err(StreamError::from))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(StreamError::Http(e))],
            })
            .flat_map(stream::iter);
        Ok(events.boxed())
    }

    async fn fetch_snapshot(&self) -> Result<WorkspaceSnapshot, StreamError> {
        let response = self
            .http
            .get(self.url("snapshot"))
            .header(ACCEPT, "application/json")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        Ok(response.json().await?)
    }
}

// ============================================================================
// API CLIENT
// ============================================================================

pub struct HttpApiClient {
    http: Client,
    base_url: String,
    workspace_id: String,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, workspace_id: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            workspace_id: workspace_id.into(),
        })
    }

    pub fn intents_url(&self) -> String {
        workspace_url(&self.base_url, &self.workspace_id, "intents")
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn send(&self, intent: &CanvasIntent) -> Result<(), ApiError> {
        let response = self.http.post(self.intents_url()).json(intent).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected {
                op: intent.op(),
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }
        tracing::debug!(op = intent.op(), "Intent accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_urls() {
        assert_eq!(
            workspace_url("http://localhost:8080/", "ws-1", "events"),
            "http://localhost:8080/api/workspaces/ws-1/events"
        );
        let client = HttpApiClient::new("http://localhost:8080", "ws-1").unwrap();
        assert_eq!(
            client.intents_url(),
            "http://localhost:8080/api/workspaces/ws-1/intents"
        );
    }
}
