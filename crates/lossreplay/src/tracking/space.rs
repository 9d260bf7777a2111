//! Hosted Trackio Space backend.
//!
//! Entries are mirrored into the local store and pushed to the Space's
//! `bulk_log` Gradio endpoint in batches. The Space must already run the
//! Trackio dashboard; this client only talks to it.

use super::error::{TrackingError, TrackingResult};
use super::local::{LocalRunLogger, LocalTracker};
use super::{MetricEntry, RunLogger, RunSpec, RunStats, Tracker};
use crate::project::space_host;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

const BULK_LOG_PATH: &str = "/gradio_api/call/bulk_log";

/// One entry as sent to the Space.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteLogEntry {
    pub project: String,
    pub run: String,
    pub metrics: Map<String, Value>,
    pub step: u64,
    pub timestamp: String,
}

/// Client for the Gradio API of one Space.
#[derive(Debug, Clone)]
pub struct SpaceClient {
    client: Client,
    base_url: String,
    token: String,
}

impl SpaceClient {
    /// Client for the dashboard served at `base_url`, sharing `client`'s pool.
    pub fn with_client(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), token: token.into() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a batch of entries and waits for the call to complete.
    ///
    /// Gradio answers the call with an event id; the outcome is read from the
    /// event stream of that id.
    pub async fn bulk_log(&self, logs: &[RemoteLogEntry]) -> TrackingResult<()> {
        let url = format!("{}{}", self.base_url, BULK_LOG_PATH);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "data": [logs, self.token] }))
            .send()
            .await?;
        check_status(response.status(), &self.base_url)?;

        let body: Value = response.json().await?;
        let event_id = body
            .get("event_id")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackingError::Remote(format!("no event_id in bulk_log response: {body}")))?;

        let stream = self.client.get(format!("{url}/{event_id}")).bearer_auth(&self.token).send().await?;
        check_status(stream.status(), &self.base_url)?;
        let text = stream.text().await?;

        tracing::debug!(entries = logs.len(), event_id, "bulk_log sent");
        parse_event_stream(&text)
    }
}

fn check_status(status: StatusCode, base_url: &str) -> TrackingResult<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(TrackingError::Unauthorized(format!("{base_url} rejected the token (HTTP {})", status.as_u16())));
    }
    if status == StatusCode::NOT_FOUND {
        return Err(TrackingError::Remote(format!(
            "{base_url} has no bulk_log endpoint; is the Trackio dashboard deployed?"
        )));
    }
    if !status.is_success() {
        return Err(TrackingError::Remote(format!("{base_url} returned HTTP {}", status.as_u16())));
    }
    Ok(())
}

/// Reads a Gradio event stream until `complete` or `error`.
fn parse_event_stream(text: &str) -> TrackingResult<()> {
    let mut event: Option<&str> = None;
    for line in text.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim());
        } else if let Some(data) = line.strip_prefix("data:") {
            match event {
                Some("complete") => return Ok(()),
                Some("error") => return Err(TrackingError::Remote(format!("bulk_log failed: {}", data.trim()))),
                _ => {}
            }
        }
    }
    Err(TrackingError::Remote("bulk_log event stream ended without a result".to_string()))
}

/// Tracker pushing to hosted Spaces, with a local mirror.
pub struct SpaceTracker {
    local: LocalTracker,
    client: Client,
    token: String,
    batch_size: usize,
    base_url: Option<String>,
}

impl SpaceTracker {
    pub fn new(local: LocalTracker, token: impl Into<String>) -> Self {
        Self {
            local,
            client: Client::new(),
            token: token.into(),
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            base_url: None,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Send every run to `base_url` instead of the Space's own host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn client_for(&self, space_id: &str) -> SpaceClient {
        let base = self.base_url.clone().unwrap_or_else(|| space_host(space_id));
        SpaceClient::with_client(self.client.clone(), base, self.token.clone())
    }
}

#[async_trait]
impl Tracker for SpaceTracker {
    fn id(&self) -> &'static str {
        "space"
    }

    async fn start_run(&self, spec: &RunSpec) -> TrackingResult<Box<dyn RunLogger>> {
        let space_id = spec.space_id.as_deref().ok_or_else(|| {
            TrackingError::Remote(format!("run '{}' has no space id to log to", spec.name))
        })?;

        let local = self.local.open_run(spec)?;
        let client = self.client_for(space_id);
        tracing::debug!(space = %space_id, url = %client.base_url(), run = %spec.name, "opening remote run");

        Ok(Box::new(SpaceRunLogger {
            local,
            client,
            project: spec.project.clone(),
            run: spec.name.clone(),
            buffer: Vec::with_capacity(self.batch_size),
            batch_size: self.batch_size,
        }))
    }
}

struct SpaceRunLogger {
    local: LocalRunLogger,
    client: SpaceClient,
    project: String,
    run: String,
    buffer: Vec<RemoteLogEntry>,
    batch_size: usize,
}

impl SpaceRunLogger {
    async fn flush(&mut self) -> TrackingResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.client.bulk_log(&self.buffer).await?;
        self.buffer.clear();
        Ok(())
    }
}

#[async_trait]
impl RunLogger for SpaceRunLogger {
    fn name(&self) -> &str {
        &self.run
    }

    async fn log(&mut self, entry: &MetricEntry) -> TrackingResult<()> {
        let step = self.local.record(entry)?;
        self.buffer.push(RemoteLogEntry {
            project: self.project.clone(),
            run: self.run.clone(),
            metrics: entry.to_metrics(),
            step,
            timestamp: Utc::now().to_rfc3339(),
        });
        if self.buffer.len() >= self.batch_size {
            if let Err(e) = self.flush().await {
                self.local.flush()?;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Closes the local mirror even when the last upload fails.
    async fn finish(mut self: Box<Self>) -> TrackingResult<RunStats> {
        let uploaded = self.flush().await;
        let stats = self.local.close()?;
        uploaded?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(step: u64) -> RemoteLogEntry {
        RemoteLogEntry {
            project: "p".to_string(),
            run: "r".to_string(),
            metrics: MetricEntry::with_step(1.0, step).to_metrics(),
            step,
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_parse_event_stream() {
        assert!(parse_event_stream("event: complete\ndata: [null]\n\n").is_ok());
        assert!(parse_event_stream("event: heartbeat\ndata: null\n\nevent: complete\ndata: [null]\n").is_ok());

        let err = parse_event_stream("event: error\ndata: \"quota exceeded\"\n").unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));

        assert!(parse_event_stream("").is_err());
    }

    #[tokio::test]
    async fn test_bulk_log_success() {
        let mut server = mockito::Server::new_async().await;
        let call = server
            .mock("POST", "/gradio_api/call/bulk_log")
            .match_header("authorization", "Bearer hf_test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"event_id":"evt-1"}"#)
            .create_async()
            .await;
        let result = server
            .mock("GET", "/gradio_api/call/bulk_log/evt-1")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("event: complete\ndata: [null]\n\n")
            .create_async()
            .await;

        let client = SpaceClient::with_client(Client::new(), server.url(), "hf_test");
        client.bulk_log(&[entry(0), entry(1)]).await.unwrap();

        call.assert_async().await;
        result.assert_async().await;
    }

    #[tokio::test]
    async fn test_bulk_log_error_event() {
        let mut server = mockito::Server::new_async().await;
        let _call = server
            .mock("POST", "/gradio_api/call/bulk_log")
            .with_status(200)
            .with_body(r#"{"event_id":"evt-2"}"#)
            .create_async()
            .await;
        let _result = server
            .mock("GET", "/gradio_api/call/bulk_log/evt-2")
            .with_status(200)
            .with_body("event: error\ndata: null\n\n")
            .create_async()
            .await;

        let client = SpaceClient::with_client(Client::new(), server.url(), "hf_test");
        let err = client.bulk_log(&[entry(0)]).await.unwrap_err();
        assert!(matches!(err, TrackingError::Remote(_)));
    }

    #[tokio::test]
    async fn test_bulk_log_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _call = server.mock("POST", "/gradio_api/call/bulk_log").with_status(401).create_async().await;

        let client = SpaceClient::with_client(Client::new(), server.url(), "bad");
        let err = client.bulk_log(&[entry(0)]).await.unwrap_err();
        assert!(matches!(err, TrackingError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_space_tracker_batches_and_mirrors() {
        let mut server = mockito::Server::new_async().await;
        let call = server
            .mock("POST", "/gradio_api/call/bulk_log")
            .with_status(200)
            .with_body(r#"{"event_id":"evt"}"#)
            .expect(2)
            .create_async()
            .await;
        let result = server
            .mock("GET", "/gradio_api/call/bulk_log/evt")
            .with_status(200)
            .with_body("event: complete\ndata: [null]\n\n")
            .expect(2)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let local = LocalTracker::new(temp.path().to_path_buf());
        let tracker = SpaceTracker::new(local.clone(), "hf_test").with_batch_size(2).with_base_url(server.url());

        let spec = RunSpec::new("proj", "run-1").in_space("me/loss-proj");
        let mut run = tracker.start_run(&spec).await.unwrap();
        for i in 0..3 {
            run.log(&MetricEntry::with_step(1.0, i)).await.unwrap();
        }
        let stats = run.finish().await.unwrap();
        assert_eq!(stats.points, 3);

        call.assert_async().await;
        result.assert_async().await;
        assert_eq!(local.open_store("proj").unwrap().metric_count("run-1").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_local_mirror() {
        let mut server = mockito::Server::new_async().await;
        let _call = server.mock("POST", "/gradio_api/call/bulk_log").with_status(500).create_async().await;

        let temp = TempDir::new().unwrap();
        let local = LocalTracker::new(temp.path().to_path_buf());
        let tracker = SpaceTracker::new(local.clone(), "hf_test").with_batch_size(100).with_base_url(server.url());

        let mut run = tracker.start_run(&RunSpec::new("proj", "run-1").in_space("me/loss-proj")).await.unwrap();
        for i in 0..3 {
            run.log(&MetricEntry::with_step(1.0, i)).await.unwrap();
        }
        let err = run.finish().await.unwrap_err();
        assert!(matches!(err, TrackingError::Remote(_)));
        assert_eq!(local.open_store("proj").unwrap().metric_count("run-1").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_batch_mid_run_keeps_logged_rows() {
        let mut server = mockito::Server::new_async().await;
        let _call = server.mock("POST", "/gradio_api/call/bulk_log").with_status(500).create_async().await;

        let temp = TempDir::new().unwrap();
        let local = LocalTracker::new(temp.path().to_path_buf());
        let tracker = SpaceTracker::new(local.clone(), "hf_test").with_batch_size(2).with_base_url(server.url());

        let mut run = tracker.start_run(&RunSpec::new("proj", "run-1").in_space("me/loss-proj")).await.unwrap();
        run.log(&MetricEntry::with_step(1.0, 0)).await.unwrap();
        assert!(run.log(&MetricEntry::with_step(0.9, 1)).await.is_err());
        drop(run);

        assert_eq!(local.open_store("proj").unwrap().metric_count("run-1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_space_tracker_requires_space_id() {
        let temp = TempDir::new().unwrap();
        let tracker = SpaceTracker::new(LocalTracker::new(temp.path().to_path_buf()), "hf_test");
        let err = tracker.start_run(&RunSpec::new("p", "r")).await.err().unwrap();
        assert!(matches!(err, TrackingError::Remote(_)));
    }
}
