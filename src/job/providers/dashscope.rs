//! DashScope (Alibaba Model Studio) async video synthesis provider.

use crate::error::{sanitize_error_message, GenJobError, Result};
use crate::job::provider::JobProvider;
use crate::job::types::{JobHandle, JobRequest, JobState, JobStatus, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://dashscope.aliyuncs.com";
const VIDEO_ENDPOINT: &str = "/api/v1/services/aigc/video-generation/video-synthesis";
const TASK_ENDPOINT: &str = "/api/v1/tasks";

/// DashScope video model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DashScopeVideoModel {
    /// Wan 2.2 text-to-video plus (default).
    #[default]
    Wan22T2vPlus,
    /// Wan 2.2 image-to-video plus.
    Wan22I2vPlus,
    /// Wan 2.1 text-to-video turbo.
    Wan21T2vTurbo,
}

impl DashScopeVideoModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wan22T2vPlus => "wan2.2-t2v-plus",
            Self::Wan22I2vPlus => "wan2.2-i2v-plus",
            Self::Wan21T2vTurbo => "wanx2.1-t2v-turbo",
        }
    }
}

/// Builder for DashScopeProvider.
#[derive(Debug, Clone)]
pub struct DashScopeProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    request_timeout: Duration,
}

impl Default for DashScopeProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl DashScopeProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `DASHSCOPE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API host (e.g. the international endpoint).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request HTTP timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<DashScopeProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("DASHSCOPE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenJobError::Auth("DASHSCOPE_API_KEY not set and no API key provided".into())
            })?;

        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| GenJobError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(DashScopeProvider {
            client,
            api_key,
            base_url: self.base_url,
        })
    }
}

/// DashScope async video synthesis provider.
pub struct DashScopeProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DashScopeProvider {
    /// Creates a new `DashScopeProviderBuilder`.
    pub fn builder() -> DashScopeProviderBuilder {
        DashScopeProviderBuilder::new()
    }

    fn parse_error(&self, status: u16, text: &str) -> String {
        if let Ok(err) = serde_json::from_str::<DashScopeErrorResponse>(text) {
            return sanitize_error_message(&format!("{} {}: {}", status, err.code, err.message));
        }
        sanitize_error_message(&format!("{} {}", status, text))
    }
}

#[async_trait]
impl JobProvider for DashScopeProvider {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        let url = format!("{}{}", self.base_url, VIDEO_ENDPOINT);
        let body = DashScopeVideoRequest::from_request(request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-DashScope-Async", "enable")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenJobError::Submission(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenJobError::Submission(
                self.parse_error(status.as_u16(), &text),
            ));
        }

        let submit_response: DashScopeSubmitResponse = response
            .json()
            .await
            .map_err(|e| GenJobError::Submission(format!("undecodable response: {}", e)))?;

        let task_id = submit_response
            .output
            .and_then(|o| o.task_id)
            .ok_or_else(|| GenJobError::Submission("no output.task_id in response".into()))?;

        JobHandle::new(task_id, ProviderKind::DashScope, request)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus> {
        let url = format!("{}{}/{}", self.base_url, TASK_ENDPOINT, handle.task_id());

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| GenJobError::TransientPoll(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenJobError::TransientPoll(
                self.parse_error(status.as_u16(), &text),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| GenJobError::TransientPoll(e.to_string()))?;
        parse_task_status(&text)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::DashScope
    }
}

/// Normalizes a `GET /tasks/{id}` body.
fn parse_task_status(text: &str) -> Result<JobStatus> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| GenJobError::Protocol(format!("DashScope task body: {}", e)))?;
    let task: DashScopeTaskResponse = serde_json::from_value(raw.clone())
        .map_err(|e| GenJobError::Protocol(format!("DashScope task body: {}", e)))?;

    let output = task.output.unwrap_or_default();
    let status_str = output
        .task_status
        .or(task.task_status)
        .ok_or_else(|| GenJobError::Protocol("no task_status in DashScope response".into()))?;
    let state = JobState::parse(&status_str).ok_or_else(|| {
        GenJobError::Protocol(format!("DashScope returned unexpected status: {}", status_str))
    })?;

    let message = match (output.code, output.message) {
        (Some(code), Some(msg)) => Some(format!("{}: {}", code, msg)),
        (None, Some(msg)) => Some(msg),
        (Some(code), None) => Some(code),
        (None, None) => None,
    };

    Ok(JobStatus {
        state,
        message,
        result_url: output.video_url,
        orig_prompt: output.orig_prompt,
        actual_prompt: output.actual_prompt,
        submit_time: output.submit_time,
        end_time: output.end_time,
        usage: task.usage,
        raw,
    })
}

// Request types
#[derive(Debug, Serialize)]
struct DashScopeVideoRequest {
    model: String,
    input: DashScopeInput,
    #[serde(skip_serializing_if = "DashScopeParameters::is_empty")]
    parameters: DashScopeParameters,
}

#[derive(Debug, Serialize)]
struct DashScopeInput {
    #[serde(skip_serializing_if = "String::is_empty")]
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    img_url: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct DashScopeParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watermark: Option<bool>,
}

impl DashScopeParameters {
    fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.resolution.is_none()
            && self.duration.is_none()
            && self.seed.is_none()
            && self.watermark.is_none()
    }
}

impl DashScopeVideoRequest {
    fn from_request(req: &JobRequest) -> Self {
        let params = &req.parameters;
        Self {
            model: req.model.clone(),
            input: DashScopeInput {
                prompt: req.prompt.trim().to_string(),
                img_url: req.images.first().cloned(),
            },
            parameters: DashScopeParameters {
                size: params.size.clone(),
                // DashScope spells resolution in upper case ("720P").
                resolution: params.resolution.as_ref().map(|r| r.to_ascii_uppercase()),
                duration: params.duration_secs,
                seed: params.seed,
                watermark: params.watermark,
            },
        }
    }
}

// Response types
#[derive(Debug, Deserialize)]
struct DashScopeSubmitResponse {
    #[serde(default)]
    output: Option<DashScopeSubmitOutput>,
}

#[derive(Debug, Deserialize)]
struct DashScopeSubmitOutput {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashScopeTaskResponse {
    #[serde(default)]
    output: Option<DashScopeTaskOutput>,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DashScopeTaskOutput {
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    orig_prompt: Option<String>,
    #[serde(default)]
    actual_prompt: Option<String>,
    #[serde(default)]
    submit_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashScopeErrorResponse {
    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::testing::serve;
    use crate::job::types::ArtifactKind;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Seen {
        headers: Mutex<Option<HeaderMap>>,
        body: Mutex<Option<Value>>,
        polls: AtomicU32,
    }

    fn provider(base: &str) -> DashScopeProvider {
        DashScopeProvider::builder()
            .api_key("sk-test")
            .base_url(base)
            .build()
            .unwrap()
    }

    fn handle() -> JobHandle {
        JobHandle::resume("abc123", ProviderKind::DashScope, "wan2.2-t2v-plus", ArtifactKind::Video)
            .unwrap()
    }

    async fn mock_submit(
        State(seen): State<Arc<Seen>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        *seen.headers.lock().unwrap() = Some(headers);
        *seen.body.lock().unwrap() = Some(body);
        Json(json!({
            "request_id": "req-1",
            "output": {"task_id": "abc123", "task_status": "PENDING"}
        }))
    }

    #[test]
    fn test_model_as_str() {
        assert_eq!(DashScopeVideoModel::Wan22T2vPlus.as_str(), "wan2.2-t2v-plus");
        assert_eq!(DashScopeVideoModel::Wan22I2vPlus.as_str(), "wan2.2-i2v-plus");
        assert_eq!(DashScopeVideoModel::default(), DashScopeVideoModel::Wan22T2vPlus);
    }

    #[test]
    fn test_builder_rejects_empty_key() {
        let result = DashScopeProvider::builder().api_key("  ").build();
        assert!(matches!(result, Err(GenJobError::Auth(_))));
    }

    #[test]
    fn test_request_serialization() {
        let req = JobRequest::new("wan2.2-t2v-plus", "五谷丰登！天赐良机，把握机会")
            .with_size("1920*1080")
            .with_duration(5);
        let json = serde_json::to_value(DashScopeVideoRequest::from_request(&req)).unwrap();

        assert_eq!(json["model"], "wan2.2-t2v-plus");
        assert_eq!(json["input"]["prompt"], "五谷丰登！天赐良机，把握机会");
        assert!(json["input"].get("img_url").is_none());
        assert_eq!(json["parameters"]["size"], "1920*1080");
        assert_eq!(json["parameters"]["duration"], 5);
        assert!(json["parameters"].get("seed").is_none());
    }

    #[test]
    fn test_request_serialization_image_to_video() {
        let req = JobRequest::new("wan2.2-i2v-plus", "the girl opens her eyes")
            .with_image_url("https://example.com/fox.png")
            .with_resolution("720p");
        let json = serde_json::to_value(DashScopeVideoRequest::from_request(&req)).unwrap();

        assert_eq!(json["input"]["img_url"], "https://example.com/fox.png");
        assert_eq!(json["parameters"]["resolution"], "720P");
    }

    #[test]
    fn test_request_serialization_no_parameters() {
        let req = JobRequest::new("wan2.2-t2v-plus", "test");
        let json = serde_json::to_value(DashScopeVideoRequest::from_request(&req)).unwrap();
        assert!(json.get("parameters").is_none());
    }

    #[test]
    fn test_parse_succeeded_task() {
        let body = r#"{
            "request_id": "req-2",
            "output": {
                "task_id": "abc123",
                "task_status": "SUCCEEDED",
                "submit_time": "2025-09-06 12:17:00.123",
                "end_time": "2025-09-06 12:19:41.456",
                "video_url": "https://example/video.mp4",
                "orig_prompt": "五谷丰登",
                "actual_prompt": "五谷丰登，金色麦田"
            },
            "usage": {"video_duration": 5, "video_ratio": "1920*1080", "video_count": 1}
        }"#;
        let status = parse_task_status(body).unwrap();

        assert_eq!(status.state, JobState::Succeeded);
        assert_eq!(status.result_url.as_deref(), Some("https://example/video.mp4"));
        assert_eq!(status.actual_prompt.as_deref(), Some("五谷丰登，金色麦田"));
        assert_eq!(status.end_time.as_deref(), Some("2025-09-06 12:19:41.456"));
        assert_eq!(status.usage.unwrap()["video_count"], 1);
        assert_eq!(status.raw["request_id"], "req-2");
    }

    #[test]
    fn test_parse_failed_task_keeps_message() {
        let body = r#"{"output": {"task_id": "abc123", "task_status": "FAILED",
            "code": "InvalidParameter", "message": "invalid prompt"}}"#;
        let status = parse_task_status(body).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.message.as_deref(), Some("InvalidParameter: invalid prompt"));
    }

    #[test]
    fn test_parse_top_level_status_fallback() {
        let status = parse_task_status(r#"{"task_status": "RUNNING"}"#).unwrap();
        assert_eq!(status.state, JobState::Running);
    }

    #[test]
    fn test_parse_missing_status_is_protocol_error() {
        let err = parse_task_status(r#"{"output": {"task_id": "abc123"}}"#).unwrap_err();
        assert!(matches!(err, GenJobError::Protocol(_)));

        let err = parse_task_status("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, GenJobError::Protocol(_)));
    }

    #[test]
    fn test_parse_unknown_status_is_protocol_error() {
        let err = parse_task_status(r#"{"output": {"task_status": "UNKNOWN"}}"#).unwrap_err();
        assert!(matches!(err, GenJobError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_submit_sends_async_headers() {
        let seen = Arc::new(Seen::default());
        let router = Router::new()
            .route(VIDEO_ENDPOINT, post(mock_submit))
            .with_state(seen.clone());
        let base = serve(router).await;

        let request = JobRequest::new("demo-model", "test");
        let handle = provider(&base).submit(&request).await.unwrap();
        assert_eq!(handle.task_id(), "abc123");
        assert_eq!(handle.provider, ProviderKind::DashScope);
        assert_eq!(handle.model, "demo-model");

        let headers = seen.headers.lock().unwrap().take().unwrap();
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(headers["x-dashscope-async"], "enable");
        let body = seen.body.lock().unwrap().take().unwrap();
        assert_eq!(body["model"], "demo-model");
        assert_eq!(body["input"]["prompt"], "test");
    }

    #[tokio::test]
    async fn test_submit_without_task_id_fails() {
        let router = Router::new().route(
            VIDEO_ENDPOINT,
            post(|| async { Json(json!({"request_id": "req-1", "output": {}})) }),
        );
        let base = serve(router).await;

        let err = provider(&base)
            .submit(&JobRequest::new("demo-model", "test"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenJobError::Submission(_)));
    }

    #[tokio::test]
    async fn test_submit_with_empty_task_id_fails() {
        let router = Router::new().route(
            VIDEO_ENDPOINT,
            post(|| async { Json(json!({"output": {"task_id": ""}})) }),
        );
        let base = serve(router).await;

        let err = provider(&base)
            .submit(&JobRequest::new("demo-model", "test"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenJobError::Submission(_)));
    }

    #[tokio::test]
    async fn test_submit_http_error_fails() {
        let router = Router::new().route(
            VIDEO_ENDPOINT,
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"code": "InvalidApiKey", "message": "Invalid API-key provided."})),
                )
            }),
        );
        let base = serve(router).await;

        let err = provider(&base)
            .submit(&JobRequest::new("demo-model", "test"))
            .await
            .unwrap_err();
        match err {
            GenJobError::Submission(msg) => assert!(msg.contains("InvalidApiKey")),
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_is_idempotent() {
        let seen = Arc::new(Seen::default());
        let router = Router::new()
            .route(
                "/api/v1/tasks/{id}",
                get(|State(seen): State<Arc<Seen>>, Path(id): Path<String>| async move {
                    seen.polls.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "output": {
                            "task_id": id,
                            "task_status": "SUCCEEDED",
                            "video_url": "https://example/video.mp4"
                        }
                    }))
                }),
            )
            .with_state(seen.clone());
        let base = serve(router).await;
        let provider = provider(&base);

        let first = provider.poll(&handle()).await.unwrap();
        let second = provider.poll(&handle()).await.unwrap();

        assert_eq!(first.state, second.state);
        assert_eq!(first.result_url, second.result_url);
        assert_eq!(seen.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_poll_server_error_is_transient() {
        let router = Router::new().route(
            "/api/v1/tasks/{id}",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream unavailable") }),
        );
        let base = serve(router).await;

        let err = provider(&base).poll(&handle()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_poll_unreachable_is_transient() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = provider(&base).poll(&handle()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
