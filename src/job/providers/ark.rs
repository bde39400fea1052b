//! Volcengine Ark content-generation task provider (Seaweed, Seedance).

use crate::error::{sanitize_error_message, GenJobError, Result};
use crate::job::provider::JobProvider;
use crate::job::types::{JobHandle, JobParameters, JobRequest, JobState, JobStatus, ProviderKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
const TASKS_ENDPOINT: &str = "/contents/generations/tasks";

/// Ark video model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArkVideoModel {
    /// Doubao Seaweed text-to-video (default).
    #[default]
    Seaweed,
    /// Doubao Seedance 1.0 lite image-to-video.
    SeedanceLiteI2v,
    /// Doubao Seedance 1.0 lite text-to-video.
    SeedanceLiteT2v,
}

impl ArkVideoModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seaweed => "doubao-seaweed-241128",
            Self::SeedanceLiteI2v => "doubao-seedance-1-0-lite-i2v-250428",
            Self::SeedanceLiteT2v => "doubao-seedance-1-0-lite-t2v-250428",
        }
    }
}

/// Builder for ArkProvider.
#[derive(Debug, Clone)]
pub struct ArkProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    request_timeout: Duration,
}

impl Default for ArkProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ArkProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `ARK_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL (region).
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
    pub fn build(self) -> Result<ArkProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("ARK_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenJobError::Auth("ARK_API_KEY not set and no API key provided".into()))?;

        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| GenJobError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(ArkProvider {
            client,
            api_key,
            base_url: self.base_url,
        })
    }
}

/// Filter for [`ArkProvider::list_tasks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    /// 1-based page number.
    pub page_num: u32,
    /// Tasks per page.
    pub page_size: u32,
    /// Only tasks in this state.
    pub status: Option<JobState>,
    /// Only tasks on this model.
    pub model: Option<String>,
    /// Only these task ids.
    pub task_ids: Vec<String>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 10,
            status: None,
            model: None,
            task_ids: Vec::new(),
        }
    }
}

impl TaskFilter {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page_num", self.page_num.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(status) = self.status {
            let status = match status {
                JobState::Canceled => "cancelled",
                other => other.as_str(),
            };
            query.push(("filter.status", status.to_string()));
        }
        if let Some(model) = &self.model {
            query.push(("filter.model", model.clone()));
        }
        for id in &self.task_ids {
            query.push(("filter.task_ids", id.clone()));
        }
        query
    }
}

/// One entry of a task listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    /// Task id.
    pub task_id: String,
    /// Model the task ran on.
    pub model: Option<String>,
    /// Normalized state; `None` if the provider sent something unknown.
    pub state: Option<JobState>,
    /// Result URL once succeeded.
    pub video_url: Option<String>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
}

/// A page of tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPage {
    /// Tasks on this page.
    pub items: Vec<TaskSummary>,
    /// Matching tasks across all pages.
    pub total: u64,
}

/// Volcengine Ark content-generation provider.
pub struct ArkProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ArkProvider {
    /// Creates a new `ArkProviderBuilder`.
    pub fn builder() -> ArkProviderBuilder {
        ArkProviderBuilder::new()
    }

    fn tasks_url(&self) -> String {
        format!("{}{}", self.base_url, TASKS_ENDPOINT)
    }

    fn parse_error(&self, status: u16, text: &str) -> String {
        if let Ok(err) = serde_json::from_str::<ArkErrorResponse>(text) {
            return sanitize_error_message(&format!(
                "{} {}: {}",
                status, err.error.code, err.error.message
            ));
        }
        sanitize_error_message(&format!("{} {}", status, text))
    }

    /// Lists tasks matching `filter`.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage> {
        let response = self
            .client
            .get(self.tasks_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&filter.query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenJobError::Api {
                status: status.as_u16(),
                message: self.parse_error(status.as_u16(), &text),
            });
        }

        let page: ArkTaskList = response
            .json()
            .await
            .map_err(|e| GenJobError::Protocol(format!("Ark task list: {}", e)))?;

        Ok(TaskPage {
            items: page
                .items
                .into_iter()
                .map(|t| TaskSummary {
                    task_id: t.id,
                    model: t.model,
                    state: t.status.as_deref().and_then(JobState::parse),
                    video_url: t.content.and_then(|c| c.video_url),
                    created_at: t.created_at.and_then(|s| DateTime::from_timestamp(s, 0)),
                })
                .collect(),
            total: page.total,
        })
    }

    /// Deletes a task. Queued tasks are canceled; finished ones are removed from history.
    pub async fn delete_task(&self, task_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.tasks_url(), task_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenJobError::Api {
                status: status.as_u16(),
                message: self.parse_error(status.as_u16(), &text),
            });
        }
        tracing::debug!(task_id = %task_id, "deleted Ark task");
        Ok(())
    }
}

#[async_trait]
impl JobProvider for ArkProvider {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        let body = ArkTaskRequest::from_request(request);

        let response = self
            .client
            .post(self.tasks_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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

        let created: ArkCreateResponse = response
            .json()
            .await
            .map_err(|e| GenJobError::Submission(format!("undecodable response: {}", e)))?;

        let task_id = created
            .id
            .ok_or_else(|| GenJobError::Submission("no id in Ark response".into()))?;
        JobHandle::new(task_id, ProviderKind::Ark, request)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus> {
        let url = format!("{}/{}", self.tasks_url(), handle.task_id());

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
        parse_task(&text, &handle.model)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ark
    }
}

/// Renders output parameters as the `--flag value` suffix Ark reads from the prompt.
fn parameter_suffix(params: &JobParameters) -> String {
    let mut flags = Vec::new();
    if let Some(res) = &params.resolution {
        flags.push(format!("--rs {}", res));
    }
    if let Some(ratio) = &params.aspect_ratio {
        flags.push(format!("--rt {}", ratio));
    }
    if let Some(dur) = params.duration_secs {
        flags.push(format!("--dur {}", dur));
    }
    if let Some(fps) = params.fps {
        flags.push(format!("--fps {}", fps));
    }
    if let Some(wm) = params.watermark {
        flags.push(format!("--wm {}", wm));
    }
    if let Some(seed) = params.seed {
        flags.push(format!("--seed {}", seed));
    }
    if let Some(cf) = params.camera_fixed {
        flags.push(format!("--cf {}", cf));
    }
    flags.join(" ")
}

fn parse_task(text: &str, expected_model: &str) -> Result<JobStatus> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| GenJobError::Protocol(format!("Ark task body: {}", e)))?;
    let task: ArkTask = serde_json::from_value(raw.clone())
        .map_err(|e| GenJobError::Protocol(format!("Ark task body: {}", e)))?;

    let status_str = task
        .status
        .ok_or_else(|| GenJobError::Protocol("no status in Ark response".into()))?;
    let state = JobState::parse(&status_str).ok_or_else(|| {
        GenJobError::Protocol(format!("Ark returned unexpected status: {}", status_str))
    })?;

    if let Some(model) = &task.model {
        if model != expected_model {
            tracing::debug!(
                expected = %expected_model,
                actual = %model,
                "Ark task reports a different model"
            );
        }
    }

    let message = task.error.and_then(|e| match (e.code, e.message) {
        (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
        (code, message) => code.or(message),
    });
    let end_time = if state.is_terminal() {
        task.updated_at.and_then(format_timestamp)
    } else {
        None
    };

    Ok(JobStatus {
        state,
        message,
        result_url: task.content.and_then(|c| c.video_url),
        orig_prompt: None,
        actual_prompt: None,
        submit_time: task.created_at.and_then(format_timestamp),
        end_time,
        usage: task.usage,
        raw,
    })
}

fn format_timestamp(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.to_rfc3339())
}

// Request types
#[derive(Debug, Serialize)]
struct ArkTaskRequest {
    model: String,
    content: Vec<ArkContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ArkContent {
    Text { text: String },
    ImageUrl { image_url: ArkImageUrl },
}

#[derive(Debug, Serialize)]
struct ArkImageUrl {
    url: String,
}

impl ArkTaskRequest {
    fn from_request(req: &JobRequest) -> Self {
        let suffix = parameter_suffix(&req.parameters);
        let prompt = req.prompt.trim();
        let text = match (prompt.is_empty(), suffix.is_empty()) {
            (false, false) => format!("{} {}", prompt, suffix),
            (false, true) => prompt.to_string(),
            (true, _) => suffix,
        };

        let mut content = Vec::with_capacity(1 + req.images.len());
        if !text.is_empty() {
            content.push(ArkContent::Text { text });
        }
        content.extend(req.images.iter().map(|url| ArkContent::ImageUrl {
            image_url: ArkImageUrl { url: url.clone() },
        }));

        Self {
            model: req.model.clone(),
            content,
        }
    }
}

// Response types
#[derive(Debug, Deserialize)]
struct ArkCreateResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArkTask {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    content: Option<ArkTaskContent>,
    #[serde(default)]
    error: Option<ArkTaskError>,
    #[serde(default)]
    usage: Option<Value>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ArkTaskContent {
    #[serde(default)]
    video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArkTaskError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArkTaskList {
    #[serde(default)]
    items: Vec<ArkListedTask>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ArkListedTask {
    id: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    content: Option<ArkTaskContent>,
    #[serde(default)]
    created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ArkErrorResponse {
    error: ArkErrorBody,
}

#[derive(Debug, Deserialize)]
struct ArkErrorBody {
    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::testing::serve;
    use crate::job::types::ArtifactKind;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::routing::{any, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn provider(base: &str) -> ArkProvider {
        ArkProvider::builder()
            .api_key("ark-test-key")
            .base_url(base)
            .build()
            .unwrap()
    }

    fn handle() -> JobHandle {
        JobHandle::resume(
            "cgt-20250907-abc",
            ProviderKind::Ark,
            "doubao-seaweed-241128",
            ArtifactKind::Video,
        )
        .unwrap()
    }

    #[test]
    fn test_model_as_str() {
        assert_eq!(ArkVideoModel::Seaweed.as_str(), "doubao-seaweed-241128");
        assert_eq!(
            ArkVideoModel::SeedanceLiteI2v.as_str(),
            "doubao-seedance-1-0-lite-i2v-250428"
        );
        assert_eq!(ArkVideoModel::default(), ArkVideoModel::Seaweed);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = ArkProvider::builder()
            .api_key("ark-test-key")
            .base_url("http://localhost:1234/api/v3/")
            .build()
            .unwrap();
        assert_eq!(provider.base_url, "http://localhost:1234/api/v3");
        assert_eq!(provider.kind(), ProviderKind::Ark);
    }

    #[test]
    fn test_parameter_suffix() {
        let req = JobRequest::new("doubao-seaweed-241128", "关羽温酒斩华雄")
            .with_resolution("720p")
            .with_aspect_ratio("16:9")
            .with_duration(5)
            .with_fps(24)
            .with_watermark(true)
            .with_seed(11)
            .with_camera_fixed(false);
        assert_eq!(
            parameter_suffix(&req.parameters),
            "--rs 720p --rt 16:9 --dur 5 --fps 24 --wm true --seed 11 --cf false"
        );
    }

    #[test]
    fn test_request_serialization_text_only() {
        let req = JobRequest::new("doubao-seaweed-241128", "关羽温酒斩华雄").with_duration(5);
        let json = serde_json::to_value(ArkTaskRequest::from_request(&req)).unwrap();

        assert_eq!(json["model"], "doubao-seaweed-241128");
        assert_eq!(json["content"].as_array().unwrap().len(), 1);
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "关羽温酒斩华雄 --dur 5");
    }

    #[test]
    fn test_request_serialization_image_to_video() {
        let req = JobRequest::new("doubao-seedance-1-0-lite-i2v-250428", "女孩睁开眼")
            .with_image_url("https://example.com/i2v_foxrgirl.png");
        let json = serde_json::to_value(ArkTaskRequest::from_request(&req)).unwrap();

        assert_eq!(json["content"][0]["text"], "女孩睁开眼");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "https://example.com/i2v_foxrgirl.png"
        );
    }

    #[test]
    fn test_parse_succeeded_task() {
        let body = r#"{
            "id": "cgt-20250907-abc",
            "model": "doubao-seaweed-241128",
            "status": "succeeded",
            "content": {"video_url": "https://example/video.mp4"},
            "usage": {"completion_tokens": 108900, "total_tokens": 108900},
            "created_at": 1757237280,
            "updated_at": 1757237340
        }"#;
        let status = parse_task(body, "doubao-seaweed-241128").unwrap();

        assert_eq!(status.state, JobState::Succeeded);
        assert_eq!(status.result_url.as_deref(), Some("https://example/video.mp4"));
        assert_eq!(status.submit_time.as_deref(), Some("2025-09-07T09:28:00+00:00"));
        assert_eq!(status.end_time.as_deref(), Some("2025-09-07T09:29:00+00:00"));
        assert_eq!(status.usage.unwrap()["total_tokens"], 108900);
    }

    #[test]
    fn test_parse_running_task_has_no_end_time() {
        let body = r#"{"id": "x", "status": "running", "created_at": 1757237280, "updated_at": 1757237290}"#;
        let status = parse_task(body, "m").unwrap();
        assert_eq!(status.state, JobState::Running);
        assert!(status.end_time.is_none());
    }

    #[test]
    fn test_parse_failed_task() {
        let body = r#"{"id": "x", "status": "failed",
            "error": {"code": "InputTextSensitiveContentDetected", "message": "invalid prompt"}}"#;
        let status = parse_task(body, "m").unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(
            status.message.as_deref(),
            Some("InputTextSensitiveContentDetected: invalid prompt")
        );
    }

    #[test]
    fn test_parse_failed_task_with_code_only() {
        let body = r#"{"id": "x", "status": "failed", "error": {"code": "InternalError"}}"#;
        let status = parse_task(body, "m").unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.message.as_deref(), Some("InternalError"));

        let body = r#"{"id": "x", "status": "failed", "error": {}}"#;
        let status = parse_task(body, "m").unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.message, None);
    }

    #[test]
    fn test_parse_cancelled_task() {
        let status = parse_task(r#"{"id": "x", "status": "cancelled"}"#, "m").unwrap();
        assert_eq!(status.state, JobState::Canceled);
    }

    #[test]
    fn test_parse_missing_status() {
        let err = parse_task(r#"{"id": "x"}"#, "m").unwrap_err();
        assert!(matches!(err, GenJobError::Protocol(_)));
    }

    #[test]
    fn test_filter_query() {
        let filter = TaskFilter {
            status: Some(JobState::Canceled),
            model: Some("doubao-seaweed-241128".into()),
            task_ids: vec!["a".into(), "b".into()],
            ..TaskFilter::default()
        };
        let query = filter.query();
        assert!(query.contains(&("page_num", "1".into())));
        assert!(query.contains(&("page_size", "10".into())));
        assert!(query.contains(&("filter.status", "cancelled".into())));
        assert!(query.contains(&("filter.model", "doubao-seaweed-241128".into())));
        assert_eq!(query.iter().filter(|(k, _)| *k == "filter.task_ids").count(), 2);
    }

    #[tokio::test]
    async fn test_submit_returns_top_level_id() {
        let seen: Arc<Mutex<Option<(HeaderMap, Value)>>> = Arc::default();
        let router = Router::new()
            .route(
                TASKS_ENDPOINT,
                post(
                    |State(seen): State<Arc<Mutex<Option<(HeaderMap, Value)>>>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        *seen.lock().unwrap() = Some((headers, body));
                        Json(json!({"id": "cgt-20250907-abc"}))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = serve(router).await;

        let request = JobRequest::new("doubao-seaweed-241128", "关羽温酒斩华雄");
        let handle = provider(&base).submit(&request).await.unwrap();
        assert_eq!(handle.task_id(), "cgt-20250907-abc");

        let (headers, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(headers["authorization"], "Bearer ark-test-key");
        assert_eq!(body["content"][0]["text"], "关羽温酒斩华雄");
    }

    #[tokio::test]
    async fn test_submit_error_body() {
        let router = Router::new().route(
            TASKS_ENDPOINT,
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"code": "InvalidParameter", "message": "model not found"}})),
                )
            }),
        );
        let base = serve(router).await;

        let err = provider(&base)
            .submit(&JobRequest::new("nope", "x"))
            .await
            .unwrap_err();
        match err {
            GenJobError::Submission(msg) => assert!(msg.contains("model not found")),
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_and_delete() {
        let calls: Arc<Mutex<Vec<(Method, String)>>> = Arc::default();
        let router = Router::new()
            .route(
                "/contents/generations/tasks/{id}",
                any(
                    |State(calls): State<Arc<Mutex<Vec<(Method, String)>>>>,
                     method: Method,
                     uri: Uri| async move {
                        calls.lock().unwrap().push((method.clone(), uri.path().to_string()));
                        if method == Method::DELETE {
                            Json(json!({}))
                        } else {
                            Json(json!({"id": "cgt-20250907-abc", "status": "queued"}))
                        }
                    },
                ),
            )
            .with_state(calls.clone());
        let base = serve(router).await;
        let provider = provider(&base);

        let status = provider.poll(&handle()).await.unwrap();
        assert_eq!(status.state, JobState::Queued);
        provider.delete_task("cgt-20250907-abc").await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, Method::GET);
        assert_eq!(calls[1].0, Method::DELETE);
        assert_eq!(calls[1].1, "/contents/generations/tasks/cgt-20250907-abc");
    }

    #[tokio::test]
    async fn test_list_tasks() {
        let router = Router::new().route(
            TASKS_ENDPOINT,
            axum::routing::get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("filter.status").map(String::as_str), Some("queued"));
                Json(json!({
                    "items": [
                        {"id": "t1", "model": "doubao-seaweed-241128", "status": "queued", "created_at": 1757237280},
                        {"id": "t2", "status": "succeeded", "content": {"video_url": "https://example/t2.mp4"}}
                    ],
                    "total": 2
                }))
            }),
        );
        let base = serve(router).await;

        let filter = TaskFilter {
            status: Some(JobState::Queued),
            ..TaskFilter::default()
        };
        let page = provider(&base).list_tasks(&filter).await.unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].task_id, "t1");
        assert_eq!(page.items[0].state, Some(JobState::Queued));
        assert!(page.items[0].created_at.is_some());
        assert_eq!(page.items[1].video_url.as_deref(), Some("https://example/t2.mp4"));
    }

    #[tokio::test]
    async fn test_delete_rejection_is_not_transient() {
        let router = Router::new().route(
            "/contents/generations/tasks/{id}",
            any(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": {"code": "NotFound", "message": "task not found"}})),
                )
            }),
        );
        let base = serve(router).await;

        let err = provider(&base).delete_task("missing").await.unwrap_err();
        assert!(!err.is_transient());
        match err {
            GenJobError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("task not found"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}
