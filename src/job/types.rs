//! Core types for remote generation jobs.

use crate::error::{GenJobError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Job provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Alibaba Model Studio.
    DashScope,
    /// Volcengine Ark.
    Ark,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DashScope => write!(f, "dashscope"),
            Self::Ark => write!(f, "ark"),
        }
    }
}

/// Kind of artifact a job produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Video clip.
    #[default]
    Video,
    /// Audio clip.
    Audio,
    /// Still image.
    Image,
}

impl ArtifactKind {
    /// File extension used when the result URL carries none.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "wav",
            Self::Image => "png",
        }
    }

    /// Manifest key under which the result URL is recorded.
    pub fn url_key(&self) -> &'static str {
        match self {
            Self::Video => "video_url",
            Self::Audio => "audio_url",
            Self::Image => "image_url",
        }
    }
}

/// Output parameters forwarded to the provider.
///
/// Providers ignore fields they have no equivalent for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobParameters {
    /// Pixel size, e.g. `"1920*1080"` (DashScope).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Resolution class, e.g. `"720p"` (Ark).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Aspect ratio, e.g. `"16:9"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    /// Clip duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    /// Frames per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    /// Seed for deterministic generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Whether the provider should watermark the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<bool>,
    /// Whether the camera should stay fixed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_fixed: Option<bool>,
}

/// A request to run a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Provider model identifier.
    pub model: String,
    /// The text prompt.
    pub prompt: String,
    /// Reference images (URLs or data URLs) for image-to-video.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Output parameters.
    #[serde(default)]
    pub parameters: JobParameters,
    /// What the job produces.
    #[serde(default)]
    pub kind: ArtifactKind,
}

impl JobRequest {
    /// Creates a new request for the given model and prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            images: Vec::new(),
            parameters: JobParameters::default(),
            kind: ArtifactKind::default(),
        }
    }

    /// Adds a reference image by URL.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.images.push(url.into());
        self
    }

    /// Adds a reference image from a local file, embedded as a data URL.
    pub fn with_image_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        use base64::Engine;

        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mime = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("png") => "image/png",
            _ => {
                return Err(GenJobError::InvalidRequest(format!(
                    "unsupported image type: {}",
                    path.display()
                )))
            }
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
        self.images.push(format!("data:{};base64,{}", mime, encoded));
        Ok(self)
    }

    /// Sets the pixel size (e.g. `"1920*1080"`).
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.parameters.size = Some(size.into());
        self
    }

    /// Sets the resolution class (e.g. `"720p"`).
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.parameters.resolution = Some(resolution.into());
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.parameters.aspect_ratio = Some(ratio.into());
        self
    }

    /// Sets the clip duration in seconds.
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.parameters.duration_secs = Some(secs);
        self
    }

    /// Sets the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.parameters.fps = Some(fps);
        self
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.parameters.seed = Some(seed);
        self
    }

    /// Enables or disables the provider watermark.
    pub fn with_watermark(mut self, watermark: bool) -> Self {
        self.parameters.watermark = Some(watermark);
        self
    }

    /// Pins or frees the camera.
    pub fn with_camera_fixed(mut self, fixed: bool) -> Self {
        self.parameters.camera_fixed = Some(fixed);
        self
    }

    /// Sets the artifact kind.
    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = kind;
        self
    }

    /// Checks the request can be sent at all.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(GenJobError::InvalidRequest("model must not be empty".into()));
        }
        if self.prompt.trim().is_empty() && self.images.is_empty() {
            return Err(GenJobError::InvalidRequest(
                "request needs a prompt or at least one image".into(),
            ));
        }
        Ok(())
    }
}

/// Opaque handle for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    task_id: String,
    /// When the provider accepted the job.
    pub submitted_at: DateTime<Utc>,
    /// Provider that owns the job.
    pub provider: ProviderKind,
    /// Model the job runs on.
    pub model: String,
    /// What the job produces.
    pub kind: ArtifactKind,
}

impl JobHandle {
    /// Creates the handle for a submitted request, rejecting empty ids.
    pub fn new(
        task_id: impl Into<String>,
        provider: ProviderKind,
        request: &JobRequest,
    ) -> Result<Self> {
        let task_id = task_id.into();
        if task_id.trim().is_empty() {
            return Err(GenJobError::Submission("provider returned an empty task id".into()));
        }
        Ok(Self {
            task_id,
            submitted_at: Utc::now(),
            provider,
            model: request.model.clone(),
            kind: request.kind,
        })
    }

    /// Rebuilds a handle for a job submitted elsewhere (e.g. an earlier run).
    pub fn resume(
        task_id: impl Into<String>,
        provider: ProviderKind,
        model: impl Into<String>,
        kind: ArtifactKind,
    ) -> Result<Self> {
        let request = JobRequest::new(model, "").with_kind(kind);
        Self::new(task_id, provider, &request)
    }

    /// The provider's task id. Never empty.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// Normalized job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, not started.
    Queued,
    /// In progress.
    Running,
    /// Finished with a result.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Canceled before finishing.
    Canceled,
}

impl JobState {
    /// Parses a provider status string, case-insensitively.
    ///
    /// Returns `None` for anything outside the known vocabulary.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "submitted" => Some(Self::Queued),
            "running" | "processing" => Some(Self::Running),
            "succeeded" | "success" => Some(Self::Succeeded),
            "failed" | "error" => Some(Self::Failed),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Returns true once no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// Lowercase name used in manifests and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a job's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Normalized state.
    pub state: JobState,
    /// Provider error message for failed/canceled jobs.
    pub message: Option<String>,
    /// Artifact URL once the job succeeded.
    pub result_url: Option<String>,
    /// Prompt as submitted, when echoed back.
    pub orig_prompt: Option<String>,
    /// Prompt after provider-side rewriting.
    pub actual_prompt: Option<String>,
    /// Provider submission timestamp.
    pub submit_time: Option<String>,
    /// Provider completion timestamp.
    pub end_time: Option<String>,
    /// Provider usage block.
    pub usage: Option<serde_json::Value>,
    /// The full response body.
    pub raw: serde_json::Value,
}

impl JobStatus {
    /// Creates a status with only a state set.
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            message: None,
            result_url: None,
            orig_prompt: None,
            actual_prompt: None,
            submit_time: None,
            end_time: None,
            usage: None,
            raw: serde_json::Value::Null,
        }
    }

    /// Sets the result URL.
    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    /// Sets the error message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Reference to the artifact of a succeeded job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Handle of the job that produced this result.
    pub handle: JobHandle,
    /// What the artifact is.
    pub kind: ArtifactKind,
    /// Where the artifact can be downloaded.
    pub url: String,
    /// Prompt as submitted.
    pub orig_prompt: Option<String>,
    /// Prompt after provider-side rewriting.
    pub actual_prompt: Option<String>,
    /// Provider submission timestamp.
    pub submit_time: Option<String>,
    /// Provider completion timestamp.
    pub end_time: Option<String>,
    /// Provider usage block.
    pub usage: Option<serde_json::Value>,
    /// Time spent waiting, from the first poll to the terminal one.
    pub elapsed: Duration,
    /// Number of polls issued.
    pub polls: u32,
    /// The final status response body.
    pub raw: serde_json::Value,
}

impl JobResult {
    /// Builds a result from a succeeded status.
    pub(crate) fn from_status(
        handle: &JobHandle,
        status: JobStatus,
        elapsed: Duration,
        polls: u32,
    ) -> Result<Self> {
        let url = status.result_url.filter(|u| !u.is_empty()).ok_or_else(|| {
            GenJobError::Protocol(format!(
                "job {} succeeded without a result URL",
                handle.task_id()
            ))
        })?;

        Ok(Self {
            handle: handle.clone(),
            kind: handle.kind,
            url,
            orig_prompt: status.orig_prompt,
            actual_prompt: status.actual_prompt,
            submit_time: status.submit_time,
            end_time: status.end_time,
            usage: status.usage,
            elapsed,
            polls,
            raw: status.raw,
        })
    }
}
