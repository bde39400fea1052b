//! On-disk records of a job: raw responses and the final manifest.

use crate::error::Result;
use crate::job::types::{JobHandle, JobResult, JobState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Summary of a completed job, written as `manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct JobManifest {
    /// Provider task id.
    pub task_id: String,
    /// Always `succeeded`.
    pub task_status: JobState,
    /// Provider name.
    pub provider: String,
    /// Model id.
    pub model: String,
    /// Keyed by artifact kind: `video_url`, `audio_url` or `image_url`.
    #[serde(flatten)]
    pub url: Map<String, Value>,
    /// Prompt as submitted.
    pub orig_prompt: Option<String>,
    /// Prompt after provider-side rewriting.
    pub actual_prompt: Option<String>,
    /// Provider submit time.
    pub submit_time: Option<String>,
    /// Provider end time.
    pub end_time: Option<String>,
    /// Provider usage block.
    pub usage: Option<Value>,
    /// Seconds spent waiting.
    pub elapsed_secs: f64,
    /// Polls issued.
    pub polls: u32,
    /// Local artifact path once downloaded.
    pub local_path: Option<PathBuf>,
    /// When the manifest was written.
    pub generated_at: DateTime<Utc>,
    /// Last raw status body.
    pub raw_response: Value,
}

impl JobManifest {
    /// Builds the manifest for a succeeded job.
    pub fn from_result(result: &JobResult) -> Self {
        let mut url = Map::new();
        url.insert(
            result.kind.url_key().to_string(),
            Value::String(result.url.clone()),
        );

        Self {
            task_id: result.handle.task_id().to_string(),
            task_status: JobState::Succeeded,
            provider: result.handle.provider.to_string(),
            model: result.handle.model.clone(),
            url,
            orig_prompt: result.orig_prompt.clone(),
            actual_prompt: result.actual_prompt.clone(),
            submit_time: result.submit_time.clone(),
            end_time: result.end_time.clone(),
            usage: result.usage.clone(),
            elapsed_secs: result.elapsed.as_secs_f64(),
            polls: result.polls,
            local_path: None,
            generated_at: Utc::now(),
            raw_response: result.raw.clone(),
        }
    }

    /// Records where the artifact was saved.
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }
}

/// Writes per-job JSON files under `<root>/<task_id>/`.
#[derive(Debug, Clone)]
pub struct ResponseRecorder {
    root: PathBuf,
    enabled: bool,
}

impl ResponseRecorder {
    /// Creates a recorder rooted at `root`. A disabled recorder still writes manifests.
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }

    /// Directory holding the files of one job.
    pub fn job_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(file_stem(task_id))
    }

    /// Path of the manifest of one job.
    pub fn manifest_path(&self, task_id: &str) -> PathBuf {
        self.job_dir(task_id).join("manifest.json")
    }

    /// Records the handle of an accepted submission.
    pub async fn record_submission(&self, handle: &JobHandle) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.job_dir(handle.task_id()).join("submission.json");
        write_json(&path, handle).await.map(Some)
    }

    /// Records the raw body of the `n`th poll.
    pub async fn record_poll(&self, task_id: &str, n: u32, raw: &Value) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.job_dir(task_id).join(format!("status_{:03}.json", n));
        write_json(&path, raw).await.map(Some)
    }

    /// Writes (or rewrites) the manifest of a job.
    pub async fn write_manifest(&self, manifest: &JobManifest) -> Result<PathBuf> {
        let path = self.manifest_path(&manifest.task_id);
        write_json(&path, manifest).await
    }
}

/// Maps a task id onto a single safe path component.
pub(crate) fn file_stem(task_id: &str) -> String {
    task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, body).await?;
    Ok(path.to_path_buf())
}
