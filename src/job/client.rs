//! Remote job client: submit, wait, download.

use crate::cache::{ArtifactCache, Fingerprint};
use crate::config::ClientConfig;
use crate::error::{sanitize_error_message, GenJobError, Result};
use crate::job::manifest::{file_stem, JobManifest, ResponseRecorder};
use crate::job::provider::JobProvider;
use crate::job::types::{JobHandle, JobRequest, JobResult, JobState, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

/// Everything a finished [`JobClient::run`] produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// The succeeded job.
    pub result: JobResult,
    /// Where the manifest was written.
    pub manifest_path: PathBuf,
    /// Where the artifact was written.
    pub artifact_path: PathBuf,
}

/// Drives jobs of one provider from submission to a file on disk.
pub struct JobClient<P> {
    provider: P,
    config: ClientConfig,
    http: reqwest::Client,
    recorder: ResponseRecorder,
    cache: Option<Arc<dyn ArtifactCache>>,
}

impl<P: JobProvider> JobClient<P> {
    /// Creates a client for `provider` with validated settings.
    pub fn new(provider: P, config: ClientConfig) -> Result<Self> {
        // Bounds connects and stalls, not the whole transfer.
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .read_timeout(config.request_timeout())
            .build()
            .map_err(|e| GenJobError::Config(format!("failed to build HTTP client: {}", e)))?;
        let recorder = ResponseRecorder::new(config.output_dir(), config.record_responses());

        Ok(Self {
            provider,
            config,
            http,
            recorder,
            cache: None,
        })
    }

    /// Attaches a cache consulted by [`generate`](Self::generate).
    pub fn with_cache(mut self, cache: Arc<dyn ArtifactCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the HTTP client used for artifact downloads.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The client settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submits a job.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        request.validate()?;

        let handle = self.provider.submit(request).await?;
        tracing::info!(
            task_id = %handle.task_id(),
            provider = %self.provider.kind(),
            model = %handle.model,
            "submitted job"
        );

        if let Err(e) = self.recorder.record_submission(&handle).await {
            tracing::warn!(task_id = %handle.task_id(), "failed to record submission: {e}");
        }
        Ok(handle)
    }

    /// Fetches the current status of a job once.
    pub async fn poll(&self, handle: &JobHandle) -> Result<JobStatus> {
        self.provider.poll(handle).await
    }

    /// Waits for a job using the configured interval and budget.
    pub async fn await_completion(&self, handle: &JobHandle) -> Result<JobResult> {
        self.await_completion_with(handle, self.config.poll_interval(), self.config.max_wait())
            .await
    }

    /// Polls every `poll_interval` until the job is terminal or `max_wait` has elapsed.
    ///
    /// Transport failures while polling are logged and polled through.
    pub async fn await_completion_with(
        &self,
        handle: &JobHandle,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<JobResult> {
        if poll_interval.is_zero() {
            return Err(GenJobError::Config("poll_interval must be non-zero".into()));
        }

        let task_id = handle.task_id();
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;

            match self.provider.poll(handle).await {
                Ok(status) => {
                    if let Err(e) = self.recorder.record_poll(task_id, polls, &status.raw).await {
                        tracing::warn!(task_id = %task_id, "failed to record poll: {e}");
                    }

                    match status.state {
                        JobState::Succeeded => {
                            let elapsed = start.elapsed();
                            tracing::info!(
                                task_id = %task_id,
                                polls,
                                elapsed_secs = elapsed.as_secs(),
                                "job succeeded"
                            );
                            return JobResult::from_status(handle, status, elapsed, polls);
                        }
                        JobState::Failed | JobState::Canceled => {
                            let message = status
                                .message
                                .map(|m| sanitize_error_message(&m))
                                .unwrap_or_else(|| "provider gave no reason".into());
                            tracing::warn!(
                                task_id = %task_id,
                                state = %status.state,
                                "job ended without a result: {message}"
                            );
                            return Err(GenJobError::JobFailed {
                                state: status.state,
                                message,
                            });
                        }
                        JobState::Queued | JobState::Running => {
                            tracing::debug!(
                                task_id = %task_id,
                                state = %status.state,
                                poll = polls,
                                elapsed_secs = start.elapsed().as_secs(),
                                "job pending"
                            );
                        }
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(task_id = %task_id, poll = polls, "poll failed, will retry: {e}");
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                tracing::warn!(
                    task_id = %task_id,
                    polls,
                    elapsed_secs = elapsed.as_secs(),
                    "gave up waiting for job"
                );
                return Err(GenJobError::Timeout {
                    task_id: task_id.to_string(),
                    waited: elapsed,
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Streams the artifact of a succeeded job into the output directory.
    pub async fn fetch_artifact(&self, result: &JobResult) -> Result<PathBuf> {
        let dest = self.artifact_path(result);
        let url = result.url.as_str();

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenJobError::Download {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let mut file = tokio::fs::File::create(&dest).await?;
        let written = match copy_body(&mut response, &mut file, url).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e);
            }
        };

        tracing::info!(
            task_id = %result.handle.task_id(),
            path = %dest.display(),
            bytes = written,
            "artifact saved"
        );
        Ok(dest)
    }

    /// Submits, waits and downloads, writing the manifest along the way.
    ///
    /// The manifest is written before the download starts so a failed
    /// download still leaves the result URL on disk.
    pub async fn run(&self, request: &JobRequest) -> Result<JobOutcome> {
        let handle = self.submit(request).await?;
        let result = self.await_completion(&handle).await?;

        let manifest = JobManifest::from_result(&result);
        let manifest_path = self.recorder.write_manifest(&manifest).await?;

        let artifact_path = self.fetch_artifact(&result).await?;
        self.recorder
            .write_manifest(&manifest.with_local_path(&artifact_path))
            .await?;

        Ok(JobOutcome {
            result,
            manifest_path,
            artifact_path,
        })
    }

    /// Like [`run`](Self::run), but skips the provider entirely on a cache hit.
    pub async fn generate(&self, request: &JobRequest) -> Result<PathBuf> {
        let fingerprint = Fingerprint::of(request);

        if let Some(cache) = &self.cache {
            if let Some(path) = cache.get(&fingerprint) {
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    tracing::debug!(%fingerprint, path = %path.display(), "cache hit");
                    return Ok(path);
                }
                tracing::debug!(%fingerprint, "cached artifact missing on disk");
                cache.remove(&fingerprint);
            }
        }

        let outcome = self.run(request).await?;
        if let Some(cache) = &self.cache {
            cache.insert(fingerprint, outcome.artifact_path.clone());
        }
        Ok(outcome.artifact_path)
    }

    /// Path of the manifest for a task id.
    pub fn manifest_path(&self, task_id: &str) -> PathBuf {
        self.recorder.manifest_path(task_id)
    }

    fn artifact_path(&self, result: &JobResult) -> PathBuf {
        let ext = url_extension(&result.url)
            .unwrap_or_else(|| result.kind.default_extension().to_string());
        self.config
            .output_dir()
            .join(format!("{}.{}", file_stem(result.handle.task_id()), ext))
    }
}

async fn copy_body(
    response: &mut reqwest::Response,
    file: &mut tokio::fs::File,
    url: &str,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| download_error(url, e))? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn download_error(url: &str, err: reqwest::Error) -> GenJobError {
    GenJobError::Download {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// Extension of the last path segment of `url`, if it looks like one.
fn url_extension(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let ext = Path::new(parsed.path()).extension()?.to_str()?;
    if (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}
