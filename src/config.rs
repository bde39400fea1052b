//! Client configuration.

use crate::error::{GenJobError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_OUTPUT_DIR: &str = "genjob_output";

/// Validated settings for a [`JobClient`](crate::job::JobClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    output_dir: PathBuf,
    poll_interval: Duration,
    max_wait: Duration,
    request_timeout: Duration,
    record_responses: bool,
}

impl ClientConfig {
    /// Creates a new `ClientConfigBuilder`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Directory where manifests, recorded responses and artifacts go.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Delay between two status polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wall-clock budget for one job to reach a terminal state.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// HTTP connect and idle-read timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Whether every submission and poll response is written to disk.
    pub fn record_responses(&self) -> bool {
        self.record_responses
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    output_dir: PathBuf,
    poll_interval: Duration,
    max_wait: Duration,
    request_timeout: Duration,
    record_responses: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            poll_interval: Duration::from_secs(4),
            max_wait: Duration::from_secs(300), // 5 minutes for video
            request_timeout: Duration::from_secs(60),
            record_responses: true,
        }
    }
}

impl ClientConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum time to wait for a job.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the HTTP connect and idle-read timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables or disables writing raw responses to disk.
    pub fn record_responses(mut self, record: bool) -> Self {
        self.record_responses = record;
        self
    }

    /// Validates the settings and prepares the output directory.
    pub fn build(self) -> Result<ClientConfig> {
        if self.poll_interval.is_zero() {
            return Err(GenJobError::Config("poll interval must be positive".into()));
        }
        if self.max_wait.is_zero() {
            return Err(GenJobError::Config("max wait must be positive".into()));
        }
        if self.poll_interval > self.max_wait {
            return Err(GenJobError::Config(format!(
                "poll interval {:?} exceeds max wait {:?}",
                self.poll_interval, self.max_wait
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(GenJobError::Config("request timeout must be positive".into()));
        }

        ensure_writable(&self.output_dir)?;

        Ok(ClientConfig {
            output_dir: self.output_dir,
            poll_interval: self.poll_interval,
            max_wait: self.max_wait,
            request_timeout: self.request_timeout,
            record_responses: self.record_responses,
        })
    }
}

fn ensure_writable(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        GenJobError::Config(format!("cannot create output dir {}: {}", dir.display(), e))
    })?;

    let probe = dir.join(".genjob-write-probe");
    std::fs::write(&probe, b"").map_err(|e| {
        GenJobError::Config(format!("output dir {} is not writable: {}", dir.display(), e))
    })?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}
