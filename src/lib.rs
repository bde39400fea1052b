#![warn(missing_docs)]
//! GenJob - submit, wait for and download long-running AI media jobs.
//!
//! Video generation APIs answer a submission with a task id and leave the
//! caller to poll until the job settles. This crate wraps that workflow in
//! a single [`JobClient`] that is parameterized by a [`JobProvider`].
//!
//! # Quick Start
//!
//! ```no_run
//! use genjob::{ClientConfig, DashScopeProvider, JobClient, JobRequest};
//!
//! #[tokio::main]
//! async fn main() -> genjob::Result<()> {
//!     let provider = DashScopeProvider::builder().build()?;
//!     let config = ClientConfig::builder().output_dir("videos").build()?;
//!     let client = JobClient::new(provider, config)?;
//!
//!     let request = JobRequest::new("wan2.2-t2v-plus", "Ocean waves at sunset")
//!         .with_size("1920*1080");
//!     let outcome = client.run(&request).await?;
//!     println!("saved {}", outcome.artifact_path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `dashscope-video`: DashScope (Alibaba Model Studio, Wan models)
//! - `ark-video`: Ark (Volcengine, Seaweed/Seedance models)
//! - `video`: All video providers (default)
//! - `cli`: Command-line interface

pub mod cache;
mod config;
mod error;
pub mod job;

pub use cache::{ArtifactCache, Fingerprint, MemoryCache};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{GenJobError, Result};
pub use job::{
    ArtifactKind, JobClient, JobHandle, JobManifest, JobOutcome, JobParameters, JobProvider,
    JobRequest, JobResult, JobState, JobStatus, ProviderKind,
};

#[cfg(feature = "dashscope-video")]
pub use job::providers::{DashScopeProvider, DashScopeProviderBuilder, DashScopeVideoModel};

#[cfg(feature = "ark-video")]
pub use job::providers::{ArkProvider, ArkProviderBuilder, ArkVideoModel, TaskFilter, TaskPage};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cache::{ArtifactCache, MemoryCache};
    pub use crate::config::ClientConfig;
    pub use crate::error::{GenJobError, Result};
    pub use crate::job::{JobClient, JobProvider, JobRequest};

    #[cfg(feature = "dashscope-video")]
    pub use crate::job::providers::DashScopeProvider;

    #[cfg(feature = "ark-video")]
    pub use crate::job::providers::ArkProvider;
}
