//! Long-running remote generation jobs.

mod client;
pub mod manifest;
mod provider;
pub mod providers;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::{JobClient, JobOutcome};
pub use manifest::{JobManifest, ResponseRecorder};
pub use provider::JobProvider;
pub use types::{
    ArtifactKind, JobHandle, JobParameters, JobRequest, JobResult, JobState, JobStatus,
    ProviderKind,
};
