//! Job provider trait.

use crate::error::Result;
use crate::job::types::{JobHandle, JobRequest, JobStatus, ProviderKind};
use async_trait::async_trait;

/// A vendor API that accepts long-running generation jobs.
///
/// Implementations own the endpoint paths, payload shape and status
/// vocabulary of one provider. Waiting and downloading live in
/// [`JobClient`](crate::job::JobClient).
#[async_trait]
pub trait JobProvider: Send + Sync {
    /// Submits a job and returns its handle.
    ///
    /// Fails with `Submission` on transport errors, non-2xx responses or a
    /// missing task id.
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle>;

    /// Fetches the current status of a job.
    ///
    /// Fails with `TransientPoll` on transport errors and `Protocol` on a
    /// malformed body.
    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ProviderKind::DashScope => "DashScope (Alibaba Model Studio)",
            ProviderKind::Ark => "Ark (Volcengine)",
        }
    }
}

#[async_trait]
impl<P: JobProvider + ?Sized> JobProvider for Box<P> {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        (**self).submit(request).await
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus> {
        (**self).poll(handle).await
    }

    fn kind(&self) -> ProviderKind {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
