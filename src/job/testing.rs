//! Test doubles shared by the job modules.

use crate::error::{GenJobError, Result};
use crate::job::provider::JobProvider;
use crate::job::types::{JobHandle, JobRequest, JobState, JobStatus, ProviderKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// One scripted answer to a poll.
pub(crate) enum Step {
    Status(JobStatus),
    TransportError,
}

impl Step {
    pub(crate) fn state(state: JobState) -> Self {
        Self::Status(JobStatus::new(state))
    }

    pub(crate) fn succeeded(url: &str) -> Self {
        Self::Status(JobStatus::new(JobState::Succeeded).with_result_url(url))
    }

    pub(crate) fn failed(message: &str) -> Self {
        Self::Status(JobStatus::new(JobState::Failed).with_message(message))
    }
}

/// In-process provider replaying a fixed sequence of poll answers.
///
/// Once the script is exhausted every poll reports `running`.
pub(crate) struct ScriptedProvider {
    task_id: String,
    script: Mutex<VecDeque<Step>>,
    submits: AtomicU32,
    polls: AtomicU32,
}

impl ScriptedProvider {
    pub(crate) fn new(task_id: &str, steps: Vec<Step>) -> Self {
        Self {
            task_id: task_id.to_string(),
            script: Mutex::new(steps.into()),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    pub(crate) fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub(crate) fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobProvider for ScriptedProvider {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        JobHandle::new(self.task_id.clone(), ProviderKind::DashScope, request)
    }

    async fn poll(&self, _handle: &JobHandle) -> Result<JobStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Status(status)) => Ok(status),
            Some(Step::TransportError) => {
                Err(GenJobError::TransientPoll("connection reset by peer".into()))
            }
            None => Ok(JobStatus::new(JobState::Running)),
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::DashScope
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub(crate) async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
