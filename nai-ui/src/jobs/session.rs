//! Single-flight job session and job id generation

use chrono::Utc;
use nai_common::ipc::Operation;

/// The one job a manager is waiting on.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveJob<M, C> {
    pub job_id: String,
    pub op: Operation,
    pub mode: M,
    /// Data the terminal message needs but the worker does not echo back
    pub context: C,
}

/// Session state of one manager
///
/// `AwaitingResponse` exists only between dispatch and the terminal message
/// (or a failed dispatch).
#[derive(Debug, Clone, PartialEq)]
pub enum JobSession<M, C> {
    Idle,
    AwaitingResponse(ActiveJob<M, C>),
}

impl<M, C> Default for JobSession<M, C> {
    fn default() -> Self {
        JobSession::Idle
    }
}

impl<M, C> JobSession<M, C> {
    pub fn is_idle(&self) -> bool {
        matches!(self, JobSession::Idle)
    }

    pub fn active(&self) -> Option<&ActiveJob<M, C>> {
        match self {
            JobSession::Idle => None,
            JobSession::AwaitingResponse(job) => Some(job),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.active().map(|job| job.job_id.as_str())
    }

    /// Whether a message carrying `id` belongs to this session
    pub fn owns(&self, id: Option<&str>) -> bool {
        match (self.job_id(), id) {
            (Some(active), Some(id)) => active == id,
            _ => false,
        }
    }

    /// End the session, returning the job it held
    pub fn take(&mut self) -> Option<ActiveJob<M, C>> {
        match std::mem::take(self) {
            JobSession::Idle => None,
            JobSession::AwaitingResponse(job) => Some(job),
        }
    }
}

/// Job id generator of one manager.
///
/// Ids look like `template-db-list-1718000000000-3`: operation, dispatch time
/// in milliseconds, then a per-manager sequence number so two dispatches in the
/// same millisecond still differ.
#[derive(Debug, Default)]
pub struct JobIds {
    sequence: u64,
}

impl JobIds {
    pub fn next(&mut self, op: Operation) -> String {
        let id = format!(
            "{}-{}-{}",
            op.id_prefix(),
            Utc::now().timestamp_millis(),
            self.sequence
        );
        self.sequence += 1;
        id
    }
}
