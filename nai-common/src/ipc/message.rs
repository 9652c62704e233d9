//! Worker → client messages

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Worker → client message
///
/// Every variant may carry the id of the request it belongs to. A job emits
/// any number of `Ack`/`Progress`/`Result`/`Log` messages and exactly one
/// terminal message (`Done` or `Error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobMessage {
    /// Worker accepted the request
    Ack {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        op: Option<String>,
    },

    /// Counters for long-running jobs
    Progress {
        #[serde(default)]
        id: Option<String>,
        #[serde(default, deserialize_with = "null_as_default")]
        processed: u64,
        #[serde(default, deserialize_with = "null_as_default")]
        total: u64,
        #[serde(default, deserialize_with = "null_as_default")]
        errors: u64,
        #[serde(default, deserialize_with = "null_as_default")]
        skipped: u64,
    },

    /// Outcome for a single file
    Result {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        preview: Option<String>,
    },

    /// Terminal success (possibly after cancellation)
    Done {
        #[serde(default)]
        id: Option<String>,
        #[serde(default, deserialize_with = "null_as_default")]
        processed: u64,
        #[serde(default, deserialize_with = "null_as_default")]
        errors: u64,
        #[serde(default, deserialize_with = "null_as_default")]
        skipped: u64,
        #[serde(default)]
        payload: Option<Value>,
        #[serde(default)]
        stats: Option<Value>,
        #[serde(default, deserialize_with = "null_as_default")]
        cancelled: bool,
    },

    /// Terminal failure
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    /// Free-form log line, not necessarily tied to a job
    Log {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    /// WebSocket heartbeat; never delivered past [`decode_frame`]
    Ping,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl JobMessage {
    /// Build a log message not tied to any job
    pub fn log(message: impl Into<String>) -> Self {
        JobMessage::Log {
            id: None,
            message: Some(message.into()),
        }
    }

    /// Job id this message belongs to, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            JobMessage::Ack { id, .. }
            | JobMessage::Progress { id, .. }
            | JobMessage::Result { id, .. }
            | JobMessage::Done { id, .. }
            | JobMessage::Error { id, .. }
            | JobMessage::Log { id, .. } => id.as_deref(),
            JobMessage::Ping => None,
        }
    }

    /// `done` and `error` close a job
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobMessage::Done { .. } | JobMessage::Error { .. })
    }

    /// Get message type as string for logging
    pub fn kind(&self) -> &'static str {
        match self {
            JobMessage::Ack { .. } => "ack",
            JobMessage::Progress { .. } => "progress",
            JobMessage::Result { .. } => "result",
            JobMessage::Done { .. } => "done",
            JobMessage::Error { .. } => "error",
            JobMessage::Log { .. } => "log",
            JobMessage::Ping => "ping",
        }
    }
}

/// Decode one inbound frame.
///
/// Blank frames and heartbeats yield `Ok(None)` so they never reach a job
/// manager.
pub fn decode_frame(frame: &str) -> crate::Result<Option<JobMessage>> {
    let frame = frame.trim();
    if frame.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<JobMessage>(frame)? {
        JobMessage::Ping => Ok(None),
        message => Ok(Some(message)),
    }
}
