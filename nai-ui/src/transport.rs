//! Request transports
//!
//! Managers only need to know whether the worker is reachable and how to hand
//! it a request. Sending never blocks: requests go into an unbounded channel
//! drained by whatever owns the worker's stdin.

use nai_common::ipc::JobRequest;
use nai_common::{Error, Result};
use tokio::sync::mpsc;

/// Outbound side of the IPC channel
pub trait Transport {
    /// Whether requests can be delivered at all
    fn is_connected(&self) -> bool;

    /// Hand a request to the worker.
    fn dispatch(&self, request: &JobRequest) -> Result<()>;
}

/// One raw inbound line from the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A JSON message (stdout or WebSocket text)
    Message(String),
    /// Diagnostic output (stderr), shown in the log verbatim
    Log(String),
}

/// Transport backed by a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<JobRequest>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the worker side drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    fn dispatch(&self, request: &JobRequest) -> Result<()> {
        self.tx
            .send(request.clone())
            .map_err(|_| Error::Transport("worker channel closed".to_string()))
    }
}

/// Browser mode: no worker to talk to
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl Transport for Disconnected {
    fn is_connected(&self) -> bool {
        false
    }

    fn dispatch(&self, _request: &JobRequest) -> Result<()> {
        Err(Error::Transport("IPC is not available in browser mode".to_string()))
    }
}
