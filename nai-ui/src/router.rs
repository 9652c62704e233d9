//! Fan-out of inbound messages to job managers
//!
//! Every manager sees the same message stream. A message goes to the first
//! handler, in registration order, that owns its id. Unclaimed `log` text and
//! unclaimed errors, with or without an id, fall back to the log.

use crate::jobs::StatusSink;
use crate::transport::Transport;
use nai_common::ipc::JobMessage;
use tracing::{debug, warn};

/// Something that can claim messages by job id
pub trait MessageHandler<S> {
    /// Name used in routing traces
    fn name(&self) -> &'static str;

    fn owns_id(&self, id: &str) -> bool;

    /// Process a message; `false` if it was not claimed after all.
    fn handle(&mut self, message: &JobMessage, transport: &dyn Transport, sink: &mut S) -> bool;
}

/// Where a routed message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Claimed by the named handler
    Handler(&'static str),
    /// Written to the default log sink
    Logged,
    /// Nobody wanted it
    Dropped,
}

/// Offer `message` to `handlers` in order.
pub fn route<S: StatusSink>(
    handlers: &mut [&mut dyn MessageHandler<S>],
    message: &JobMessage,
    transport: &dyn Transport,
    sink: &mut S,
) -> Routed {
    if let Some(id) = message.id() {
        for handler in handlers.iter_mut() {
            if handler.owns_id(id) && handler.handle(message, transport, sink) {
                debug!("{} message {} -> {}", message.kind(), id, handler.name());
                return Routed::Handler(handler.name());
            }
        }
    }

    match message {
        JobMessage::Log {
            message: Some(text), ..
        } => {
            sink.append_log(text);
            Routed::Logged
        }
        JobMessage::Error { id, message } => {
            let text = message.as_deref().unwrap_or("unknown");
            let line = match id {
                Some(id) => {
                    warn!("Unclaimed error for job {}: {}", id, text);
                    format!("error: {text} (job {id})")
                }
                None => format!("error: {text}"),
            };
            sink.append_log(&line);
            Routed::Logged
        }
        other => {
            debug!("Unclaimed {} message (id {:?})", other.kind(), other.id());
            Routed::Dropped
        }
    }
}
