//! # NAI UI client core
//!
//! Correlates requests sent to the sidecar worker with the messages it
//! streams back, and keeps the resulting application state:
//! - `jobs`: one single-flight manager per backend domain
//! - `router`: fans inbound messages out to the managers
//! - `transport`: outbound request channel
//! - `sidecar`: worker process spawning and line forwarding
//! - `state`: the application store
//! - `client`: wires all of the above together

pub mod client;
pub mod jobs;
pub mod router;
pub mod sidecar;
pub mod state;
pub mod transport;

pub use client::Client;
pub use state::AppState;
pub use transport::{ChannelTransport, Disconnected, InboundFrame, Transport};
