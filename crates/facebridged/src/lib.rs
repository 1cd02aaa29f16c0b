//! facebridged: bridges a host application to face matching and detection.
//!
//! The host sends JSON request envelopes over a frame channel; the gateway
//! dispatches them and writes one response envelope back per request.

pub mod config;
pub mod gateway;
pub mod protocol;
pub mod transport;

pub use config::Config;
pub use gateway::{Gateway, Outbound, TransportError};
pub use protocol::{ErrorInfo, MessageKind, Request, ResponseEnvelope};
