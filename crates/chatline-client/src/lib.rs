//! chatline client runtime.
//!
//! Wires the pieces a chat front end needs on top of `chatline-core`:
//! - `config`: strict YAML client settings
//! - `dispatch`: decode inbound frames and route them to typed handlers
//! - `transport`: the TCP connection (reader task, serialized writer)
//! - `session`: login/chat state machine and application callbacks
//!
//! Consumed by the `chatline` terminal binary and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod dispatch;
pub mod session;
pub mod transport;

pub use session::{Phase, Session, SessionListener};
