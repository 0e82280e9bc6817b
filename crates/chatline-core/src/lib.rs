//! chatline core: transport-agnostic protocol primitives, error types, and codecs.
//!
//! This crate defines the wire-level contracts and error surface shared by the
//! client runtime and by anything that needs to speak the chat protocol (test
//! servers, tooling). It carries no async runtime so it can be reused in
//! multiple contexts; the only I/O-adjacent piece is the newline frame codec,
//! which plugs into `tokio_util::codec`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `ChatError`/`DecodeError` so a client
//! does not crash on malformed input from the server.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ChatError, DecodeError, ErrorCode, Result};
