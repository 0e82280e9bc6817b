//! Transport layer (TCP).
//!
//! Exposes the connection that owns the socket: a reader task feeding the
//! dispatcher and a lock-guarded writer for outbound envelopes.

pub mod connection;

pub use connection::{Connection, ConnectionHandler};
