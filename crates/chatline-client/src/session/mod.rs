//! Client session: the login/chat state machine on top of a connection.

pub mod listener;
pub mod machine;

pub use listener::SessionListener;
pub use machine::{Phase, Session};
