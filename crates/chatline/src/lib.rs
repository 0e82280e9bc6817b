//! Top-level facade crate for chatline.
//!
//! Re-exports the protocol core and the client runtime so users can depend on a single crate.

pub mod core {
    pub use chatline_core::*;
}

pub mod client {
    pub use chatline_client::*;
}

pub use chatline_client::{Phase, Session, SessionListener};
pub use chatline_core::{ChatError, ErrorCode, Result};
