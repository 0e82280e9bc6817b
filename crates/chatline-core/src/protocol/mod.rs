//! Protocol modules (message model, envelope codec, line framing).
//!
//! This module hosts the layers of the chat wire format:
//! - `timestamp`: the fixed textual timestamp every message carries.
//! - `message`: plain request/response records and the closed `Message` union.
//! - `envelope`: `{type, object}` JSON envelopes with lazily parsed `RawValue` objects.
//! - `frame`: newline-delimited framing over a byte stream.
//!
//! All parsers are panic-free: malformed input is reported as `DecodeError`
//! instead of panicking, keeping the reader loop alive on bad traffic.

pub mod envelope;
pub mod frame;
pub mod message;
pub mod timestamp;

pub use envelope::{decode, encode, Envelope, MessageKind, TagStyle};
pub use frame::{FrameCodec, InboundFrame};
pub use message::{
    ChatMessageRequest, ChatMessageResponse, LoginRequest, LoginResponse, Message,
    NetworkMessage, ServerErrorMessage, SERVER_SENDER,
};
pub use timestamp::{Timestamp, TimestampError};
