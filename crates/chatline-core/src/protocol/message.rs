//! Message model: immutable request/response records.
//!
//! Every record carries `datetime` and `sender` on the wire. Responses are
//! always sent by the reserved [`SERVER_SENDER`] identity.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::protocol::envelope::MessageKind;
use crate::protocol::timestamp::Timestamp;

/// Sender identity of every server-originated message.
pub const SERVER_SENDER: &str = "@server";

/// Fields shared by every wire message.
pub trait NetworkMessage {
    const KIND: MessageKind;

    fn sent_at(&self) -> Timestamp;
    fn sender(&self) -> &str;
}

/// Request to join the server under `sender`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "datetime")]
    pub sent_at: Timestamp,
    pub sender: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            sent_at: Timestamp::now(),
            sender: username.into(),
        }
    }
}

/// Chat line sent by the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    #[serde(rename = "datetime")]
    pub sent_at: Timestamp,
    pub sender: String,
    pub content: String,
}

impl ChatMessageRequest {
    pub fn new(sent_at: Timestamp, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sent_at,
            sender: sender.into(),
            content: content.into(),
        }
    }
}

/// Announces that `joining_username` joined the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "datetime")]
    pub sent_at: Timestamp,
    pub sender: String,
    #[serde(rename = "joiningUsername")]
    pub joining_username: String,
}

impl LoginResponse {
    pub fn new(sent_at: Timestamp, joining_username: impl Into<String>) -> Self {
        Self {
            sent_at,
            sender: SERVER_SENDER.to_string(),
            joining_username: joining_username.into(),
        }
    }
}

/// Chat line relayed by the server; `originator` is the original author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    #[serde(rename = "datetime")]
    pub sent_at: Timestamp,
    pub sender: String,
    pub content: String,
    pub originator: String,
}

impl ChatMessageResponse {
    pub fn new(sent_at: Timestamp, originator: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sent_at,
            sender: SERVER_SENDER.to_string(),
            content: content.into(),
            originator: originator.into(),
        }
    }
}

/// Error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorMessage {
    #[serde(rename = "datetime")]
    pub sent_at: Timestamp,
    pub sender: String,
    pub code: ErrorCode,
    pub message: String,
    /// Who caused the error, when the server knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator: Option<String>,
}

impl ServerErrorMessage {
    pub fn new(sent_at: Timestamp, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            sent_at,
            sender: SERVER_SENDER.to_string(),
            code,
            message: message.into(),
            originator: None,
        }
    }
}

macro_rules! network_message {
    ($ty:ident, $kind:ident) => {
        impl NetworkMessage for $ty {
            const KIND: MessageKind = MessageKind::$kind;

            fn sent_at(&self) -> Timestamp {
                self.sent_at
            }

            fn sender(&self) -> &str {
                &self.sender
            }
        }

        impl From<$ty> for Message {
            fn from(m: $ty) -> Self {
                Message::$kind(m)
            }
        }
    };
}

network_message!(LoginRequest, LoginRequest);
network_message!(ChatMessageRequest, ChatMessageRequest);
network_message!(LoginResponse, LoginResponse);
network_message!(ChatMessageResponse, ChatMessageResponse);
network_message!(ServerErrorMessage, ServerError);

/// Closed union over every message the protocol knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    LoginRequest(LoginRequest),
    ChatMessageRequest(ChatMessageRequest),
    LoginResponse(LoginResponse),
    ChatMessageResponse(ChatMessageResponse),
    ServerError(ServerErrorMessage),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::LoginRequest(_) => MessageKind::LoginRequest,
            Message::ChatMessageRequest(_) => MessageKind::ChatMessageRequest,
            Message::LoginResponse(_) => MessageKind::LoginResponse,
            Message::ChatMessageResponse(_) => MessageKind::ChatMessageResponse,
            Message::ServerError(_) => MessageKind::ServerError,
        }
    }

    pub fn sent_at(&self) -> Timestamp {
        match self {
            Message::LoginRequest(m) => m.sent_at(),
            Message::ChatMessageRequest(m) => m.sent_at(),
            Message::LoginResponse(m) => m.sent_at(),
            Message::ChatMessageResponse(m) => m.sent_at(),
            Message::ServerError(m) => m.sent_at(),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Message::LoginRequest(m) => m.sender(),
            Message::ChatMessageRequest(m) => m.sender(),
            Message::LoginResponse(m) => m.sender(),
            Message::ChatMessageResponse(m) => m.sender(),
            Message::ServerError(m) => m.sender(),
        }
    }
}
