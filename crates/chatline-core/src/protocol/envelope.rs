//! Envelope codec (JSON).
//!
//! Wire shape: `{"type": "<tag>", "object": {...}}`. Decoding reads the tag
//! first and keeps `object` as `RawValue`, so the concrete decoder is picked
//! before any field-level parsing happens.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{ChatError, DecodeError, ErrorCode};
use crate::protocol::message::{
    ChatMessageRequest, ChatMessageResponse, LoginRequest, LoginResponse, Message,
    ServerErrorMessage,
};
use crate::protocol::timestamp::Timestamp;

/// JSON field holding the type tag.
pub const PROPERTY_TYPE: &str = "type";
/// JSON field holding the message object.
pub const PROPERTY_OBJECT: &str = "object";

const LEGACY_PREFIX: &str = "ca.uwo.eng.se3313.lab4.network.";

/// Every message type the protocol knows. The tag mapping is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    LoginRequest,
    ChatMessageRequest,
    LoginResponse,
    ChatMessageResponse,
    ServerError,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::LoginRequest,
        MessageKind::ChatMessageRequest,
        MessageKind::LoginResponse,
        MessageKind::ChatMessageResponse,
        MessageKind::ServerError,
    ];

    /// Canonical short tag.
    pub fn tag(self) -> &'static str {
        match self {
            MessageKind::LoginRequest => "LoginRequest",
            MessageKind::ChatMessageRequest => "ChatMessageRequest",
            MessageKind::LoginResponse => "LoginResponse",
            MessageKind::ChatMessageResponse => "ChatMessageResponse",
            MessageKind::ServerError => "ServerError",
        }
    }

    /// Fully-qualified tag used by older servers.
    pub fn legacy_tag(self) -> &'static str {
        match self {
            MessageKind::LoginRequest => "ca.uwo.eng.se3313.lab4.network.request.LoginRequest",
            MessageKind::ChatMessageRequest => {
                "ca.uwo.eng.se3313.lab4.network.request.MessageRequest"
            }
            MessageKind::LoginResponse => "ca.uwo.eng.se3313.lab4.network.response.LoginResponse",
            MessageKind::ChatMessageResponse => {
                "ca.uwo.eng.se3313.lab4.network.response.MessageResponse"
            }
            MessageKind::ServerError => "ca.uwo.eng.se3313.lab4.network.response.ServerError",
        }
    }

    /// Resolve a tag in either style.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let by = |f: fn(MessageKind) -> &'static str| {
            Self::ALL.into_iter().find(|k| f(*k) == tag)
        };
        if tag.starts_with(LEGACY_PREFIX) {
            by(MessageKind::legacy_tag)
        } else {
            by(MessageKind::tag)
        }
    }

    /// Whether a client may receive this kind.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            MessageKind::LoginResponse | MessageKind::ChatMessageResponse | MessageKind::ServerError
        )
    }

    pub fn tag_for(self, style: TagStyle) -> &'static str {
        match style {
            TagStyle::Canonical => self.tag(),
            TagStyle::Legacy => self.legacy_tag(),
        }
    }
}

/// Which tag spelling `encode` emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagStyle {
    #[default]
    Canonical,
    Legacy,
}

/// Inbound envelope with the object left unparsed.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Type tag (field name is `type` in JSON).
    #[serde(rename = "type", default)]
    pub msg_type: Option<String>,
    /// Message object, stored as raw JSON (lazy parsing).
    #[serde(default)]
    pub object: Option<Box<RawValue>>,
}

impl Envelope {
    /// Parse only the envelope shell.
    pub fn peek(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes)
            .map_err(|e| DecodeError::Malformed(format!("invalid envelope json: {e}")))
    }

    /// Resolve the tag. Missing and unrecognized tags fail differently.
    pub fn kind(&self) -> Result<MessageKind, DecodeError> {
        let tag = self.msg_type.as_deref().ok_or(DecodeError::NoType)?;
        MessageKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownType(tag.to_string()))
    }

    /// Decode `object` through the decoder selected by the tag.
    pub fn open(&self) -> Result<Message, DecodeError> {
        let kind = self.kind()?;
        let raw = self.object.as_deref().ok_or(DecodeError::NoObject)?;
        decode_object(kind, raw.get())
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    object: &'a T,
}

fn to_json<T: Serialize>(tag: &'static str, object: &T) -> Result<Vec<u8>, ChatError> {
    serde_json::to_vec(&OutboundEnvelope { msg_type: tag, object })
        .map_err(|e| ChatError::Encode(format!("json encode failed: {e}")))
}

/// Serialize a message into an envelope (no frame delimiter).
pub fn encode(msg: &Message, style: TagStyle) -> Result<Vec<u8>, ChatError> {
    let tag = msg.kind().tag_for(style);
    match msg {
        Message::LoginRequest(m) => to_json(tag, m),
        Message::ChatMessageRequest(m) => to_json(tag, m),
        Message::LoginResponse(m) => to_json(tag, m),
        Message::ChatMessageResponse(m) => to_json(tag, m),
        Message::ServerError(m) => to_json(tag, m),
    }
}

/// Decode one complete envelope.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    Envelope::peek(bytes)?.open()
}

/// Wire form of `ServerErrorMessage` with the code still numeric, so an
/// unknown code fails as `UnknownErrorCode` instead of a generic bad object.
#[derive(Deserialize)]
struct ServerErrorWire {
    datetime: Timestamp,
    sender: String,
    code: i64,
    message: String,
    #[serde(default)]
    originator: Option<String>,
}

fn decode_object(kind: MessageKind, raw: &str) -> Result<Message, DecodeError> {
    let bad = |e: serde_json::Error| DecodeError::BadObject {
        tag: kind.tag(),
        detail: e.to_string(),
    };

    let msg: Message = match kind {
        MessageKind::LoginRequest => serde_json::from_str::<LoginRequest>(raw).map_err(bad)?.into(),
        MessageKind::ChatMessageRequest => serde_json::from_str::<ChatMessageRequest>(raw)
            .map_err(bad)?
            .into(),
        MessageKind::LoginResponse => serde_json::from_str::<LoginResponse>(raw).map_err(bad)?.into(),
        MessageKind::ChatMessageResponse => serde_json::from_str::<ChatMessageResponse>(raw)
            .map_err(bad)?
            .into(),
        MessageKind::ServerError => {
            let w: ServerErrorWire = serde_json::from_str(raw).map_err(bad)?;
            ServerErrorMessage {
                sent_at: w.datetime,
                sender: w.sender,
                code: ErrorCode::from_code(w.code)?,
                message: w.message,
                originator: w.originator,
            }
            .into()
        }
    };

    if msg.sender().is_empty() {
        return Err(DecodeError::BadObject {
            tag: kind.tag(),
            detail: "sender must not be empty".into(),
        });
    }
    Ok(msg)
}
