//! Shared error types across chatline crates.

use std::fmt;

use thiserror::Error;

/// Protocol error codes (stable wire API, serialized as integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Valid request, but invalid timing.
    InvalidRequestFromClient,
    /// The username already exists on the server.
    UserNameInUse,
    /// The username was invalid (e.g. empty).
    InvalidUserName,
    /// Malformed frame of unknown shape.
    MalformedRequestUnknown,
    /// Envelope without a `type` tag.
    MalformedRequestNoType,
    /// Envelope whose `type` tag is not recognized.
    MalformedRequestUnknownType,
    /// Envelope whose `object` does not match its `type`.
    MalformedRequestBadObjectDef,
    /// Envelope without an `object`.
    MalformedRequestNoObj,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::InvalidRequestFromClient,
        ErrorCode::UserNameInUse,
        ErrorCode::InvalidUserName,
        ErrorCode::MalformedRequestUnknown,
        ErrorCode::MalformedRequestNoType,
        ErrorCode::MalformedRequestUnknownType,
        ErrorCode::MalformedRequestBadObjectDef,
        ErrorCode::MalformedRequestNoObj,
    ];

    /// Numeric wire code.
    pub fn code(self) -> u16 {
        match self {
            ErrorCode::InvalidRequestFromClient => 50,
            ErrorCode::UserNameInUse => 1,
            ErrorCode::InvalidUserName => 2,
            ErrorCode::MalformedRequestUnknown => 200,
            ErrorCode::MalformedRequestNoType => 201,
            ErrorCode::MalformedRequestUnknownType => 202,
            ErrorCode::MalformedRequestBadObjectDef => 203,
            ErrorCode::MalformedRequestNoObj => 210,
        }
    }

    /// Symbolic name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequestFromClient => "INVALID_REQUEST_FROM_CLIENT",
            ErrorCode::UserNameInUse => "USER_NAME_IN_USE",
            ErrorCode::InvalidUserName => "INVALID_USER_NAME",
            ErrorCode::MalformedRequestUnknown => "MALFORMED_REQUEST_UNKNOWN",
            ErrorCode::MalformedRequestNoType => "MALFORMED_REQUEST_NO_TYPE",
            ErrorCode::MalformedRequestUnknownType => "MALFORMED_REQUEST_UNKNOWN_TYPE",
            ErrorCode::MalformedRequestBadObjectDef => "MALFORMED_REQUEST_BAD_OBJECT_DEF",
            ErrorCode::MalformedRequestNoObj => "MALFORMED_REQUEST_NO_OBJ",
        }
    }

    /// Resolve a numeric wire code. Unknown codes fail; there is no default.
    /// Takes the code as read off the wire, so values outside `u16` are
    /// reported as unknown codes too.
    pub fn from_code(code: i64) -> std::result::Result<Self, DecodeError> {
        Self::ALL
            .into_iter()
            .find(|c| i64::from(c.code()) == code)
            .ok_or(DecodeError::UnknownErrorCode(code))
    }

    /// Resolve a symbolic name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Envelope decode failures.
///
/// Each variant maps to the protocol code the dispatcher reports, except
/// `UnknownErrorCode`, which is an internal failure with no code of its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("envelope has no type tag")]
    NoType,
    #[error("unknown type tag: {0}")]
    UnknownType(String),
    #[error("envelope has no object")]
    NoObject,
    #[error("object does not match {tag}: {detail}")]
    BadObject { tag: &'static str, detail: String },
    #[error("unknown error code: {0}")]
    UnknownErrorCode(i64),
    #[error("frame exceeds {max} bytes ({len} discarded)")]
    FrameTooLarge { len: usize, max: usize },
}

impl DecodeError {
    /// Protocol code reported to handlers for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DecodeError::Malformed(_) | DecodeError::FrameTooLarge { .. } => {
                ErrorCode::MalformedRequestUnknown
            }
            DecodeError::NoType => ErrorCode::MalformedRequestNoType,
            DecodeError::UnknownType(_) => ErrorCode::MalformedRequestUnknownType,
            DecodeError::NoObject => ErrorCode::MalformedRequestNoObj,
            DecodeError::BadObject { .. } | DecodeError::UnknownErrorCode(_) => {
                ErrorCode::MalformedRequestBadObjectDef
            }
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum ChatError {
    // transport
    #[error("unresolved host: {0}")]
    UnresolvedHost(String),
    #[error("connect failed: {0}")]
    ConnectFailure(#[source] std::io::Error),
    #[error("connect timed out after {0} ms")]
    ConnectTimeout(u64),
    #[error("read failed: {0}")]
    ReadFailure(#[source] std::io::Error),
    #[error("write failed: {0}")]
    WriteFailure(#[source] std::io::Error),
    #[error("connection closed by peer")]
    ClosedByPeer,
    #[error("too many write failures ({0} in a row)")]
    WriteFailuresExceeded(u32),
    #[error("connection closed")]
    ConnectionClosed,

    // protocol
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("encode: {0}")]
    Encode(String),

    // application
    #[error("server error {code}: {message}")]
    Server { code: ErrorCode, message: String },

    // local
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl ChatError {
    /// Protocol code carried by this error; `None` for transport and local failures.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ChatError::Decode(e) => Some(e.error_code()),
            ChatError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this is a transport-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::UnresolvedHost(_)
                | ChatError::ConnectFailure(_)
                | ChatError::ConnectTimeout(_)
                | ChatError::ReadFailure(_)
                | ChatError::WriteFailure(_)
                | ChatError::ClosedByPeer
                | ChatError::WriteFailuresExceeded(_)
                | ChatError::ConnectionClosed
        )
    }
}

impl serde::Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        ErrorCode::from_code(code).map_err(serde::de::Error::custom)
    }
}
