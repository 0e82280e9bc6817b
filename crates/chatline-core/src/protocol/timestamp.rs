//! Wire timestamps: `yyyy-MM-dd HH:mm:ss.SSSSSS Z`, microsecond precision.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// strftime rendering of the wire pattern.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";

/// Parse side of the pattern: `.%6f` requires the dot and exactly six digits,
/// where `%.6f` would also accept a missing fraction.
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S.%6f %z";

/// `yyyy-MM-dd HH:mm:ss.SSSSSS +hhmm`
const WIRE_LEN: usize = 32;

/// Why a wire timestamp was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("{0:?} does not match yyyy-MM-dd HH:mm:ss.SSSSSS Z")]
    Shape(String),
    #[error("{0:?}: {1}")]
    Value(String, chrono::ParseError),
}

/// Point in time carried by every network message.
///
/// Always truncated to microseconds, so a value survives an encode/decode
/// round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    /// Current local time.
    pub fn now() -> Self {
        Self::from_datetime(DateTime::<FixedOffset>::from(Local::now()))
    }

    pub fn from_datetime(dt: DateTime<FixedOffset>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    /// Parse the wire pattern; anything else fails.
    ///
    /// chrono is lenient about whitespace and `+hh:mm` offsets, so the byte
    /// layout is checked before handing the string over.
    pub fn parse(s: &str) -> Result<Self, TimestampError> {
        if !has_wire_shape(s.as_bytes()) {
            return Err(TimestampError::Shape(s.to_string()));
        }
        DateTime::parse_from_str(s, PARSE_FORMAT)
            .map(Self)
            .map_err(|e| TimestampError::Value(s.to_string(), e))
    }

    pub fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::from_datetime(dt)
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(|e| de::Error::custom(format!("invalid timestamp {e}")))
    }
}

fn has_wire_shape(b: &[u8]) -> bool {
    if b.len() != WIRE_LEN {
        return false;
    }
    b.iter().enumerate().all(|(i, &c)| match i {
        4 | 7 => c == b'-',
        10 | 26 => c == b' ',
        13 | 16 => c == b':',
        19 => c == b'.',
        27 => c == b'+' || c == b'-',
        _ => c.is_ascii_digit(),
    })
}
