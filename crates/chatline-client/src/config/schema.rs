use std::time::Duration;

use serde::Deserialize;

use chatline_core::error::{ChatError, Result};
use chatline_core::protocol::TagStyle;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub connection: ConnectionSection,

    #[serde(default)]
    pub session: SessionSection,

    /// Default server for the terminal client.
    #[serde(default)]
    pub server: Option<ServerSection>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            connection: ConnectionSection::default(),
            session: SessionSection::default(),
            server: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ChatError::UnsupportedVersion);
        }

        self.connection.validate()?;
        self.session.validate()?;

        if let Some(server) = &self.server {
            if server.address.trim().is_empty() {
                return Err(ChatError::Config("server.address must not be empty".into()));
            }
            if server.port == 0 {
                return Err(ChatError::Config("server.port must not be 0".into()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_max_write_failures")]
    pub max_write_failures: u32,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            max_write_failures: default_max_write_failures(),
        }
    }
}

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=120_000).contains(&self.connect_timeout_ms) {
            return Err(ChatError::Config(
                "connection.connect_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if !(1..=10).contains(&self.connect_attempts) {
            return Err(ChatError::Config(
                "connection.connect_attempts must be between 1 and 10".into(),
            ));
        }
        if self.connect_backoff_ms > 30_000 {
            return Err(ChatError::Config(
                "connection.connect_backoff_ms must be at most 30000".into(),
            ));
        }
        if !(256..=16 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(ChatError::Config(
                "connection.max_frame_bytes must be between 256 and 16777216".into(),
            ));
        }
        if !(1..=100).contains(&self.max_write_failures) {
            return Err(ChatError::Config(
                "connection.max_write_failures must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    #[serde(default = "default_min_username_len")]
    pub min_username_len: usize,

    /// Emit fully-qualified type tags for servers that only know those.
    #[serde(default)]
    pub legacy_type_tags: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            min_username_len: default_min_username_len(),
            legacy_type_tags: false,
        }
    }
}

impl SessionSection {
    pub fn validate(&self) -> Result<()> {
        if self.min_username_len == 0 {
            return Err(ChatError::Config(
                "session.min_username_len must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn tag_style(&self) -> TagStyle {
        if self.legacy_type_tags {
            TagStyle::Legacy
        } else {
            TagStyle::Canonical
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub address: String,
    pub port: u16,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_connect_attempts() -> u32 {
    1
}
fn default_connect_backoff_ms() -> u64 {
    250
}
fn default_max_frame_bytes() -> usize {
    64 * 1024
}
fn default_max_write_failures() -> u32 {
    3
}
fn default_min_username_len() -> usize {
    3
}
