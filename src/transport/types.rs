//! Transport-facing value types

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::keyboard::Keyboard;
use crate::template::ParseMode;

/// Telegram message length limits, in UTF-16 code units
pub const MAX_TEXT_LENGTH: usize = 4096;
pub const MAX_CAPTION_LENGTH: usize = 1024;

/// A chat to deliver to: numeric chat id or `@channel` username
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON form for the Bot API: integer when numeric, string otherwise
    pub fn to_json(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(id) => Value::from(id),
            Err(_) => Value::from(self.0.clone()),
        }
    }
}

impl From<i64> for Destination {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for Destination {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Destination {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a photo or document comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// A file already uploaded to the platform
    FileId(String),
    /// A public URL the platform fetches itself
    Url(String),
    /// A local file uploaded with the request
    Path(PathBuf),
}

/// Optional media attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Media {
    Photo(MediaSource),
    Document(MediaSource),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Text,
    Photo,
    Document,
}

impl DeliveryMode {
    pub fn for_media(media: Option<&Media>) -> Self {
        match media {
            Some(Media::Document(_)) => DeliveryMode::Document,
            Some(Media::Photo(_)) => DeliveryMode::Photo,
            None => DeliveryMode::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Text => "text",
            DeliveryMode::Photo => "photo",
            DeliveryMode::Document => "document",
        }
    }

    /// Length limit for the body (text or caption) in this mode
    pub fn body_limit(&self) -> usize {
        match self {
            DeliveryMode::Text => MAX_TEXT_LENGTH,
            DeliveryMode::Photo | DeliveryMode::Document => MAX_CAPTION_LENGTH,
        }
    }
}

/// Per-message options passed through to the transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    pub keyboard: Option<Keyboard>,
    pub parse_mode: Option<ParseMode>,
}

/// What the transport reports back for one delivered message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: Option<i64>,
}

/// Outcome of a successful send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReceipt {
    /// Correlates the log records of one delivery
    pub delivery_id: Uuid,
    pub message_id: Option<i64>,
    pub destination: Destination,
    pub mode: DeliveryMode,
    /// Transport calls made, including retries
    pub attempts: u32,
    pub delivered_at: DateTime<Utc>,
}
