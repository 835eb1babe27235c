//! Normalised Message Types
//!
//! What the gateway hands to reply generation after parsing a webhook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound user message, flattened out of the webhook envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender phone number (WhatsApp ID).
    pub phone: String,
    /// Sender profile name, or the phone number when no profile was sent.
    pub name: String,
    /// Provider message ID.
    pub message_id: String,
    /// Business phone number ID the message was sent to.
    pub phone_number_id: Option<String>,
    /// When the user sent the message.
    pub timestamp: Option<DateTime<Utc>>,
    /// Message body.
    pub content: MessageContent,
}

/// Supported message bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Image {
        media_id: String,
        mime_type: String,
        caption: Option<String>,
    },
    Document {
        media_id: String,
        mime_type: String,
        filename: Option<String>,
        caption: Option<String>,
    },
    Audio {
        media_id: String,
        mime_type: String,
    },
}

impl MessageContent {
    /// Type tag as used by the Cloud API.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
            Self::Audio { .. } => "audio",
        }
    }

    /// Media ID for media messages.
    #[must_use]
    pub fn media_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Image { media_id, .. }
            | Self::Document { media_id, .. }
            | Self::Audio { media_id, .. } => Some(media_id),
        }
    }

    /// Short text for logs: the body for text, the caption or type otherwise.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let text = match self {
            Self::Text { body } => body.as_str(),
            Self::Image { caption, .. } | Self::Document { caption, .. } => {
                caption.as_deref().unwrap_or_else(|| self.kind())
            }
            Self::Audio { .. } => "audio",
        };
        text.chars().take(max_chars).collect()
    }
}

/// Delivery state reported in a status receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Read,
    Failed,
    Other,
}

impl DeliveryState {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            "failed" => Self::Failed,
            _ => Self::Other,
        }
    }
}

/// Receipt for a message the business sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReceipt {
    pub message_id: String,
    pub state: DeliveryState,
    pub recipient_id: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Parse a Cloud API timestamp (Unix seconds as a string).
#[must_use]
pub fn parse_unix_timestamp(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
