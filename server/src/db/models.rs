//! Database Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of the inbound message log.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InboundMessageRecord {
    pub id: Uuid,
    pub wa_message_id: String,
    pub phone: String,
    pub message_type: String,
    pub status: String,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Processing outcome stored in `inbound_messages.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundStatus {
    Received,
    Replied,
    Ignored,
    Failed,
}

impl InboundStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Replied => "replied",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }
}
