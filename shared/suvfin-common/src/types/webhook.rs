//! Webhook Envelope Types
//!
//! Serde model of the payloads Meta posts to the webhook.
//! Ref: <https://developers.facebook.com/docs/whatsapp/cloud-api/webhooks/components>
//!
//! Every struct ignores unknown fields, and the `value` of a change is kept
//! as raw JSON until its `field` is known, so receipts and account updates
//! never fail to decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Object tag Meta uses for WhatsApp Business Account notifications.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

/// Change field carrying inbound messages and status receipts.
pub const MESSAGES_FIELD: &str = "messages";

/// Root webhook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Subscribed object type.
    pub object: String,
    /// Notifications, one per business account.
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

impl WebhookEnvelope {
    /// Whether the envelope belongs to a WhatsApp Business Account.
    #[must_use]
    pub fn is_whatsapp(&self) -> bool {
        self.object == WHATSAPP_OBJECT
    }
}

/// One notification entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEntry {
    /// Business account ID.
    pub id: String,
    /// Unix timestamp when the notification was sent.
    #[serde(default)]
    pub time: Option<i64>,
    /// Changed fields.
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// A single changed field with its raw value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChange {
    /// Field tag (`messages`, `account_update`, ...).
    pub field: String,
    /// Raw value, decoded according to `field`.
    #[serde(default)]
    pub value: Value,
}

impl WebhookChange {
    /// Whether this change carries messages or status receipts.
    #[must_use]
    pub fn is_messages(&self) -> bool {
        self.field == MESSAGES_FIELD
    }
}

/// Decoded value of a `messages` change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesValue {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub statuses: Vec<Status>,
}

/// Business phone number the notification was addressed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub display_phone_number: String,
    pub phone_number_id: String,
}

/// Sender contact card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Customer WhatsApp ID.
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
}

/// Inbound message as delivered by Meta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sender phone number.
    pub from: String,
    /// Message ID (`wamid.*`).
    pub id: String,
    /// Unix timestamp as a decimal string.
    #[serde(default)]
    pub timestamp: String,
    /// Message type: text, image, document, audio, sticker, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub image: Option<MediaBody>,
    #[serde(default)]
    pub document: Option<MediaBody>,
    #[serde(default)]
    pub audio: Option<MediaBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Media reference shared by image, document and audio messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaBody {
    /// Media ID, resolved through the Graph API.
    pub id: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Delivery/read receipt for an outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub recipient_id: String,
}
