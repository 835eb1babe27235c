//! Flattens webhook envelopes into inbound messages and status receipts.

use serde_json::Value;
use suvfin_common::{
    parse_unix_timestamp, DeliveryState, InboundMessage, Message, MessageContent, MessagesValue,
    StatusReceipt, WebhookEnvelope,
};
use tracing::{debug, warn};

/// Everything worth acting on in one delivery.
#[derive(Debug, Default)]
pub struct ParsedEvents {
    pub messages: Vec<InboundMessage>,
    pub statuses: Vec<StatusReceipt>,
    /// Messages of unsupported types plus changes that failed to decode.
    pub skipped: usize,
}

impl ParsedEvents {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.statuses.is_empty()
    }
}

/// Parse a raw webhook body.
///
/// Non-WhatsApp objects and bodies that are not envelopes yield no events.
/// A change that fails to decode is counted as skipped without affecting
/// the rest of the envelope.
pub fn parse_envelope(payload: &Value) -> ParsedEvents {
    let mut events = ParsedEvents::default();

    let envelope: WebhookEnvelope = match serde_json::from_value(payload.clone()) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Webhook body is not a notification envelope");
            return events;
        }
    };

    if !envelope.is_whatsapp() {
        debug!(object = %envelope.object, "Ignoring non-WhatsApp webhook object");
        return events;
    }

    for entry in &envelope.entry {
        for change in entry.changes.iter() {
            if !change.is_messages() {
                debug!(field = %change.field, entry_id = %entry.id, "Ignoring change");
                continue;
            }

            let value: MessagesValue = match serde_json::from_value(change.value.clone()) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, entry_id = %entry.id, "Undecodable messages change");
                    events.skipped += 1;
                    continue;
                }
            };

            collect_value(&value, &mut events);
        }
    }

    events
}

fn collect_value(value: &MessagesValue, events: &mut ParsedEvents) {
    let phone_number_id = value
        .metadata
        .as_ref()
        .map(|m| m.phone_number_id.clone());

    for message in &value.messages {
        match content_of(message) {
            Some(content) => events.messages.push(InboundMessage {
                phone: message.from.clone(),
                name: sender_name(value, &message.from),
                message_id: message.id.clone(),
                phone_number_id: phone_number_id.clone(),
                timestamp: parse_unix_timestamp(&message.timestamp),
                content,
            }),
            None => {
                warn!(kind = %message.kind, message_id = %message.id, "Unsupported message type");
                events.skipped += 1;
            }
        }
    }

    events
        .statuses
        .extend(value.statuses.iter().map(|status| StatusReceipt {
            message_id: status.id.clone(),
            state: DeliveryState::parse(&status.status),
            recipient_id: status.recipient_id.clone(),
            timestamp: parse_unix_timestamp(&status.timestamp),
        }));
}

/// Profile name of the matching contact, else the first contact, else the phone.
fn sender_name(value: &MessagesValue, from: &str) -> String {
    value
        .contacts
        .iter()
        .find(|c| c.wa_id == from)
        .or_else(|| value.contacts.first())
        .and_then(|c| c.profile.as_ref())
        .map(|p| p.name.trim())
        .filter(|name| !name.is_empty())
        .map_or_else(|| from.to_string(), str::to_string)
}

fn content_of(message: &Message) -> Option<MessageContent> {
    match message.kind.as_str() {
        "text" => message.text.as_ref().map(|t| MessageContent::Text {
            body: t.body.clone(),
        }),
        "image" => message.image.as_ref().map(|m| MessageContent::Image {
            media_id: m.id.clone(),
            mime_type: m.mime_type.clone(),
            caption: m.caption.clone(),
        }),
        "document" => message.document.as_ref().map(|m| MessageContent::Document {
            media_id: m.id.clone(),
            mime_type: m.mime_type.clone(),
            filename: m.filename.clone(),
            caption: m.caption.clone(),
        }),
        "audio" => message.audio.as_ref().map(|m| MessageContent::Audio {
            media_id: m.id.clone(),
            mime_type: m.mime_type.clone(),
        }),
        _ => None,
    }
}
