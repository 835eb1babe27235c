//! Reply generation seam.
//!
//! The gateway hands every new inbound message to a [`ReplyGenerator`] and
//! sends back whatever it returns. The business logic behind it (LLM agent,
//! finance tools, ...) lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use suvfin_common::InboundMessage;

/// Outbound reply for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Text sent first.
    pub text: String,
    /// Optional media sent after the text.
    pub attachment: Option<Attachment>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Media attached to a reply, referenced by public URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    Image {
        link: String,
        caption: String,
    },
    Document {
        link: String,
        filename: String,
        caption: String,
    },
}

/// Produces replies for inbound messages.
///
/// `Ok(None)` means the message is deliberately left unanswered.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, message: &InboundMessage) -> anyhow::Result<Option<Reply>>;
}

/// Generator that never answers. Used until a real one is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReplies;

#[async_trait]
impl ReplyGenerator for SilentReplies {
    async fn reply(&self, _message: &InboundMessage) -> anyhow::Result<Option<Reply>> {
        Ok(None)
    }
}
