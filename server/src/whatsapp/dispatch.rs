//! Inbound event processing.
//!
//! Runs detached from the HTTP request: the provider gets its `200` before
//! any of this starts.

use std::sync::Arc;

use serde_json::Value;
use sqlx::PgPool;
use suvfin_common::{InboundMessage, StatusReceipt};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{parse_envelope, GraphApiClient, WhatsAppError};
use crate::api::AppState;
use crate::db::{self, InboundStatus};
use crate::replies::{Attachment, Reply, ReplyGenerator};

/// Characters of message text included in logs.
const LOG_PREVIEW_CHARS: usize = 50;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Already recorded by an earlier delivery.
    Duplicate,
    /// Reply sent.
    Replied,
    /// Generator chose not to answer.
    Ignored,
    /// Generation or sending failed.
    Failed(String),
}

/// Everything the processing pipeline needs, detached from `AppState`.
#[derive(Clone)]
pub struct Dispatcher {
    db: PgPool,
    whatsapp: GraphApiClient,
    replies: Arc<dyn ReplyGenerator>,
    tasks: TaskTracker,
}

impl Dispatcher {
    pub fn new(db: PgPool, whatsapp: GraphApiClient, replies: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            db,
            whatsapp,
            replies,
            tasks: TaskTracker::new(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self {
            tasks: state.tasks.clone(),
            ..Self::new(
                state.db.clone(),
                state.whatsapp.clone(),
                state.replies.clone(),
            )
        }
    }

    /// Tracker owning the tasks started by [`Dispatcher::spawn`].
    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Process one webhook body on a tracked background task.
    ///
    /// Panics inside processing are caught and logged. Shutdown waits on the
    /// tracker so accepted deliveries are not dropped.
    pub fn spawn(self, payload: Value) {
        let tasks = self.tasks.clone();
        tasks.spawn(async move {
            let handle = tokio::spawn(async move {
                self.process_payload(&payload).await;
            });
            if let Err(e) = handle.await {
                error!("Webhook processing task panicked: {}", e);
            }
        });
    }

    /// Parse a body and handle every message and receipt in it.
    pub async fn process_payload(&self, payload: &Value) -> Vec<MessageOutcome> {
        let events = parse_envelope(payload);

        if events.skipped > 0 {
            debug!(skipped = events.skipped, "Skipped unsupported webhook items");
        }
        for receipt in &events.statuses {
            log_receipt(receipt);
        }

        let mut outcomes = Vec::with_capacity(events.messages.len());
        for message in &events.messages {
            outcomes.push(self.process_message(message).await);
        }
        outcomes
    }

    /// Record, acknowledge, answer and log a single message.
    #[tracing::instrument(skip_all, fields(message_id = %message.message_id, kind = message.content.kind()))]
    pub async fn process_message(&self, message: &InboundMessage) -> MessageOutcome {
        info!(
            phone = %message.phone,
            name = %message.name,
            preview = %message.content.preview(LOG_PREVIEW_CHARS),
            "Inbound message"
        );

        let row_id = match db::record_inbound_message(
            &self.db,
            &message.message_id,
            &message.phone,
            message.content.kind(),
        )
        .await
        {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                info!("Duplicate delivery, skipping");
                return MessageOutcome::Duplicate;
            }
            Err(e) => {
                warn!(error = %e, "Failed to record inbound message, continuing");
                None
            }
        };

        if let Err(e) = self.whatsapp.mark_as_read(&message.message_id).await {
            warn!(error = %e, "Failed to mark message as read");
        }

        let outcome = match self.replies.reply(message).await {
            Ok(Some(reply)) => match self.send_reply(&message.phone, &reply).await {
                Ok(()) => MessageOutcome::Replied,
                Err(e) => MessageOutcome::Failed(e.to_string()),
            },
            Ok(None) => MessageOutcome::Ignored,
            Err(e) => {
                error!(error = %e, "Reply generation failed");
                MessageOutcome::Failed(format!("{e:#}"))
            }
        };

        if let Some(id) = row_id {
            self.store_outcome(id, &outcome).await;
        }
        outcome
    }

    async fn send_reply(&self, to: &str, reply: &Reply) -> Result<(), WhatsAppError> {
        self.whatsapp.send_text(to, &reply.text).await?;

        match &reply.attachment {
            Some(Attachment::Image { link, caption }) => {
                self.whatsapp.send_image(to, link, caption).await?;
            }
            Some(Attachment::Document {
                link,
                filename,
                caption,
            }) => {
                self.whatsapp
                    .send_document(to, link, filename, caption)
                    .await?;
            }
            None => {}
        }
        Ok(())
    }

    async fn store_outcome(&self, id: Uuid, outcome: &MessageOutcome) {
        let (status, detail) = match outcome {
            MessageOutcome::Replied => (InboundStatus::Replied, None),
            MessageOutcome::Ignored => (InboundStatus::Ignored, None),
            MessageOutcome::Failed(e) => (InboundStatus::Failed, Some(e.as_str())),
            MessageOutcome::Duplicate => return,
        };
        if let Err(e) = db::update_inbound_status(&self.db, id, status, detail).await {
            warn!(error = %e, status = status.as_str(), "Failed to update inbound status");
        }
    }
}

fn log_receipt(receipt: &StatusReceipt) {
    debug!(
        message_id = %receipt.message_id,
        state = ?receipt.state,
        recipient = %receipt.recipient_id,
        "Status receipt"
    );
}
