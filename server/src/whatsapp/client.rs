//! WhatsApp Cloud API client.
//!
//! Thin wrapper over the Graph API `messages` and media endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::WhatsAppError;
use crate::config::Config;

/// Default timeout for message sends.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for read receipts.
pub const READ_RECEIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for each media request.
pub const MEDIA_TIMEOUT: Duration = Duration::from_secs(60);

/// Response of `POST /<phone_number_id>/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub contacts: Vec<SentContact>,
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

impl SendMessageResponse {
    /// ID of the first accepted message.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentContact {
    pub input: String,
    pub wa_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

/// Response of `GET /<media_id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Client for one business phone number.
#[derive(Clone)]
pub struct GraphApiClient {
    pub(super) http: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl std::fmt::Debug for GraphApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphApiClient")
            .field("base_url", &self.base_url)
            .field("phone_number_id", &self.phone_number_id)
            .finish_non_exhaustive()
    }
}

impl GraphApiClient {
    /// Create a client for `<base_url>/<phone_number_id>/messages`.
    ///
    /// `base_url` already includes the API version.
    pub fn new(
        base_url: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, WhatsAppError> {
        let http = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        })
    }

    /// Build from server configuration.
    pub fn from_config(config: &Config) -> Result<Self, WhatsAppError> {
        Self::new(
            config.whatsapp_base_url(),
            &config.whatsapp_phone_number_id,
            &config.whatsapp_access_token,
        )
    }

    /// Whether both the token and the sender phone number are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty() && !self.phone_number_id.is_empty()
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Send a text message.
    #[tracing::instrument(skip(self, body))]
    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendMessageResponse, WhatsAppError> {
        self.send_message(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "preview_url": false, "body": body },
        }))
        .await
    }

    /// Send an image by public URL.
    #[tracing::instrument(skip(self, caption))]
    pub async fn send_image(
        &self,
        to: &str,
        link: &str,
        caption: &str,
    ) -> Result<SendMessageResponse, WhatsAppError> {
        self.send_message(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "image",
            "image": { "link": link, "caption": caption },
        }))
        .await
    }

    /// Send a document (PDF, spreadsheet, ...) by public URL.
    #[tracing::instrument(skip(self, caption))]
    pub async fn send_document(
        &self,
        to: &str,
        link: &str,
        filename: &str,
        caption: &str,
    ) -> Result<SendMessageResponse, WhatsAppError> {
        self.send_message(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "document",
            "document": { "link": link, "caption": caption, "filename": filename },
        }))
        .await
    }

    /// Mark an inbound message as read (blue ticks).
    #[tracing::instrument(skip(self))]
    pub async fn mark_as_read(&self, message_id: &str) -> Result<(), WhatsAppError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
        });
        self.post_messages(&payload, READ_RECEIPT_TIMEOUT).await?;
        Ok(())
    }

    /// Resolve a media ID to its short-lived download URL.
    #[tracing::instrument(skip(self))]
    pub async fn media_info(&self, media_id: &str) -> Result<MediaInfo, WhatsAppError> {
        if self.access_token.is_empty() {
            return Err(WhatsAppError::NotConfigured);
        }

        let response = self
            .http
            .get(self.url(media_id))
            .bearer_auth(&self.access_token)
            .timeout(MEDIA_TIMEOUT)
            .send()
            .await?;
        let info: MediaInfo = check_status(response).await?.json().await?;

        if info.url.is_empty() {
            return Err(WhatsAppError::MissingMediaUrl(media_id.to_string()));
        }
        debug!(media_id, size = info.file_size, "Media URL resolved");
        Ok(info)
    }

    /// Download URL for a media ID.
    pub async fn media_url(&self, media_id: &str) -> Result<String, WhatsAppError> {
        Ok(self.media_info(media_id).await?.url)
    }

    async fn send_message(&self, payload: Value) -> Result<SendMessageResponse, WhatsAppError> {
        let to = payload["to"].as_str().unwrap_or_default().to_string();
        let kind = payload["type"].as_str().unwrap_or_default().to_string();

        match self.post_messages(&payload, SEND_TIMEOUT).await {
            Ok(value) => {
                let sent: SendMessageResponse = serde_json::from_value(value).unwrap_or_default();
                info!(to = %to, kind = %kind, message_id = sent.message_id(), "Message sent");
                Ok(sent)
            }
            Err(e) => {
                error!(to = %to, kind = %kind, error = %e, "Failed to send message");
                Err(e)
            }
        }
    }

    async fn post_messages(&self, payload: &Value, timeout: Duration) -> Result<Value, WhatsAppError> {
        if !self.is_configured() {
            return Err(WhatsAppError::NotConfigured);
        }

        let response = self
            .http
            .post(self.url(&format!("{}/messages", self.phone_number_id)))
            .bearer_auth(&self.access_token)
            .timeout(timeout)
            .json(payload)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into `WhatsAppError::Api` with the body text.
pub(super) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, WhatsAppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WhatsAppError::Api {
        status: status.as_u16(),
        body,
    })
}
