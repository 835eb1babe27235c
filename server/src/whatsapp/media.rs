//! Two-step media download with content sniffing.

use bytes::Bytes;
use tracing::info;

use super::client::{check_status, MEDIA_TIMEOUT};
use super::{GraphApiClient, WhatsAppError};

/// Fallback when neither the bytes nor the provider name a type.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Media bytes plus their best-known MIME type.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Pick a MIME type: magic bytes first, then the declared type.
#[must_use]
pub fn detect_mime(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    declared
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

impl GraphApiClient {
    /// Resolve `media_id` and fetch the file with the same bearer token.
    #[tracing::instrument(skip(self))]
    pub async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, WhatsAppError> {
        let info = self.media_info(media_id).await?;

        let response = self
            .http
            .get(&info.url)
            .bearer_auth(self.access_token())
            .timeout(MEDIA_TIMEOUT)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        let mime_type = detect_mime(&bytes, info.mime_type.as_deref());

        info!(media_id, size = bytes.len(), mime = %mime_type, "Media downloaded");
        Ok(DownloadedMedia { bytes, mime_type })
    }
}
