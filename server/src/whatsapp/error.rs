//! Graph API error types.

use thiserror::Error;

/// Errors from calls to the WhatsApp Cloud API.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// Graph API answered with a non-2xx status.
    #[error("Graph API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Request never produced a response (DNS, TLS, timeout, decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Access token or phone number ID missing.
    #[error("WhatsApp credentials are not configured")]
    NotConfigured,

    /// Media lookup answered without a download URL.
    #[error("Media {0} has no download URL")]
    MissingMediaUrl(String),
}

