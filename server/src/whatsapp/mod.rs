//! WhatsApp Cloud API integration.
//!
//! Webhook handlers, signature checks, payload parsing, outbound Graph API
//! calls and the processing pipeline that ties them together.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod media;
pub mod parser;
pub mod signature;

pub use client::{GraphApiClient, MediaInfo, SendMessageResponse};
pub use dispatch::{Dispatcher, MessageOutcome};
pub use error::WhatsAppError;
pub use media::{detect_mime, DownloadedMedia};
pub use parser::{parse_envelope, ParsedEvents};
pub use signature::{sign_payload, verify_signature, verify_webhook_signature};
