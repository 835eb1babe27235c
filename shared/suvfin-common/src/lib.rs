//! SuvFin Common Library
//!
//! Wire types for the WhatsApp Cloud API webhook and the normalised
//! message model shared by the gateway and its collaborators.

pub mod types;

pub use types::*;
