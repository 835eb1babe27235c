//! SuvFin Server
//!
//! WhatsApp Cloud API webhook gateway: answers the subscription handshake,
//! verifies and acknowledges event deliveries, and turns inbound messages
//! into replies through a pluggable generator.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod observability;
pub mod ratelimit;
pub mod replies;
pub mod whatsapp;
