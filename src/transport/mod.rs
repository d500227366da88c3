//! Delivery of rendered messages to the chat platform.
//!
//! `Transport` is the seam the renderer sends through. Backends:
//! - `TelegramTransport`: Bot API over HTTPS
//! - `LogTransport`: dry run, logs each message

mod log;
mod telegram;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::TransportError;

pub use log::LogTransport;
pub use telegram::TelegramTransport;
pub use types::{
    DeliveryMode, DeliveryReceipt, Destination, Media, MediaSource, SendOptions, SentMessage,
    MAX_CAPTION_LENGTH, MAX_TEXT_LENGTH,
};

/// Sends one message per call. Implementations classify their own failures
/// as transient or fatal; retrying is the caller's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn send_text(
        &self,
        destination: &Destination,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError>;

    async fn send_photo(
        &self,
        destination: &Destination,
        photo: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError>;

    async fn send_document(
        &self,
        destination: &Destination,
        document: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError>;
}

/// Create the transport named by `delivery.transport`.
///
/// Unknown names, or a Telegram backend that cannot be built, fall back to
/// the dry-run log transport.
pub fn create_transport(settings: &Settings) -> Arc<dyn Transport> {
    match settings.delivery.transport.as_str() {
        "telegram" => match TelegramTransport::new(&settings.telegram) {
            Ok(transport) => {
                tracing::info!(
                    transport = "telegram",
                    api_base_url = %settings.telegram.api_base_url,
                    "Creating Telegram transport"
                );
                Arc::new(transport)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Telegram transport requested but could not be created, falling back to log"
                );
                Arc::new(LogTransport::new())
            }
        },
        "log" => {
            tracing::info!(transport = "log", "Creating dry-run log transport");
            Arc::new(LogTransport::new())
        }
        other => {
            tracing::warn!(
                transport = other,
                "Unknown transport, falling back to log"
            );
            Arc::new(LogTransport::new())
        }
    }
}
