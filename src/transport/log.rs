//! Dry-run transport: records each message in the log instead of sending it

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::error::TransportError;

use super::types::{Destination, MediaSource, SendOptions, SentMessage};
use super::Transport;

/// Logs every message and hands back synthetic message ids
#[derive(Debug, Default)]
pub struct LogTransport {
    next_id: AtomicI64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_message_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_text(
        &self,
        destination: &Destination,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let message_id = self.next_message_id();
        tracing::info!(
            destination = %destination,
            message_id,
            parse_mode = options.parse_mode.map(|m| m.as_str()),
            keyboard_buttons = options.keyboard.as_ref().map(|k| k.button_count()),
            text,
            "Dry-run text message"
        );
        Ok(SentMessage {
            message_id: Some(message_id),
        })
    }

    async fn send_photo(
        &self,
        destination: &Destination,
        photo: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let message_id = self.next_message_id();
        tracing::info!(
            destination = %destination,
            message_id,
            photo = ?photo,
            keyboard_buttons = options.keyboard.as_ref().map(|k| k.button_count()),
            caption,
            "Dry-run photo message"
        );
        Ok(SentMessage {
            message_id: Some(message_id),
        })
    }

    async fn send_document(
        &self,
        destination: &Destination,
        document: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let message_id = self.next_message_id();
        tracing::info!(
            destination = %destination,
            message_id,
            document = ?document,
            keyboard_buttons = options.keyboard.as_ref().map(|k| k.button_count()),
            caption,
            "Dry-run document message"
        );
        Ok(SentMessage {
            message_id: Some(message_id),
        })
    }
}
