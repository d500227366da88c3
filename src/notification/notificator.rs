//! Per-destination entry point and bounded broadcast

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::error::{NotifyError, NotifyResult};
use crate::keyboard::Keyboard;
use crate::resilience::CancellationSignal;
use crate::transport::{DeliveryReceipt, Destination, Media, MediaSource, SendOptions};

use super::renderer::MessageRenderer;
use super::request::{NotifyRequest, Payload};

/// Sends notifications to one destination
#[derive(Clone)]
pub struct Notificator {
    renderer: Arc<MessageRenderer>,
    destination: Destination,
}

impl Notificator {
    pub fn for_destination(
        renderer: Arc<MessageRenderer>,
        destination: impl Into<Destination>,
    ) -> Self {
        Self {
            renderer,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Send plain text or a templated message; a smart message takes
    /// precedence when the request carries both
    pub async fn notify_message(&self, request: NotifyRequest) -> NotifyResult<DeliveryReceipt> {
        send_request(&self.renderer, &self.destination, request, None).await
    }

    pub async fn notify_message_cancellable(
        &self,
        request: NotifyRequest,
        cancel: &CancellationSignal,
    ) -> NotifyResult<DeliveryReceipt> {
        send_request(&self.renderer, &self.destination, request, Some(cancel)).await
    }

    /// Send a document with an explicit caption and optional keyboard
    #[tracing::instrument(skip_all, fields(destination = %self.destination))]
    pub async fn notify_document(
        &self,
        document: MediaSource,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> NotifyResult<DeliveryReceipt> {
        let options = SendOptions {
            keyboard,
            parse_mode: None,
        };
        let media = Media::Document(document);
        self.renderer
            .deliver(
                "notify_document",
                &self.destination,
                caption,
                &options,
                Some(&media),
                None,
            )
            .await
    }
}

async fn send_request(
    renderer: &MessageRenderer,
    destination: &Destination,
    request: NotifyRequest,
    cancel: Option<&CancellationSignal>,
) -> NotifyResult<DeliveryReceipt> {
    match request.into_payload()? {
        Payload::Smart(message) => renderer.send(&message, destination, cancel).await,
        Payload::Text(text) => renderer.send_text(destination, &text, cancel).await,
    }
}

/// Outcome of a broadcast
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<DeliveryReceipt>,
    pub failed: Vec<(Destination, NotifyError)>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send the same request to every destination with at most
/// `max_concurrent_sends` in flight (normally `delivery.max_concurrent_sends`).
/// Failures are collected, not propagated.
#[tracing::instrument(skip_all, fields(destinations = destinations.len()))]
pub async fn broadcast(
    renderer: &MessageRenderer,
    destinations: &[Destination],
    request: &NotifyRequest,
    max_concurrent_sends: usize,
) -> BroadcastReport {
    let limit = max_concurrent_sends.max(1);
    let mut report = BroadcastReport::default();
    let mut futures = FuturesUnordered::new();
    let mut pending = 0;

    for destination in destinations {
        let request = request.clone();
        futures.push(async move {
            let result = send_request(renderer, destination, request, None).await;
            (destination, result)
        });
        pending += 1;

        while pending >= limit {
            match futures.next().await {
                Some((destination, result)) => {
                    pending -= 1;
                    record(&mut report, destination, result);
                }
                None => break,
            }
        }
    }

    while let Some((destination, result)) = futures.next().await {
        record(&mut report, destination, result);
    }

    tracing::info!(
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "Broadcast finished"
    );

    report
}

fn record(
    report: &mut BroadcastReport,
    destination: &Destination,
    result: NotifyResult<DeliveryReceipt>,
) {
    match result {
        Ok(receipt) => report.delivered.push(receipt),
        Err(e) => report.failed.push((destination.clone(), e)),
    }
}
