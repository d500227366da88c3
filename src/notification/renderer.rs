//! Resolve, render and deliver one message

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Classify, NotifyError, NotifyResult, TransportError};
use crate::keyboard::{Keyboard, KeyboardBuilder};
use crate::metrics::DeliveryMetrics;
use crate::resilience::{CancellationSignal, ResilienceWrapper};
use crate::template::{
    InterpolationGap, Interpolator, MissingPlaceholder, ParseMode, RenderContext, ResolutionKey,
    Resolver,
};
use crate::transport::{
    DeliveryMode, DeliveryReceipt, Destination, Media, SendOptions, SentMessage, Transport,
};

use super::limits::fit_to_limit;
use super::request::SmartMessage;

/// A block rendered against a context, ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub parse_mode: Option<ParseMode>,
    /// Language whose text was used
    pub language: String,
    /// Distinct placeholders the context could not satisfy (text and labels)
    pub gaps: Vec<InterpolationGap>,
}

impl RenderedMessage {
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            keyboard: self.keyboard.clone(),
            parse_mode: self.parse_mode,
        }
    }
}

/// Orchestrates resolver, interpolator, keyboard builder and transport.
///
/// Each `send` makes one logical transport call; only the resilience
/// wrapper repeats it.
pub struct MessageRenderer {
    resolver: Resolver,
    interpolator: Interpolator,
    keyboards: KeyboardBuilder,
    transport: Arc<dyn Transport>,
    resilience: ResilienceWrapper,
    truncate_overlong: bool,
}

impl MessageRenderer {
    pub fn new(
        resolver: Resolver,
        interpolator: Interpolator,
        transport: Arc<dyn Transport>,
        resilience: ResilienceWrapper,
    ) -> Self {
        Self {
            keyboards: KeyboardBuilder::new(interpolator.clone()),
            resolver,
            interpolator,
            transport,
            resilience,
            truncate_overlong: true,
        }
    }

    /// Truncate over-long bodies (default) or reject them
    pub fn with_truncation(mut self, truncate_overlong: bool) -> Self {
        self.truncate_overlong = truncate_overlong;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Resolve a block and render its text and keyboard. No side effects
    /// beyond loading the template into the store cache.
    pub async fn render(
        &self,
        key: &ResolutionKey,
        context: &RenderContext,
    ) -> NotifyResult<RenderedMessage> {
        let block = self.resolver.resolve(key).await?;

        let mut text = self.interpolator.interpolate(&block.text, context);
        if text.text.trim().is_empty() && !text.gaps.is_empty() {
            // Missing placeholders alone blanked the body; send them verbatim
            text = Interpolator::new(MissingPlaceholder::Keep).interpolate(&block.text, context);
            tracing::warn!(
                block_id = %key.block_id,
                "Rendered text empty after substitution, keeping placeholders"
            );
        }
        text.report("text");

        let built = self
            .keyboards
            .build_with_gaps(&block.keyboard_spec, &block.layout, context);

        let mut gaps = text.gaps;
        for gap in built.gaps {
            if !gaps.contains(&gap) {
                gaps.push(gap);
            }
        }

        Ok(RenderedMessage {
            text: text.text,
            keyboard: built.keyboard,
            parse_mode: block.parse_mode,
            language: block.language,
            gaps,
        })
    }

    /// Render a templated message and deliver it to `destination`
    #[tracing::instrument(
        skip_all,
        fields(
            destination = %destination,
            namespace = %message.namespace,
            template_set = %message.template_set,
            block_id = %message.block_id,
        )
    )]
    pub async fn send(
        &self,
        message: &SmartMessage,
        destination: &Destination,
        cancel: Option<&CancellationSignal>,
    ) -> NotifyResult<DeliveryReceipt> {
        message.validate()?;
        let key = message.resolution_key(self.resolver.default_language());
        let key = &key;
        let context = &message.context;

        let rendered = self
            .resilience
            .execute_with("render", cancel, NotifyError::classify, move || {
                self.render(key, context)
            })
            .await?;

        let options = rendered.send_options();
        self.deliver(
            "deliver",
            destination,
            &rendered.text,
            &options,
            message.media.as_ref(),
            cancel,
        )
        .await
    }

    /// Deliver plain text, no template involved
    #[tracing::instrument(skip_all, fields(destination = %destination))]
    pub async fn send_text(
        &self,
        destination: &Destination,
        text: &str,
        cancel: Option<&CancellationSignal>,
    ) -> NotifyResult<DeliveryReceipt> {
        self.deliver("deliver", destination, text, &SendOptions::default(), None, cancel)
            .await
    }

    /// Deliver an already rendered body, optionally with media.
    ///
    /// `operation` labels the retry wrapper's log record.
    pub async fn deliver(
        &self,
        operation: &str,
        destination: &Destination,
        text: &str,
        options: &SendOptions,
        media: Option<&Media>,
        cancel: Option<&CancellationSignal>,
    ) -> NotifyResult<DeliveryReceipt> {
        let mode = DeliveryMode::for_media(media);
        if mode == DeliveryMode::Text && text.trim().is_empty() {
            return Err(NotifyError::Validation("message text is empty".to_string()));
        }

        let position = match mode {
            DeliveryMode::Text => "text",
            DeliveryMode::Photo | DeliveryMode::Document => "caption",
        };
        let body = fit_to_limit(text, mode.body_limit(), self.truncate_overlong, position)?;

        let delivery_id = Uuid::new_v4();
        let attempts = AtomicU32::new(0);
        let started = Instant::now();
        let body = body.as_str();
        let attempts_ref = &attempts;

        let result = self
            .resilience
            .execute_with(operation, cancel, NotifyError::classify, move || {
                attempts_ref.fetch_add(1, Ordering::Relaxed);
                async move {
                    self.dispatch(destination, body, options, media)
                        .await
                        .map_err(NotifyError::from)
                }
            })
            .await;

        let attempts = attempts.load(Ordering::Relaxed);
        match result {
            Ok(sent) => {
                DeliveryMetrics::record_delivered(mode.as_str(), started.elapsed());
                tracing::info!(
                    %delivery_id,
                    destination = %destination,
                    mode = mode.as_str(),
                    attempts,
                    message_id = sent.message_id,
                    transport = self.transport.name(),
                    "Message delivered"
                );
                Ok(DeliveryReceipt {
                    delivery_id,
                    message_id: sent.message_id,
                    destination: destination.clone(),
                    mode,
                    attempts,
                    delivered_at: Utc::now(),
                })
            }
            Err(e) => {
                DeliveryMetrics::record_failed(mode.as_str(), started.elapsed());
                tracing::error!(
                    %delivery_id,
                    destination = %destination,
                    mode = mode.as_str(),
                    attempts,
                    code = e.code(),
                    retryable = e.classify().is_transient(),
                    error = %e,
                    "Message delivery failed"
                );
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        destination: &Destination,
        body: &str,
        options: &SendOptions,
        media: Option<&Media>,
    ) -> Result<SentMessage, TransportError> {
        match media {
            None => self.transport.send_text(destination, body, options).await,
            Some(Media::Photo(photo)) => {
                self.transport
                    .send_photo(destination, photo, body, options)
                    .await
            }
            Some(Media::Document(document)) => {
                self.transport
                    .send_document(destination, document, body, options)
                    .await
            }
        }
    }
}
