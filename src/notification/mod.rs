//! Rendering and delivery of notifications.
//!
//! This module provides:
//! - `MessageRenderer`: resolve a block, render text and keyboard, pick the
//!   delivery mode and send through the transport under the retry wrapper
//! - `Notificator`: per-destination entry point taking text or a smart message
//! - `broadcast`: the same request to many destinations, bounded concurrency

mod limits;
mod notificator;
mod renderer;
mod request;

use std::sync::Arc;

use crate::config::Settings;
use crate::resilience::{ResilienceWrapper, RetryPolicy};
use crate::template::{FsTemplateSource, Interpolator, Resolver, TemplateStore};
use crate::transport::create_transport;

pub use limits::{fit_to_limit, utf16_len};
pub use notificator::{broadcast, BroadcastReport, Notificator};
pub use renderer::{MessageRenderer, RenderedMessage};
pub use request::{NotifyRequest, Payload, SmartMessage};

/// Build a renderer from settings: filesystem templates under
/// `templates.root` and the transport named by `delivery.transport`
pub fn create_renderer(settings: &Settings) -> MessageRenderer {
    let source = Arc::new(FsTemplateSource::new(settings.templates.root.clone()));
    let store = Arc::new(TemplateStore::new(source));
    let resolver = Resolver::new(store, settings.templates.default_language.clone());

    tracing::info!(
        root = %settings.templates.root.display(),
        default_language = %settings.templates.default_language,
        max_attempts = settings.retry.max_attempts,
        "Creating message renderer"
    );

    MessageRenderer::new(
        resolver,
        Interpolator::from_settings(&settings.templates),
        create_transport(settings),
        ResilienceWrapper::new(RetryPolicy::from(&settings.retry)),
    )
    .with_truncation(settings.delivery.truncate_overlong)
}
