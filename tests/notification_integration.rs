//! End-to-end tests: template store through renderer to a recording transport

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use ara_smart_messages::error::{NotifyError, TemplateError, TemplateResult, TransportError};
use ara_smart_messages::keyboard::{Button, ButtonAction, Keyboard};
use ara_smart_messages::notification::{
    broadcast, MessageRenderer, Notificator, NotifyRequest, SmartMessage,
};
use ara_smart_messages::resilience::{
    BackoffConfig, CancellationSource, ResilienceWrapper, RetryPolicy,
};
use ara_smart_messages::template::{
    FsTemplateSource, Interpolator, MemoryTemplateSource, MissingPlaceholder, RenderContext,
    ResolutionKey, Resolver, TemplateSource, TemplateStore,
};
use ara_smart_messages::transport::{
    DeliveryMode, Destination, Media, MediaSource, SendOptions, SentMessage, Transport,
};

#[derive(Debug, Clone, PartialEq)]
enum CallKind {
    Text,
    Photo(MediaSource),
    Document(MediaSource),
}

#[derive(Debug, Clone)]
struct Call {
    kind: CallKind,
    destination: Destination,
    body: String,
    keyboard: Option<Keyboard>,
}

/// Records every call; can fail transiently a number of times, or
/// fatally for one destination
#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    transient_failures: AtomicUsize,
    reject: Option<Destination>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    fn failing_transiently(times: usize) -> Self {
        Self {
            transient_failures: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn record(
        &self,
        kind: CallKind,
        destination: &Destination,
        body: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let id = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                kind,
                destination: destination.clone(),
                body: body.to_string(),
                keyboard: options.keyboard.clone(),
            });
            calls.len() as i64
        };

        if self.reject.as_ref() == Some(destination) {
            return Err(TransportError::fatal("Bad Request: chat not found"));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::transient("Too Many Requests"));
        }

        Ok(SentMessage {
            message_id: Some(id),
        })
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(
        &self,
        destination: &Destination,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        self.record(CallKind::Text, destination, text, options).await
    }

    async fn send_photo(
        &self,
        destination: &Destination,
        photo: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        self.record(CallKind::Photo(photo.clone()), destination, caption, options)
            .await
    }

    async fn send_document(
        &self,
        destination: &Destination,
        document: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        self.record(CallKind::Document(document.clone()), destination, caption, options)
            .await
    }
}

fn fast_retry(max_attempts: u32) -> ResilienceWrapper {
    ResilienceWrapper::new(RetryPolicy {
        max_attempts,
        backoff: BackoffConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            jitter_factor: 0.0,
        },
    })
}

fn shop_source() -> Arc<MemoryTemplateSource> {
    let source = Arc::new(MemoryTemplateSource::new());
    source.insert_json(
        "shop",
        "orders",
        &json!({
            "order_complete": {
                "text_by_language": {
                    "en": "Order {order_id} confirmed, total {total}",
                    "it": "Ordine {order_id} confermato, totale {total}"
                },
                "fallback_language": "en"
            },
            "order_items": {
                "text_by_language": { "en": "Items in order {order_id}" },
                "keyboard_spec": [
                    { "for_each": "items", "as": "item", "buttons": [
                        { "text": "{item.name} x{item.qty}", "callback_template": "item:{item.id}" }
                    ]},
                    [{ "text": "Close", "callback_data": "close" }]
                ]
            },
            "long_caption": {
                "text_by_language": { "en": "{body}" }
            }
        }),
    );
    source
}

fn renderer_with(
    source: Arc<dyn TemplateSource>,
    transport: Arc<RecordingTransport>,
    max_attempts: u32,
) -> MessageRenderer {
    renderer_with_interpolator(source, transport, max_attempts, Interpolator::default())
}

fn renderer_with_interpolator(
    source: Arc<dyn TemplateSource>,
    transport: Arc<RecordingTransport>,
    max_attempts: u32,
    interpolator: Interpolator,
) -> MessageRenderer {
    let store = Arc::new(TemplateStore::new(source));
    MessageRenderer::new(
        Resolver::new(store, "en"),
        interpolator,
        transport,
        fast_retry(max_attempts),
    )
}

/// Counts placeholder gap warnings emitted on the current thread
struct GapWarnings(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for GapWarnings {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() == tracing::Level::WARN && meta.fields().field("placeholder").is_some() {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn order_message() -> SmartMessage {
    SmartMessage::new("shop", "orders", "order_complete").with_language("en")
}

#[tokio::test]
async fn test_order_confirmation_is_rendered_and_sent() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3);

    let message = order_message().with_context(
        RenderContext::new()
            .with("order_id", "12345")
            .with("total", 99.99),
    );
    let receipt = renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap();

    assert_eq!(receipt.mode, DeliveryMode::Text);
    assert_eq!(receipt.attempts, 1);
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::Text);
    assert_eq!(calls[0].body, "Order 12345 confirmed, total 99.99");
    assert!(calls[0].keyboard.is_none());
}

#[tokio::test]
async fn test_missing_placeholder_still_delivers() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3);
    let context = RenderContext::new().with("order_id", "12345");
    let warnings = Arc::new(AtomicUsize::new(0));
    let _guard = tracing::subscriber::set_default(
        tracing_subscriber::registry().with(GapWarnings(warnings.clone())),
    );

    let rendered = renderer
        .render(&order_message().resolution_key("en"), &context)
        .await
        .unwrap();
    assert_eq!(rendered.gaps.len(), 1);
    assert_eq!(rendered.gaps[0].placeholder, "total");
    assert_eq!(warnings.load(Ordering::SeqCst), 1);

    let receipt = renderer
        .send(&order_message().with_context(context), &Destination::from(42), None)
        .await;
    assert!(receipt.is_ok());
    assert_eq!(transport.calls()[0].body, "Order 12345 confirmed, total {total}");
    assert_eq!(warnings.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_blank_body_keeps_placeholders_under_empty_policy() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with_interpolator(
        shop_source(),
        transport.clone(),
        3,
        Interpolator::new(MissingPlaceholder::Empty),
    );

    let message = SmartMessage::new("shop", "orders", "long_caption");
    let receipt = renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap();

    assert_eq!(receipt.mode, DeliveryMode::Text);
    assert_eq!(transport.calls()[0].body, "{body}");

    // A partly filled body still follows the policy
    let rendered = renderer
        .render(
            &order_message().resolution_key("en"),
            &RenderContext::new().with("order_id", "7"),
        )
        .await
        .unwrap();
    assert_eq!(rendered.text, "Order 7 confirmed, total ");
}

#[tokio::test]
async fn test_generated_keyboard_rows() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3);

    let context = RenderContext::from_value(json!({
        "order_id": "A7",
        "items": [
            { "id": 11, "name": "Tea", "qty": 2 },
            { "id": 12, "name": "Cake", "qty": 1 },
            { "id": 13, "name": "Jam", "qty": 4 }
        ]
    }))
    .unwrap();
    let message = SmartMessage::new("shop", "orders", "order_items").with_context(context);

    renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap();

    let keyboard = transport.calls()[0].keyboard.clone().unwrap();
    assert_eq!(keyboard.rows.len(), 2);
    let labels: Vec<&str> = keyboard.rows[0].iter().map(|b| b.text.as_str()).collect();
    assert_eq!(labels, vec!["Tea x2", "Cake x1", "Jam x4"]);
    assert_eq!(
        keyboard.rows[0][2].action,
        Some(ButtonAction::Callback("item:13".to_string()))
    );
    assert_eq!(keyboard.rows[1][0].text, "Close");
}

#[tokio::test]
async fn test_generator_without_list_degrades_to_fewer_rows() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3);
    let message = SmartMessage::new("shop", "orders", "order_items")
        .with_context(RenderContext::new().with("order_id", "A7"));

    renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap();

    let keyboard = transport.calls()[0].keyboard.clone().unwrap();
    assert_eq!(keyboard.rows.len(), 1);
    assert_eq!(keyboard.rows[0][0].text, "Close");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let transport = Arc::new(RecordingTransport::failing_transiently(2));
    let renderer = renderer_with(shop_source(), transport.clone(), 3);

    let receipt = renderer
        .send(&order_message(), &Destination::from(42), None)
        .await
        .unwrap();

    assert_eq!(receipt.attempts, 3);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let transport = Arc::new(RecordingTransport::failing_transiently(10));
    let renderer = renderer_with(shop_source(), transport.clone(), 3);

    let err = renderer
        .send(&order_message(), &Destination::from(42), None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_fatal_transport_error_not_retried() {
    let transport = Arc::new(RecordingTransport {
        reject: Some(Destination::from(13)),
        ..RecordingTransport::default()
    });
    let renderer = renderer_with(shop_source(), transport.clone(), 5);

    let err = renderer
        .send(&order_message(), &Destination::from(13), None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Transport(TransportError::Fatal { .. })));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_missing_template_file_fails_without_transport_call() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(
        Arc::new(FsTemplateSource::new(dir.path())),
        transport.clone(),
        3,
    );

    let err = renderer
        .send(&order_message(), &Destination::from(42), None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Template(TemplateError::NotFound { .. })));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_fs_templates_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("shop")).unwrap();
    std::fs::write(
        dir.path().join("shop").join("orders.json"),
        r#"{ "order_complete": { "text_by_language": { "en": "Order {order_id} confirmed" } } }"#,
    )
    .unwrap();

    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(
        Arc::new(FsTemplateSource::new(dir.path())),
        transport.clone(),
        3,
    );

    let message = order_message()
        .with_language("fr")
        .with_context(RenderContext::new().with("order_id", 7));
    renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap();

    assert_eq!(transport.calls()[0].body, "Order 7 confirmed");
}

#[tokio::test]
async fn test_photo_caption_and_truncation() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3);
    let photo = MediaSource::Url("https://example.com/receipt.png".to_string());

    let message = SmartMessage::new("shop", "orders", "long_caption")
        .with_context(RenderContext::new().with("body", "x".repeat(2000)))
        .with_media(Media::Photo(photo.clone()));
    let receipt = renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap();

    assert_eq!(receipt.mode, DeliveryMode::Photo);
    let call = &transport.calls()[0];
    assert_eq!(call.kind, CallKind::Photo(photo));
    assert_eq!(call.body.encode_utf16().count(), 1024);
    assert!(call.body.ends_with('…'));
}

#[tokio::test]
async fn test_overlong_rejected_without_truncation() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3).with_truncation(false);

    let message = SmartMessage::new("shop", "orders", "long_caption")
        .with_context(RenderContext::new().with("body", "x".repeat(5000)));
    let err = renderer
        .send(&message, &Destination::from(42), None)
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Validation(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_cancelled_send_has_no_side_effect() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport.clone(), 3);
    let source = CancellationSource::new();
    source.cancel();

    let err = renderer
        .send(&order_message(), &Destination::from(42), Some(&source.signal()))
        .await
        .unwrap_err();

    assert!(matches!(err, NotifyError::Cancelled { .. }));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_notificator_precedence_and_validation() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = Arc::new(renderer_with(shop_source(), transport.clone(), 3));
    let notificator = Notificator::for_destination(renderer, Destination::from(42));

    let request = NotifyRequest {
        text: Some("plain text".to_string()),
        smart: Some(order_message().with_context(
            RenderContext::new().with("order_id", "1").with("total", 5),
        )),
    };
    notificator.notify_message(request).await.unwrap();
    assert_eq!(transport.calls()[0].body, "Order 1 confirmed, total 5");

    notificator
        .notify_message(NotifyRequest::text("plain text"))
        .await
        .unwrap();
    assert_eq!(transport.calls()[1].body, "plain text");

    let err = notificator
        .notify_message(NotifyRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Validation(_)));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_notify_document_with_keyboard() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = Arc::new(renderer_with(shop_source(), transport.clone(), 3));
    let notificator = Notificator::for_destination(renderer, "@reports");

    let keyboard = Keyboard::inline(vec![vec![Button {
        text: "Open".to_string(),
        action: Some(ButtonAction::Url("https://example.com".to_string())),
    }]]);
    let document = MediaSource::FileId("BQACAgIAAx".to_string());

    let receipt = notificator
        .notify_document(document.clone(), "Monthly report", Some(keyboard.clone()))
        .await
        .unwrap();

    assert_eq!(receipt.mode, DeliveryMode::Document);
    let call = &transport.calls()[0];
    assert_eq!(call.kind, CallKind::Document(document));
    assert_eq!(call.destination, Destination::from("@reports"));
    assert_eq!(call.body, "Monthly report");
    assert_eq!(call.keyboard, Some(keyboard));
}

#[tokio::test]
async fn test_broadcast_collects_failures_and_bounds_concurrency() {
    let transport = Arc::new(RecordingTransport {
        reject: Some(Destination::from(3)),
        delay: Some(Duration::from_millis(20)),
        ..RecordingTransport::default()
    });
    let renderer = renderer_with(shop_source(), transport.clone(), 3);
    let destinations: Vec<Destination> = (1..=6i64).map(Destination::from).collect();
    let request = NotifyRequest::smart(
        order_message().with_context(RenderContext::new().with("order_id", "9").with("total", 1)),
    );

    let report = broadcast(&renderer, &destinations, &request, 2).await;

    assert_eq!(report.total(), 6);
    assert_eq!(report.delivered.len(), 5);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, Destination::from(3));
    assert!(transport.max_in_flight.load(Ordering::SeqCst) <= 2);
}

/// Source that sleeps on every read, to widen the cold-load window
struct SlowSource {
    inner: MemoryTemplateSource,
}

#[async_trait]
impl TemplateSource for SlowSource {
    async fn fetch(&self, namespace: &str, template_set: &str) -> TemplateResult<Vec<u8>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.fetch(namespace, template_set).await
    }

    fn describe(&self) -> String {
        "slow".to_string()
    }
}

#[tokio::test]
async fn test_concurrent_cold_loads_read_once() {
    let inner = MemoryTemplateSource::new();
    inner.insert_json(
        "shop",
        "orders",
        &json!({ "order_complete": { "text_by_language": { "en": "Order {order_id}" } } }),
    );
    let source = Arc::new(SlowSource { inner });
    let store = Arc::new(TemplateStore::new(source.clone()));
    let resolver = Arc::new(Resolver::new(store.clone(), "en"));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let resolver = resolver.clone();
        handles.push(tokio::spawn(async move {
            let key = ResolutionKey::new("user", "shop", "orders", "order_complete", "en");
            resolver.resolve(&key).await.map(|block| block.text)
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "Order {order_id}");
    }

    assert_eq!(source.inner.reads(), 1);
    assert_eq!(store.cached_count(), 1);
}

#[tokio::test]
async fn test_concurrent_cold_loads_share_failure() {
    let source = Arc::new(SlowSource {
        inner: MemoryTemplateSource::new(),
    });
    let store = Arc::new(TemplateStore::new(source.clone()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.load("shop", "missing").await }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { .. }));
    }

    assert_eq!(source.inner.reads(), 1);
    assert!(!store.is_cached("shop", "missing"));

    // The failure is not cached; the next cold load reads again
    assert!(store.load("shop", "missing").await.is_err());
    assert_eq!(source.inner.reads(), 2);
}

#[tokio::test]
async fn test_render_is_idempotent() {
    let transport = Arc::new(RecordingTransport::default());
    let renderer = renderer_with(shop_source(), transport, 3);
    let key = order_message().with_language("it").resolution_key("en");
    let context = RenderContext::new().with("order_id", "5").with("total", 10.5);

    let first = renderer.render(&key, &context).await.unwrap();
    let second = renderer.render(&key, &context).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.text, "Ordine 5 confermato, totale 10.5");
    assert_eq!(first.language, "it");
}
