use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;

use ara_smart_messages::config::Settings;
use ara_smart_messages::notification::{create_renderer, Notificator, NotifyRequest, SmartMessage};
use ara_smart_messages::resilience::CancellationSource;
use ara_smart_messages::telemetry::init_tracing;
use ara_smart_messages::template::RenderContext;

const USAGE: &str = "usage:
  ara-smart-messages <destination> <namespace> <template_set> <block_id> [language] [role] [context-json]
  ara-smart-messages --text <destination> <text>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;
    init_tracing(&settings.logging)?;
    tracing::info!(transport = %settings.delivery.transport, "Configuration loaded");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (destination, request) = parse_args(&args)?;

    let renderer = Arc::new(create_renderer(&settings));
    let notificator = Notificator::for_destination(renderer, destination);

    // Ctrl+C abandons the send; no retry after that
    let cancel = CancellationSource::new();
    let cancel_signal = cancel.signal();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, cancelling");
            cancel.cancel();
        }
    });

    let receipt = notificator
        .notify_message_cancellable(request, &cancel_signal)
        .await?;

    tracing::info!(
        destination = %receipt.destination,
        message_id = receipt.message_id,
        attempts = receipt.attempts,
        "Notification sent"
    );
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(String, NotifyRequest)> {
    match args {
        [flag, destination, text] if flag == "--text" => {
            Ok((destination.clone(), NotifyRequest::text(text.clone())))
        }
        [destination, namespace, template_set, block_id, rest @ ..] if rest.len() <= 3 => {
            let mut message =
                SmartMessage::new(namespace.as_str(), template_set.as_str(), block_id.as_str());
            if let Some(language) = rest.first() {
                message = message.with_language(language.as_str());
            }
            if let Some(role) = rest.get(1) {
                message = message.with_role(role.as_str());
            }
            if let Some(raw) = rest.get(2) {
                let value: serde_json::Value =
                    serde_json::from_str(raw).context("context must be valid JSON")?;
                let context = RenderContext::from_value(value)
                    .context("context must be a JSON object")?;
                message = message.with_context(context);
            }
            Ok((destination.clone(), NotifyRequest::smart(message)))
        }
        _ => bail!("{}", USAGE),
    }
}
