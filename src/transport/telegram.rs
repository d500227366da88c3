//! Telegram Bot API transport.
//!
//! Uses `sendMessage`, `sendPhoto` and `sendDocument`. Media given by file id
//! or URL is passed inline in a JSON body; local files go up as multipart.
//! Docs: <https://core.telegram.org/bots/api>

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::TelegramSettings;
use crate::error::TransportError;

use super::types::{Destination, MediaSource, SendOptions, SentMessage};
use super::Transport;

/// Telegram transport using the Bot API over HTTPS
pub struct TelegramTransport {
    client: reqwest::Client,
    /// `<api_base_url>/bot<token>`; never logged
    base_url: String,
}

// --- Telegram API types ---

#[derive(Debug, Deserialize)]
struct TgResponse {
    ok: bool,
    result: Option<TgMessage>,
    description: Option<String>,
    parameters: Option<TgResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TgResponseParameters {
    retry_after: Option<u64>,
}

enum RequestBody {
    Json(Value),
    Multipart(Form),
}

impl TelegramTransport {
    /// Create a transport from settings; a bot token is required
    pub fn new(settings: &TelegramSettings) -> Result<Self, TransportError> {
        let token = settings
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TransportError::fatal("telegram bot token is not configured"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| TransportError::fatal(format!("http client init failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                settings.api_base_url.trim_end_matches('/'),
                token
            ),
        })
    }

    async fn call(&self, method: &str, body: RequestBody) -> Result<SentMessage, TransportError> {
        let url = format!("{}/{}", self.base_url, method);
        let request = match body {
            RequestBody::Json(json) => self.client.post(&url).json(&json),
            RequestBody::Multipart(form) => self.client.post(&url).multipart(form),
        };

        let resp = request
            .send()
            .await
            .map_err(|e| classify_request_error(e.without_url()))?;

        let status = resp.status().as_u16();
        let body: Option<TgResponse> = resp.json().await.ok();

        match body {
            Some(TgResponse {
                ok: true,
                result,
                ..
            }) if (200..300).contains(&status) => Ok(SentMessage {
                message_id: result.map(|m| m.message_id),
            }),
            Some(body) => Err(classify_failure(
                status,
                body.description.as_deref(),
                body.parameters.and_then(|p| p.retry_after),
            )),
            None => Err(classify_failure(status, None, None)),
        }
    }

    async fn send_media(
        &self,
        method: &str,
        field: &str,
        destination: &Destination,
        media: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let mut fields = base_fields(destination, options);
        if !caption.is_empty() {
            fields.insert("caption".to_string(), Value::from(caption));
        }

        match media {
            MediaSource::FileId(reference) | MediaSource::Url(reference) => {
                fields.insert(field.to_string(), Value::from(reference.as_str()));
                self.call(method, RequestBody::Json(Value::Object(fields)))
                    .await
            }
            MediaSource::Path(path) => {
                let form = multipart_form(fields, field, path).await?;
                self.call(method, RequestBody::Multipart(form)).await
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(
        &self,
        destination: &Destination,
        text: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        let mut fields = base_fields(destination, options);
        fields.insert("text".to_string(), Value::from(text));
        self.call("sendMessage", RequestBody::Json(Value::Object(fields)))
            .await
    }

    async fn send_photo(
        &self,
        destination: &Destination,
        photo: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        self.send_media("sendPhoto", "photo", destination, photo, caption, options)
            .await
    }

    async fn send_document(
        &self,
        destination: &Destination,
        document: &MediaSource,
        caption: &str,
        options: &SendOptions,
    ) -> Result<SentMessage, TransportError> {
        self.send_media("sendDocument", "document", destination, document, caption, options)
            .await
    }
}

fn base_fields(destination: &Destination, options: &SendOptions) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("chat_id".to_string(), destination.to_json());
    if let Some(mode) = options.parse_mode {
        fields.insert("parse_mode".to_string(), Value::from(mode.as_str()));
    }
    if let Some(keyboard) = &options.keyboard {
        fields.insert("reply_markup".to_string(), keyboard.to_reply_markup());
    }
    fields
}

async fn multipart_form(
    fields: Map<String, Value>,
    file_field: &str,
    path: &Path,
) -> Result<Form, TransportError> {
    // A missing local file will not appear on retry
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        TransportError::fatal(format!("cannot read {}: {}", path.display(), e))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let mut form = Form::new();
    for (name, value) in fields {
        let text = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        form = form.text(name, text);
    }

    Ok(form.part(file_field.to_string(), Part::bytes(bytes).file_name(file_name)))
}

fn classify_request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        TransportError::transient(format!("telegram request failed: {}", error))
    } else {
        TransportError::fatal(format!("telegram request failed: {}", error))
    }
}

/// Map a non-successful Bot API response to a transport error.
///
/// 429 and 5xx are transient (429 carries `retry_after`); every other
/// status is a permanent rejection such as an unknown chat or a blocked bot.
fn classify_failure(
    status: u16,
    description: Option<&str>,
    retry_after: Option<u64>,
) -> TransportError {
    let reason = format!(
        "telegram API error {}: {}",
        status,
        description.unwrap_or("no description")
    );

    match status {
        429 => TransportError::Transient {
            reason,
            retry_after: retry_after.map(Duration::from_secs),
        },
        500..=599 => TransportError::transient(reason),
        _ => TransportError::fatal(reason),
    }
}
