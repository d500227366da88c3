//! Caller-facing request types

use serde::Deserialize;
use serde_json::Value;

use crate::error::{NotifyError, NotifyResult};
use crate::template::{RenderContext, ResolutionKey};
use crate::transport::Media;

fn default_role() -> String {
    "user".to_string()
}

/// A templated message: which block to render, for whom, with what data.
///
/// Unknown fields are rejected. `menu_file`, `block_key` and `lang` are
/// accepted as aliases of `template_set`, `block_id` and `language`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmartMessage {
    #[serde(default = "default_role")]
    pub role: String,
    pub namespace: String,
    #[serde(alias = "menu_file")]
    pub template_set: String,
    #[serde(alias = "block_key")]
    pub block_id: String,
    /// Requested language; the process default applies when absent
    #[serde(default, alias = "lang")]
    pub language: Option<String>,
    #[serde(default)]
    pub context: RenderContext,
    #[serde(default)]
    pub media: Option<Media>,
}

impl SmartMessage {
    pub fn new(
        namespace: impl Into<String>,
        template_set: impl Into<String>,
        block_id: impl Into<String>,
    ) -> Self {
        Self {
            role: default_role(),
            namespace: namespace.into(),
            template_set: template_set.into(),
            block_id: block_id.into(),
            language: None,
            context: RenderContext::new(),
            media: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_context(mut self, context: RenderContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Parse and validate an untyped payload
    pub fn from_value(value: Value) -> NotifyResult<Self> {
        let message: Self = serde_json::from_value(value)
            .map_err(|e| NotifyError::Validation(format!("invalid smart message: {}", e)))?;
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> NotifyResult<()> {
        let required = [
            ("role", &self.role),
            ("namespace", &self.namespace),
            ("template_set", &self.template_set),
            ("block_id", &self.block_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(NotifyError::Validation(format!("{} must not be empty", field)));
            }
        }
        if matches!(&self.language, Some(lang) if lang.trim().is_empty()) {
            return Err(NotifyError::Validation("language must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn resolution_key(&self, default_language: &str) -> ResolutionKey {
        ResolutionKey::new(
            self.role.as_str(),
            self.namespace.as_str(),
            self.template_set.as_str(),
            self.block_id.as_str(),
            self.language.as_deref().unwrap_or(default_language),
        )
    }
}

/// Input to `notify_message`: plain text, a templated message, or both.
///
/// When both are given the templated message wins and the text is ignored.
/// A request with neither is a validation error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, alias = "smart_data")]
    pub smart: Option<SmartMessage>,
}

/// What a `NotifyRequest` resolves to after precedence is applied
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Smart(SmartMessage),
}

impl NotifyRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            smart: None,
        }
    }

    pub fn smart(message: SmartMessage) -> Self {
        Self {
            text: None,
            smart: Some(message),
        }
    }

    /// Apply precedence and validate the chosen payload
    pub fn into_payload(self) -> NotifyResult<Payload> {
        match (self.smart, self.text) {
            (Some(smart), text) => {
                if text.is_some() {
                    tracing::debug!(
                        block_id = %smart.block_id,
                        "Request carries both text and smart message, text ignored"
                    );
                }
                smart.validate()?;
                Ok(Payload::Smart(smart))
            }
            (None, Some(text)) if !text.trim().is_empty() => Ok(Payload::Text(text)),
            (None, Some(_)) => Err(NotifyError::Validation("text must not be empty".to_string())),
            (None, None) => Err(NotifyError::Validation(
                "request needs either text or a smart message".to_string(),
            )),
        }
    }
}
