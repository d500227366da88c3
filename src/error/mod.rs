//! Error types shared across the message engine.
//!
//! Errors fall into two classes:
//! - configuration defects (`TemplateError`): missing or malformed templates,
//!   unknown blocks, unresolvable languages. Never retried.
//! - delivery failures (`TransportError`): classified by the transport as
//!   transient (retried by the resilience wrapper) or fatal.
//!
//! Missing placeholders are not errors at all; see
//! [`crate::template::InterpolationGap`].

use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading or resolving templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The backing document for (namespace, template_set) does not exist
    #[error("Template not found: {namespace}/{template_set}")]
    NotFound {
        namespace: String,
        template_set: String,
    },

    /// The backing document exists but is malformed
    #[error("Template parse error in {namespace}/{template_set}: {reason}")]
    Parse {
        namespace: String,
        template_set: String,
        reason: String,
    },

    /// The document has no block with this id
    #[error("Block not found: {block_id} in {namespace}/{template_set}")]
    BlockNotFound {
        namespace: String,
        template_set: String,
        block_id: String,
    },

    /// Neither the requested, block fallback, nor default language has text
    #[error("No text for language '{language}' in block {block_id} (tried: {tried})")]
    LanguageNotResolved {
        block_id: String,
        language: String,
        tried: String,
    },

    /// The backing source failed for a reason other than absence
    #[error("Template source error: {0}")]
    Source(#[from] std::io::Error),
}

impl Clone for TemplateError {
    fn clone(&self) -> Self {
        match self {
            Self::NotFound {
                namespace,
                template_set,
            } => Self::NotFound {
                namespace: namespace.clone(),
                template_set: template_set.clone(),
            },
            Self::Parse {
                namespace,
                template_set,
                reason,
            } => Self::Parse {
                namespace: namespace.clone(),
                template_set: template_set.clone(),
                reason: reason.clone(),
            },
            Self::BlockNotFound {
                namespace,
                template_set,
                block_id,
            } => Self::BlockNotFound {
                namespace: namespace.clone(),
                template_set: template_set.clone(),
                block_id: block_id.clone(),
            },
            Self::LanguageNotResolved {
                block_id,
                language,
                tried,
            } => Self::LanguageNotResolved {
                block_id: block_id.clone(),
                language: language.clone(),
                tried: tried.clone(),
            },
            // io::Error is not Clone; keep its kind and message
            Self::Source(e) => Self::Source(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors reported by a transport collaborator
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Rate limiting or a temporary network failure
    #[error("Transient transport error: {reason}")]
    Transient {
        reason: String,
        /// Server-suggested wait before the next attempt
        retry_after: Option<Duration>,
    },

    /// Invalid destination, permanent rejection, malformed request
    #[error("Fatal transport error: {reason}")]
    Fatal { reason: String },
}

impl TransportError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to callers of the notification API
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request itself is invalid (bad fields, over-long content, nothing to send)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A transient failure persisted through every allowed attempt
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Box<NotifyError>,
    },

    /// The caller cancelled the operation
    #[error("{operation} cancelled")]
    Cancelled { operation: String },
}

/// Result type for notification operations
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Retry classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient { retry_after: Option<Duration> },
    Fatal,
}

impl ErrorClass {
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorClass::Transient { .. })
    }
}

/// Errors that know whether they are worth retrying
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

impl Classify for TemplateError {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}

impl Classify for TransportError {
    fn classify(&self) -> ErrorClass {
        match self {
            TransportError::Transient { retry_after, .. } => ErrorClass::Transient {
                retry_after: *retry_after,
            },
            TransportError::Fatal { .. } => ErrorClass::Fatal,
        }
    }
}

impl Classify for NotifyError {
    fn classify(&self) -> ErrorClass {
        match self {
            NotifyError::Transport(e) => e.classify(),
            _ => ErrorClass::Fatal,
        }
    }
}

impl NotifyError {
    /// Short machine-friendly code used in log records
    pub fn code(&self) -> &'static str {
        match self {
            NotifyError::Validation(_) => "VALIDATION_ERROR",
            NotifyError::Template(TemplateError::NotFound { .. }) => "TEMPLATE_NOT_FOUND",
            NotifyError::Template(TemplateError::Parse { .. }) => "TEMPLATE_PARSE_ERROR",
            NotifyError::Template(TemplateError::BlockNotFound { .. }) => "BLOCK_NOT_FOUND",
            NotifyError::Template(TemplateError::LanguageNotResolved { .. }) => {
                "LANGUAGE_NOT_RESOLVED"
            }
            NotifyError::Template(TemplateError::Source(_)) => "TEMPLATE_SOURCE_ERROR",
            NotifyError::Transport(TransportError::Transient { .. }) => "TRANSPORT_TRANSIENT",
            NotifyError::Transport(TransportError::Fatal { .. }) => "TRANSPORT_FATAL",
            NotifyError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            NotifyError::Cancelled { .. } => "CANCELLED",
        }
    }
}
