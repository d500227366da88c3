//! Cached template documents with single-flight cold loads

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::{TemplateError, TemplateResult};
use crate::metrics::TemplateMetrics;

use super::source::TemplateSource;
use super::types::Document;

type DocumentKey = (String, String);

/// Loads template documents from a backing source and caches them by
/// (namespace, template_set) until invalidated.
///
/// Concurrent cold loads of the same key share one read; loads of
/// different keys never wait on each other.
pub struct TemplateStore {
    source: Arc<dyn TemplateSource>,
    documents: DashMap<DocumentKey, Arc<Document>>,
    /// One cell per cold load; every caller waiting on it gets the same
    /// outcome, failures included
    in_flight: DashMap<DocumentKey, Arc<OnceCell<TemplateResult<Arc<Document>>>>>,
}

impl TemplateStore {
    /// Create a new template store over the given source
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            documents: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Get the document for (namespace, template_set), reading it on first use
    pub async fn load(
        &self,
        namespace: &str,
        template_set: &str,
    ) -> TemplateResult<Arc<Document>> {
        let key = document_key(namespace, template_set)?;

        if let Some(doc) = self.cached(&key) {
            TemplateMetrics::record_cache_hit();
            return Ok(doc);
        }

        let cell = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async {
                // A load that finished between the cache check and here already published
                match self.cached(&key) {
                    Some(doc) => Ok(doc),
                    None => self.read_document(namespace, template_set).await,
                }
            })
            .await
            .clone();

        if let Ok(doc) = &result {
            // Publish before retiring the in-flight cell so late callers always find one
            self.documents
                .entry(key.clone())
                .or_insert_with(|| doc.clone());
        }
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));

        result
    }

    /// Re-read a document and swap it in; the cached copy survives a failed reload
    pub async fn reload(
        &self,
        namespace: &str,
        template_set: &str,
    ) -> TemplateResult<Arc<Document>> {
        let key = document_key(namespace, template_set)?;

        match self.read_document(namespace, template_set).await {
            Ok(doc) => {
                self.documents.insert(key, doc.clone());
                tracing::info!(namespace, template_set, "Template document reloaded");
                Ok(doc)
            }
            Err(e) => {
                tracing::warn!(
                    namespace,
                    template_set,
                    error = %e,
                    kept_previous = self.documents.contains_key(&key),
                    "Template reload failed"
                );
                Err(e)
            }
        }
    }

    /// Drop a cached document; the next `load` re-reads it
    pub fn invalidate(&self, namespace: &str, template_set: &str) -> bool {
        let key = (namespace.to_string(), template_set.to_string());
        self.in_flight.remove(&key);
        let removed = self.documents.remove(&key).is_some();
        if removed {
            tracing::debug!(namespace, template_set, "Template document invalidated");
        }
        removed
    }

    /// Drop every cached document
    pub fn invalidate_all(&self) {
        self.documents.clear();
        self.in_flight.clear();
    }

    pub fn is_cached(&self, namespace: &str, template_set: &str) -> bool {
        self.documents
            .contains_key(&(namespace.to_string(), template_set.to_string()))
    }

    /// Number of cached documents
    pub fn cached_count(&self) -> usize {
        self.documents.len()
    }

    fn cached(&self, key: &DocumentKey) -> Option<Arc<Document>> {
        self.documents.get(key).map(|doc| doc.value().clone())
    }

    #[tracing::instrument(
        name = "template_store.read",
        skip(self),
        fields(source = %self.source.describe())
    )]
    async fn read_document(
        &self,
        namespace: &str,
        template_set: &str,
    ) -> TemplateResult<Arc<Document>> {
        let raw = match self.source.fetch(namespace, template_set).await {
            Ok(raw) => raw,
            Err(e) => {
                TemplateMetrics::record_load(load_result_label(&e));
                tracing::error!(error = %e, "Template document unavailable");
                return Err(e);
            }
        };

        match Document::parse(namespace, template_set, &raw) {
            Ok(doc) => {
                TemplateMetrics::record_load("ok");
                tracing::debug!(blocks = doc.len(), "Template document loaded");
                Ok(Arc::new(doc))
            }
            Err(e) => {
                TemplateMetrics::record_load(load_result_label(&e));
                tracing::error!(error = %e, "Template document rejected");
                Err(e)
            }
        }
    }
}

fn load_result_label(error: &TemplateError) -> &'static str {
    match error {
        TemplateError::NotFound { .. } => "not_found",
        TemplateError::Parse { .. } => "parse_error",
        _ => "source_error",
    }
}

/// Validate names so a key can never address anything outside its source
fn document_key(namespace: &str, template_set: &str) -> TemplateResult<DocumentKey> {
    if is_valid_name(namespace) && is_valid_name(template_set) {
        Ok((namespace.to_string(), template_set.to_string()))
    } else {
        Err(TemplateError::NotFound {
            namespace: namespace.to_string(),
            template_set: template_set.to_string(),
        })
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
