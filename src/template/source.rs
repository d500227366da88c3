//! Backing sources for template documents

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{TemplateError, TemplateResult};

/// Where raw template documents come from
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Read the raw document for (namespace, template_set).
    ///
    /// Must return `TemplateError::NotFound` when the document does not exist.
    async fn fetch(&self, namespace: &str, template_set: &str) -> TemplateResult<Vec<u8>>;

    /// Human-readable description for log records
    fn describe(&self) -> String;
}

/// Reads `<root>/<namespace>/<template_set>.json` from the local filesystem
pub struct FsTemplateSource {
    root: PathBuf,
}

impl FsTemplateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, namespace: &str, template_set: &str) -> PathBuf {
        self.root
            .join(namespace)
            .join(format!("{}.json", template_set))
    }
}

#[async_trait]
impl TemplateSource for FsTemplateSource {
    async fn fetch(&self, namespace: &str, template_set: &str) -> TemplateResult<Vec<u8>> {
        let path = self.document_path(namespace, template_set);

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TemplateError::NotFound {
                namespace: namespace.to_string(),
                template_set: template_set.to_string(),
            }),
            Err(e) => Err(TemplateError::Source(e)),
        }
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }
}

/// In-process documents, keyed by (namespace, template_set)
#[derive(Default)]
pub struct MemoryTemplateSource {
    documents: DashMap<(String, String), Vec<u8>>,
    reads: AtomicUsize,
}

impl MemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a raw document
    pub fn insert(&self, namespace: &str, template_set: &str, raw: impl Into<Vec<u8>>) {
        self.documents.insert(
            (namespace.to_string(), template_set.to_string()),
            raw.into(),
        );
    }

    /// Add or replace a document given as JSON
    pub fn insert_json(&self, namespace: &str, template_set: &str, document: &serde_json::Value) {
        self.insert(namespace, template_set, document.to_string());
    }

    pub fn remove(&self, namespace: &str, template_set: &str) -> bool {
        self.documents
            .remove(&(namespace.to_string(), template_set.to_string()))
            .is_some()
    }

    /// Number of fetches served so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TemplateSource for MemoryTemplateSource {
    async fn fetch(&self, namespace: &str, template_set: &str) -> TemplateResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        self.documents
            .get(&(namespace.to_string(), template_set.to_string()))
            .map(|raw| raw.value().clone())
            .ok_or_else(|| TemplateError::NotFound {
                namespace: namespace.to_string(),
                template_set: template_set.to_string(),
            })
    }

    fn describe(&self) -> String {
        format!("memory:{} documents", self.documents.len())
    }
}
