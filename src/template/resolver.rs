//! Role and language resolution of template blocks

use std::sync::Arc;

use crate::error::{TemplateError, TemplateResult};

use super::store::TemplateStore;
use super::types::{ResolutionKey, ResolvedBlock};

/// Finds the most specific block variant for a resolution key.
///
/// Order: role override (if declared for the role) else base block; then
/// requested language, block fallback language, process default language.
/// Lookups never cross into another namespace or template set.
pub struct Resolver {
    store: Arc<TemplateStore>,
    default_language: String,
}

impl Resolver {
    pub fn new(store: Arc<TemplateStore>, default_language: impl Into<String>) -> Self {
        Self {
            store,
            default_language: default_language.into(),
        }
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub async fn resolve(&self, key: &ResolutionKey) -> TemplateResult<ResolvedBlock> {
        let document = self.store.load(&key.namespace, &key.template_set).await?;

        let block = document
            .block(&key.block_id)
            .ok_or_else(|| TemplateError::BlockNotFound {
                namespace: key.namespace.clone(),
                template_set: key.template_set.clone(),
                block_id: key.block_id.clone(),
            })?;

        let variant = block.role_overrides.get(&key.role);

        let (texts, fallback_language, keyboard_spec, parse_mode) = match variant {
            Some(v) => (
                &v.text_by_language,
                v.fallback_language.as_ref().or(block.fallback_language.as_ref()),
                v.keyboard_spec.as_ref().or(block.keyboard_spec.as_ref()),
                v.parse_mode.or(block.parse_mode),
            ),
            None => (
                &block.text_by_language,
                block.fallback_language.as_ref(),
                block.keyboard_spec.as_ref(),
                block.parse_mode,
            ),
        };

        let mut candidates: Vec<&str> = vec![key.language.as_str()];
        for lang in fallback_language
            .map(String::as_str)
            .into_iter()
            .chain(std::iter::once(self.default_language.as_str()))
        {
            if !candidates.contains(&lang) {
                candidates.push(lang);
            }
        }

        let (language, text) = candidates
            .iter()
            .find_map(|lang| texts.get(*lang).map(|text| (lang.to_string(), text.clone())))
            .ok_or_else(|| TemplateError::LanguageNotResolved {
                block_id: key.block_id.clone(),
                language: key.language.clone(),
                tried: candidates.join(", "),
            })?;

        if language != key.language {
            tracing::debug!(
                block_id = %key.block_id,
                requested = %key.language,
                resolved = %language,
                "Language fallback applied"
            );
        }

        Ok(ResolvedBlock {
            block_id: key.block_id.clone(),
            role_override: variant.map(|_| key.role.clone()),
            language,
            text,
            keyboard_spec: keyboard_spec.cloned().unwrap_or_default(),
            layout: block.layout(),
            parse_mode,
        })
    }
}
