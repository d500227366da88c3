//! Localized message templates.
//!
//! This module provides:
//! - Template documents loaded per (namespace, template_set) from a backing source
//! - A caching store with single-flight cold loads, invalidation and reload
//! - Role and language resolution of blocks
//! - Placeholder interpolation (`{variable}`, `{nested.path}`)
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(TemplateStore::new(Arc::new(FsTemplateSource::new("templates"))));
//! let resolver = Resolver::new(store, "en");
//!
//! let key = ResolutionKey::new("user", "shop", "orders", "order_complete", "en");
//! let block = resolver.resolve(&key).await?;
//!
//! let context = RenderContext::new().with("order_id", "12345").with("total", 99.99);
//! let text = Interpolator::default().render_text(&block.text, &context);
//! ```

mod context;
mod interpolation;
mod resolver;
mod source;
mod store;
mod types;

pub use context::{ContextLookup, RenderContext};
pub(crate) use context::{split_head, walk};
pub use interpolation::{
    report_gaps, stringify, Interpolated, InterpolationGap, Interpolator, MissingPlaceholder,
};
pub use resolver::Resolver;
pub use source::{FsTemplateSource, MemoryTemplateSource, TemplateSource};
pub use store::TemplateStore;
pub use types::{Block, BlockVariant, Document, ParseMode, ResolutionKey, ResolvedBlock};
