//! Template document types and parsing

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{TemplateError, TemplateResult};
use crate::keyboard::{ButtonSpec, KeyboardKind, KeyboardLayout, RowSpec};

/// Telegram text formatting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
    Markdown,
    MarkdownV2,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Html => "HTML",
            ParseMode::Markdown => "Markdown",
            ParseMode::MarkdownV2 => "MarkdownV2",
        }
    }
}

/// The atomic renderable unit of a template set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    /// Raw template text per language code
    pub text_by_language: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_spec: Option<Vec<RowSpec>>,

    #[serde(default)]
    pub keyboard_kind: KeyboardKind,

    #[serde(default)]
    pub resize_keyboard: bool,

    #[serde(default)]
    pub one_time_keyboard: bool,

    /// Per-role variants, checked before the base block
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_overrides: BTreeMap<String, BlockVariant>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

/// A role-specific variant of a block.
///
/// Fields left out inherit the base block's value; an empty
/// `keyboard_spec` removes the keyboard for that role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockVariant {
    pub text_by_language: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_spec: Option<Vec<RowSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

impl Block {
    pub fn layout(&self) -> KeyboardLayout {
        KeyboardLayout {
            kind: self.keyboard_kind,
            resize_keyboard: self.resize_keyboard,
            one_time_keyboard: self.one_time_keyboard,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.text_by_language.is_empty() {
            return Err("text_by_language must not be empty".to_string());
        }
        validate_rows(self.keyboard_spec.as_deref(), self.keyboard_kind)?;

        for (role, variant) in &self.role_overrides {
            if variant.text_by_language.is_empty() {
                return Err(format!(
                    "role override '{}': text_by_language must not be empty",
                    role
                ));
            }
            validate_rows(variant.keyboard_spec.as_deref(), self.keyboard_kind)
                .map_err(|e| format!("role override '{}': {}", role, e))?;
        }

        Ok(())
    }
}

fn validate_rows(rows: Option<&[RowSpec]>, kind: KeyboardKind) -> Result<(), String> {
    for (index, row) in rows.unwrap_or_default().iter().enumerate() {
        let buttons = match row {
            RowSpec::Fixed(buttons) => buttons,
            RowSpec::Generated(gen) => {
                if gen.for_each.is_empty() {
                    return Err(format!("row {}: for_each must not be empty", index));
                }
                if gen.alias.is_empty() || gen.alias.contains('.') {
                    return Err(format!("row {}: invalid alias '{}'", index, gen.alias));
                }
                &gen.buttons
            }
        };

        for button in buttons {
            validate_button(button, kind).map_err(|e| format!("row {}: {}", index, e))?;
        }
    }

    Ok(())
}

fn validate_button(button: &ButtonSpec, kind: KeyboardKind) -> Result<(), String> {
    let actions = button.actions().len();
    match kind {
        KeyboardKind::Inline if actions != 1 => Err(format!(
            "inline button '{}' needs exactly one of callback_data, callback_template, url",
            button.text
        )),
        KeyboardKind::Reply if actions != 0 => Err(format!(
            "reply button '{}' cannot carry an action",
            button.text
        )),
        _ => Ok(()),
    }
}

/// All blocks of one (namespace, template_set), immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub namespace: String,
    pub template_set: String,
    blocks: BTreeMap<String, Block>,
}

impl Document {
    /// Parse and validate a JSON document
    pub fn parse(namespace: &str, template_set: &str, raw: &[u8]) -> TemplateResult<Self> {
        let parse_error = |reason: String| TemplateError::Parse {
            namespace: namespace.to_string(),
            template_set: template_set.to_string(),
            reason,
        };

        let UniqueBlocks(blocks) =
            serde_json::from_slice(raw).map_err(|e| parse_error(e.to_string()))?;

        for (block_id, block) in &blocks {
            block
                .validate()
                .map_err(|e| parse_error(format!("block '{}': {}", block_id, e)))?;
        }

        Ok(Self {
            namespace: namespace.to_string(),
            template_set: template_set.to_string(),
            blocks,
        })
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.get(block_id)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Block map that rejects duplicate block ids instead of keeping the last one
struct UniqueBlocks(BTreeMap<String, Block>);

impl<'de> Deserialize<'de> for UniqueBlocks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BlocksVisitor;

        impl<'de> Visitor<'de> for BlocksVisitor {
            type Value = UniqueBlocks;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of block id to block")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut blocks = BTreeMap::new();
                while let Some((id, block)) = access.next_entry::<String, Block>()? {
                    if blocks.contains_key(&id) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate block id '{}'",
                            id
                        )));
                    }
                    blocks.insert(id, block);
                }
                Ok(UniqueBlocks(blocks))
            }
        }

        deserializer.deserialize_map(BlocksVisitor)
    }
}

/// Addressing tuple for one block variant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    pub role: String,
    pub namespace: String,
    pub template_set: String,
    pub block_id: String,
    pub language: String,
}

impl ResolutionKey {
    pub fn new(
        role: impl Into<String>,
        namespace: impl Into<String>,
        template_set: impl Into<String>,
        block_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            namespace: namespace.into(),
            template_set: template_set.into(),
            block_id: block_id.into(),
            language: language.into(),
        }
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}[{}@{}]",
            self.namespace, self.template_set, self.block_id, self.role, self.language
        )
    }
}

/// A block after role and language resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBlock {
    pub block_id: String,
    /// Role whose override was applied, if any
    pub role_override: Option<String>,
    /// Language whose text was selected
    pub language: String,
    /// Raw template text
    pub text: String,
    pub keyboard_spec: Vec<RowSpec>,
    pub layout: KeyboardLayout,
    pub parse_mode: Option<ParseMode>,
}
