//! Declarative keyboard specs and the concrete keyboard built from them

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Inline keyboards sit under the message; reply keyboards replace the input field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardKind {
    #[default]
    Inline,
    Reply,
}

/// Presentation options carried by a block alongside its keyboard spec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardLayout {
    pub kind: KeyboardKind,
    /// Reply keyboards only
    pub resize_keyboard: bool,
    /// Reply keyboards only
    pub one_time_keyboard: bool,
}

/// One row of a keyboard spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowSpec {
    /// A fixed list of buttons
    Fixed(Vec<ButtonSpec>),
    /// Buttons repeated once per element of a context list
    Generated(GeneratorSpec),
}

/// Expands `buttons` once per element of the context list at `for_each`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorSpec {
    /// Context path of the list to iterate
    pub for_each: String,
    /// Name each element is bound to inside the row (`{item.name}`)
    #[serde(rename = "as", default = "default_alias")]
    pub alias: String,
    pub buttons: Vec<ButtonSpec>,
}

fn default_alias() -> String {
    "item".to_string()
}

impl GeneratorSpec {
    /// Name of the zero-based position binding, e.g. `item_index`
    pub fn index_key(&self) -> String {
        format!("{}_index", self.alias)
    }
}

/// A button descriptor; the label and non-static actions are templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonSpec {
    pub text: String,
    /// Opaque token sent back verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    /// Token rendered against the button's context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Action of a button spec, before rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSpec<'a> {
    Static(&'a str),
    Template(&'a str),
    Url(&'a str),
}

impl ButtonSpec {
    /// Label-only button (reply keyboards)
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            callback_template: None,
            url: None,
        }
    }

    pub fn callback(text: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            callback_data: Some(token.into()),
            ..Self::label(text)
        }
    }

    pub fn callback_template(text: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            callback_template: Some(template.into()),
            ..Self::label(text)
        }
    }

    /// Declared actions in a fixed order; valid specs have at most one
    pub fn actions(&self) -> Vec<ActionSpec<'_>> {
        let mut actions = Vec::with_capacity(1);
        if let Some(token) = &self.callback_data {
            actions.push(ActionSpec::Static(token));
        }
        if let Some(template) = &self.callback_template {
            actions.push(ActionSpec::Template(template));
        }
        if let Some(url) = &self.url {
            actions.push(ActionSpec::Url(url));
        }
        actions
    }

    pub fn action(&self) -> Option<ActionSpec<'_>> {
        self.actions().into_iter().next()
    }
}

/// A rendered button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub action: Option<ButtonAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

/// A concrete keyboard, ready to attach to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub kind: KeyboardKind,
    pub rows: Vec<Vec<Button>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

impl Keyboard {
    pub fn inline(rows: Vec<Vec<Button>>) -> Self {
        Self {
            kind: KeyboardKind::Inline,
            rows,
            resize_keyboard: false,
            one_time_keyboard: false,
        }
    }

    pub fn button_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Telegram Bot API `reply_markup` object
    pub fn to_reply_markup(&self) -> Value {
        match self.kind {
            KeyboardKind::Inline => {
                let rows: Vec<Vec<Value>> = self
                    .rows
                    .iter()
                    .map(|row| row.iter().map(inline_button_json).collect())
                    .collect();
                json!({ "inline_keyboard": rows })
            }
            KeyboardKind::Reply => {
                let rows: Vec<Vec<Value>> = self
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|b| json!({ "text": b.text })).collect())
                    .collect();
                json!({
                    "keyboard": rows,
                    "resize_keyboard": self.resize_keyboard,
                    "one_time_keyboard": self.one_time_keyboard,
                })
            }
        }
    }
}

fn inline_button_json(button: &Button) -> Value {
    match &button.action {
        Some(ButtonAction::Callback(data)) => json!({ "text": button.text, "callback_data": data }),
        Some(ButtonAction::Url(url)) => json!({ "text": button.text, "url": url }),
        None => json!({ "text": button.text }),
    }
}
