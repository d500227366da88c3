//! Dynamic keyboards.
//!
//! A block declares its keyboard as rows of button descriptors. Rows are
//! either fixed lists or generators repeated over a list in the render
//! context; labels and non-static actions are interpolated like message text.

mod builder;
mod types;

pub use builder::{BuiltKeyboard, KeyboardBuilder};
pub use types::{
    ActionSpec, Button, ButtonAction, ButtonSpec, GeneratorSpec, Keyboard, KeyboardKind,
    KeyboardLayout, RowSpec,
};
