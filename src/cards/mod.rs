//! Adaptive Card documents and the pieces that produce and consume them.
//!
//! - [`templates`] holds the builtin card catalog and resolves `${var}`
//!   placeholders into concrete documents.
//! - [`extract`] pulls a card payload out of free-form assistant text.
//! - [`render`] is the rendering boundary plus a plain-text outline renderer.

pub mod extract;
pub mod render;
pub mod templates;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use extract::{card_fence_start, card_span, extract, split, ExtractedTurn};
pub use templates::{resolve, CardTemplate, TemplateStore, VariableMap};

/// Schema version stamped on every builtin card.
pub const CARD_SCHEMA_VERSION: &str = "1.5";

/// A concrete, fully resolved Adaptive Card document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardDocument(Value);

impl CardDocument {
    /// Wraps a JSON object. Anything else is not a card.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_object() {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// The `type` field, normally `"AdaptiveCard"`.
    pub fn card_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Text of the first `TextBlock` in the body, used as a headline.
    pub fn title(&self) -> Option<&str> {
        self.0
            .get("body")
            .and_then(Value::as_array)?
            .iter()
            .find(|element| element.get("type").and_then(Value::as_str) == Some("TextBlock"))
            .and_then(|element| element.get("text"))
            .and_then(Value::as_str)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}
