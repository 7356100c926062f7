//! Item model and its document encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use synclist_core::document::{Document, DocumentId, Fields};

/// Document field holding the item text.
pub const TEXT_FIELD: &str = "text";

/// Document field holding the completion flag.
pub const IS_DONE_FIELD: &str = "isDone";

/// A todo item as stored in the user's collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Free text; may be empty
    pub text: String,
    /// Completion flag
    #[serde(rename = "isDone")]
    pub is_done: bool,
}

impl Item {
    /// A new, not yet done item.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_done: false,
        }
    }

    /// Encode as document fields.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(TEXT_FIELD.to_string(), Value::String(self.text.clone()));
        fields.insert(IS_DONE_FIELD.to_string(), Value::Bool(self.is_done));
        fields
    }

    /// Decode document fields.
    ///
    /// Decoding never fails: a missing or non-string text reads as `""` and a
    /// missing or non-boolean flag reads as `false`.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        Self {
            text: document.get_str(TEXT_FIELD).unwrap_or_default().to_string(),
            is_done: document.get_bool(IS_DONE_FIELD).unwrap_or(false),
        }
    }
}

/// An item together with the id of the document backing it.
///
/// This is what the list shows and what gestures hand back to the
/// view-model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemRef {
    /// Store-assigned document id
    pub id: DocumentId,
    /// Decoded item
    pub item: Item,
}

impl From<&Document> for ItemRef {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            item: Item::from_document(document),
        }
    }
}
