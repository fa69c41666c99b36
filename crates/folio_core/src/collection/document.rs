//! Document shape shared by every collection.

use crate::db::{DbError, DbResult};
use crate::order::Identified;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identity field present on every stored document.
pub const ID_FIELD: &str = "_id";

/// A schemaless JSON object as stored in a collection.
pub type Document = Map<String, Value>;

/// A document read back from a collection together with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    /// Full document body, `_id` included.
    pub body: Document,
}

impl StoredDocument {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }
}

impl Identified for StoredDocument {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

/// Returns the document's `_id`, assigning a fresh UUID when it has none.
pub(crate) fn ensure_id(doc: &mut Document) -> DbResult<String> {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(other) => Err(DbError::InvalidDocument(format!(
            "`{ID_FIELD}` must be a non-empty string, got {other}"
        ))),
        None => {
            let id = Uuid::new_v4().to_string();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}

pub(crate) fn decode_document(id: String, raw: &str) -> DbResult<StoredDocument> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(body) => Ok(StoredDocument { id, body }),
        other => Err(DbError::InvalidDocument(format!(
            "stored body for `{id}` is not an object: {other}"
        ))),
    }
}
