//! Version snapshot model.
//!
//! # Responsibility
//! - Define the persisted shape of a content version.
//! - Read a page's history back in most-recent-first order.
//!
//! # Invariants
//! - Exactly one of `pageId` / `areaId` identifies the versioned entity.
//!   When an area lives inside a page, the whole page is versioned under `pageId`.
//! - `author` is a plain display string, so deleting a user account never
//!   breaks history.
//! - History is served by the `(pageId 1, createdAt -1)` index.

use crate::collection::{Collection, Document, IndexField, StoredDocument};
use crate::db::{DbError, DbResult};
use crate::order::Identified;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const PAGE_ID_FIELD: &str = "pageId";
pub const AREA_ID_FIELD: &str = "areaId";
pub const CREATED_AT_FIELD: &str = "createdAt";

/// The entity a version belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSubject {
    Page(String),
    /// An area stored independently of any page.
    Area(String),
}

/// Immutable snapshot of a page or standalone area.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub id: String,
    pub subject: VersionSubject,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub author: String,
    /// Captured content, opaque to the storage layer.
    pub content: Value,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    area_id: Option<String>,
    created_at: i64,
    author: String,
    #[serde(default)]
    content: Value,
}

impl VersionRecord {
    /// Snapshots a page (or an area stored in one) as of now.
    pub fn for_page(page_id: impl Into<String>, author: impl Into<String>, content: Value) -> Self {
        Self::new(VersionSubject::Page(page_id.into()), author, content)
    }

    /// Snapshots a standalone area as of now.
    pub fn for_area(area_id: impl Into<String>, author: impl Into<String>, content: Value) -> Self {
        Self::new(VersionSubject::Area(area_id.into()), author, content)
    }

    fn new(subject: VersionSubject, author: impl Into<String>, content: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject,
            created_at: now_ms(),
            author: author.into(),
            content,
        }
    }

    pub fn to_document(&self) -> DbResult<Document> {
        let (page_id, area_id) = match &self.subject {
            VersionSubject::Page(id) => (Some(id.clone()), None),
            VersionSubject::Area(id) => (None, Some(id.clone())),
        };
        let doc = VersionDocument {
            id: self.id.clone(),
            page_id,
            area_id,
            created_at: self.created_at,
            author: self.author.clone(),
            content: self.content.clone(),
        };
        match serde_json::to_value(doc)? {
            Value::Object(map) => Ok(map),
            other => Err(DbError::InvalidDocument(format!(
                "version did not encode as an object: {other}"
            ))),
        }
    }

    pub fn from_document(stored: &StoredDocument) -> DbResult<Self> {
        let doc: VersionDocument = serde_json::from_value(Value::Object(stored.body.clone()))?;
        let subject = match (doc.page_id, doc.area_id) {
            (Some(page_id), None) => VersionSubject::Page(page_id),
            (None, Some(area_id)) => VersionSubject::Area(area_id),
            _ => {
                return Err(DbError::InvalidDocument(format!(
                    "version `{}` must have exactly one of `{PAGE_ID_FIELD}` or `{AREA_ID_FIELD}`",
                    stored.id
                )));
            }
        };
        Ok(Self {
            id: doc.id,
            subject,
            created_at: doc.created_at,
            author: doc.author,
            content: doc.content,
        })
    }
}

impl Identified for VersionRecord {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }
}

/// Returns every version of `page_id`, most recent first.
pub fn versions_for_page(versions: &Collection<'_>, page_id: &str) -> DbResult<Vec<VersionRecord>> {
    versions
        .find_eq(
            PAGE_ID_FIELD,
            &Value::String(page_id.to_string()),
            &[IndexField::desc(CREATED_AT_FIELD)],
        )?
        .iter()
        .map(VersionRecord::from_document)
        .collect()
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{VersionRecord, VersionSubject};
    use crate::collection::StoredDocument;
    use serde_json::json;

    #[test]
    fn page_version_document_uses_page_id_only() {
        let version = VersionRecord::for_page("p1", "admin", json!({"title": "Home"}));
        let doc = version.to_document().unwrap();
        assert_eq!(doc["pageId"], json!("p1"));
        assert!(!doc.contains_key("areaId"));
        assert_eq!(doc["author"], json!("admin"));
        assert!(doc["createdAt"].as_i64().unwrap() > 0);
    }

    #[test]
    fn area_version_survives_document_roundtrip() {
        let version = VersionRecord::for_area("sidebar", "editor", json!({"items": []}));
        let stored = StoredDocument {
            id: version.id.clone(),
            body: version.to_document().unwrap(),
        };
        let decoded = VersionRecord::from_document(&stored).unwrap();
        assert_eq!(decoded, version);
        assert_eq!(decoded.subject, VersionSubject::Area("sidebar".to_string()));
    }

    #[test]
    fn document_without_subject_is_rejected() {
        let stored = StoredDocument {
            id: "v1".to_string(),
            body: json!({"_id": "v1", "createdAt": 1, "author": "a"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        assert!(VersionRecord::from_document(&stored).is_err());
    }
}
