//! Collection handles over the SQLite document store.
//!
//! # Responsibility
//! - Create-if-absent named collections and hand out borrowed handles.
//! - Provide the generic document access collaborators build on.
//!
//! # Invariants
//! - A collection is a table `(_id TEXT PRIMARY KEY, body TEXT)` whose `body`
//!   is always a JSON object containing the same `_id`.
//! - Field predicates and sorts are expressed with the same key expression the
//!   indexes use, so declared indexes serve them directly.
//! - A missing field and an explicit `null` share one key, so a unique index
//!   admits at most one document without the field.

mod document;
mod index;

pub use document::{Document, StoredDocument, ID_FIELD};
pub use index::{IndexField, IndexInfo, IndexSpec, SortOrder};

use crate::db::{translate_write_error, DbError, DbErrorCode, DbResult, WriteKind};
use document::{decode_document, ensure_id};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

static COLLECTION_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("collection name regex must compile")
});
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("field regex must compile")
});

/// Borrowed handle to one named collection.
#[derive(Debug, Clone)]
pub struct Collection<'conn> {
    conn: &'conn Connection,
    name: String,
}

impl<'conn> Collection<'conn> {
    /// Returns a handle to `name`, creating the collection when absent.
    pub fn open(conn: &'conn Connection, name: impl Into<String>) -> DbResult<Self> {
        let name = name.into();
        validate_collection_name(&name)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" (
                _id TEXT PRIMARY KEY NOT NULL,
                body TEXT NOT NULL CHECK (json_valid(body))
            );"
        ))?;
        Ok(Self { conn, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts `doc`, assigning a UUID `_id` when it has none. Returns the `_id`.
    ///
    /// # Errors
    /// - `Command(DuplicateKey)` when `_id` or a unique index already holds the value.
    pub fn insert_one(&self, mut doc: Document) -> DbResult<String> {
        let id = ensure_id(&mut doc)?;
        let body = serde_json::to_string(&doc)?;
        self.conn
            .execute(
                &format!("INSERT INTO \"{}\" (_id, body) VALUES (?1, ?2);", self.name),
                params![id, body],
            )
            .map_err(|err| translate_write_error(err, WriteKind::Insert, &self.name))?;
        Ok(id)
    }

    /// Replaces the document whose `_id` is `id` with `doc`.
    ///
    /// With `upsert`, a missing document is inserted instead. Returns whether a
    /// document was replaced or inserted.
    ///
    /// # Errors
    /// - `Command(ImmutableIdField)` when `doc` carries an `_id` other than `id`
    ///   and a document would be written: `id` exists, or `upsert` is set.
    /// - `Command(DuplicateKeyOnUpdate)` when the replacement violates a unique index.
    pub fn replace_one(&self, id: &str, mut doc: Document, upsert: bool) -> DbResult<bool> {
        match doc.get(ID_FIELD) {
            None => {
                doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            }
            Some(Value::String(existing)) if existing == id => {}
            Some(other) => {
                if !upsert && self.find_by_id(id)?.is_none() {
                    return Ok(false);
                }
                return Err(DbError::command(
                    DbErrorCode::ImmutableIdField,
                    format!(
                        "cannot change _id of a document in {}: old `{id}`, new {other}",
                        self.name
                    ),
                ));
            }
        }

        let body = serde_json::to_string(&doc)?;
        let changed = self
            .conn
            .execute(
                &format!("UPDATE \"{}\" SET body = ?1 WHERE _id = ?2;", self.name),
                params![body, id],
            )
            .map_err(|err| translate_write_error(err, WriteKind::Update, &self.name))?;

        if changed > 0 {
            return Ok(true);
        }
        if !upsert {
            return Ok(false);
        }
        self.insert_one(doc)?;
        Ok(true)
    }

    pub fn find_by_id(&self, id: &str) -> DbResult<Option<StoredDocument>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT _id, body FROM \"{}\" WHERE _id = ?1;", self.name),
                [id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        row.map(|(id, body)| decode_document(id, &body)).transpose()
    }

    /// Membership query over `_id`.
    ///
    /// Result order is unspecified and does not follow `ids`; use
    /// `order::order_by_id` to restore a meaningful order.
    pub fn find_in<S: AsRef<str>>(&self, ids: &[S]) -> DbResult<Vec<StoredDocument>> {
        let ids = Value::Array(
            ids.iter()
                .map(|id| Value::String(id.as_ref().to_string()))
                .collect(),
        );
        self.query_documents(
            &format!(
                "SELECT _id, body FROM \"{}\" WHERE _id IN (SELECT value FROM json_each(?1));",
                self.name
            ),
            vec![SqlValue::Text(ids.to_string())],
        )
    }

    /// Returns documents whose `field` equals `value`, ordered by `sort`.
    ///
    /// When `field` followed by `sort` is the key of a declared index, the
    /// result is read in index order without a separate sort step.
    pub fn find_eq(
        &self,
        field: &str,
        value: &Value,
        sort: &[IndexField],
    ) -> DbResult<Vec<StoredDocument>> {
        let (sql, binds) = self.find_eq_sql(field, value, sort)?;
        self.query_documents(&sql, binds)
    }

    /// Returns the SQLite query plan details `find_eq` would execute.
    pub fn explain_find_eq(
        &self,
        field: &str,
        value: &Value,
        sort: &[IndexField],
    ) -> DbResult<Vec<String>> {
        let (sql, binds) = self.find_eq_sql(field, value, sort)?;
        let mut stmt = self.conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        let mut rows = stmt.query(rusqlite::params_from_iter(binds))?;
        let mut details = Vec::new();
        while let Some(row) = rows.next()? {
            details.push(row.get::<_, String>(3)?);
        }
        Ok(details)
    }

    pub fn count(&self) -> DbResult<u64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\";", self.name),
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn find_eq_sql(
        &self,
        field: &str,
        value: &Value,
        sort: &[IndexField],
    ) -> DbResult<(String, Vec<SqlValue>)> {
        validate_field(field)?;
        let mut sql = format!("SELECT _id, body FROM \"{}\" WHERE ", self.name);
        // Null matches documents lacking the field, which a key table never lists.
        let key_table = if value.is_null() {
            None
        } else {
            self.multikey_table(field)?
        };
        match key_table {
            Some(table) => {
                sql.push_str(&format!("_id IN (SELECT _id FROM \"{table}\" WHERE key = ?1)"));
            }
            None => sql.push_str(&format!("{} = ?1", key_expr(field))),
        }
        let binds = vec![json_to_sql(value)];

        if !sort.is_empty() {
            let mut order_by = Vec::with_capacity(sort.len());
            for key in sort {
                validate_field(key.name)?;
                order_by.push(format!("{} {}", key_expr(key.name), key.order.as_sql()));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by.join(", "));
        }
        sql.push(';');
        Ok((sql, binds))
    }

    fn query_documents(&self, sql: &str, binds: Vec<SqlValue>) -> DbResult<Vec<StoredDocument>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(binds))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let body: String = row.get(1)?;
            documents.push(decode_document(id, &body)?);
        }
        Ok(documents)
    }
}

/// Key value stored for a missing or null field. `json_extract` never yields a
/// blob, so it cannot collide with a real value.
pub(crate) const NULL_KEY_SQL: &str = "x''";

/// Maps a JSON value to its index key, the value `key_expr` yields for it.
fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Blob(Vec::new()),
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

pub(crate) fn key_expr(field: &str) -> String {
    format!("coalesce(json_extract(body, '$.{field}'), {NULL_KEY_SQL})")
}

fn validate_collection_name(name: &str) -> DbResult<()> {
    if COLLECTION_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(DbError::InvalidName(name.to_string()))
    }
}

/// Accepts dotted identifiers such as `slug` or `meta.author`.
pub(crate) fn validate_field(field: &str) -> DbResult<()> {
    if FIELD_RE.is_match(field) {
        Ok(())
    } else {
        Err(DbError::InvalidName(field.to_string()))
    }
}
