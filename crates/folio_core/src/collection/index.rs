//! Index specifications and idempotent index declaration.
//!
//! # Invariants
//! - Index names follow the `<field>_<1|-1>` convention joined by `_`.
//! - Physical SQLite index names are scoped by collection, since SQLite index
//!   names are unique per database rather than per table.
//! - Re-declaring an equivalent index is a no-op; re-declaring a name with
//!   different options fails with `IndexOptionsConflict`.

use super::{key_expr, validate_field, Collection, NULL_KEY_SQL};
use crate::db::{translate_write_error, DbError, DbErrorCode, DbResult, WriteKind};
use log::debug;
use rusqlite::OptionalExtension;

/// Key direction of one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Direction as written in index names: `1` or `-1`.
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    pub(crate) const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexField {
    pub name: &'static str,
    pub order: SortOrder,
}

impl IndexField {
    pub const fn asc(name: &'static str) -> Self {
        Self {
            name,
            order: SortOrder::Ascending,
        }
    }

    pub const fn desc(name: &'static str) -> Self {
        Self {
            name,
            order: SortOrder::Descending,
        }
    }
}

/// A required index: ordered key fields plus options.
///
/// Every declaration is acknowledged: `ensure_index` returns only after the
/// index is built and enforced for all later writes.
///
/// A `multikey` index covers one field and keys a document by each element
/// when that field holds an array (by the value itself otherwise), so equality
/// lookups match array membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub fields: &'static [IndexField],
    pub unique: bool,
    pub multikey: bool,
}

impl IndexSpec {
    pub const fn new(fields: &'static [IndexField]) -> Self {
        Self {
            fields,
            unique: false,
            multikey: false,
        }
    }

    pub const fn unique(fields: &'static [IndexField]) -> Self {
        Self {
            fields,
            unique: true,
            multikey: false,
        }
    }

    pub const fn multikey(fields: &'static [IndexField]) -> Self {
        Self {
            fields,
            unique: false,
            multikey: true,
        }
    }

    /// Returns the conventional index name, e.g. `pageId_1_createdAt_-1`.
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|field| format!("{}_{}", field.name, field.order.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// An index as currently present on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub multikey: bool,
}

/// What currently occupies an index name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExistingIndex {
    Plain { unique: bool },
    Multikey,
}

impl Collection<'_> {
    /// Declares `spec` on this collection, creating the index if absent.
    ///
    /// Returns the index name. Existing documents that already violate a
    /// unique spec make the declaration fail with `DuplicateKey`.
    ///
    /// # Errors
    /// - `InvalidName` when a field name is not a plain dotted identifier, or a
    ///   multikey spec is unique or covers more than one field.
    /// - `Command(IndexOptionsConflict)` when the name exists with other options.
    pub fn ensure_index(&self, spec: &IndexSpec) -> DbResult<String> {
        if spec.fields.is_empty() {
            return Err(DbError::InvalidName(format!(
                "index on `{}` has no fields",
                self.name
            )));
        }
        for field in spec.fields {
            validate_field(field.name)?;
        }

        let name = spec.name();
        if spec.multikey && (spec.unique || spec.fields.len() != 1) {
            return Err(DbError::InvalidName(format!(
                "multikey index {name} on {} must cover one field and not be unique",
                self.name
            )));
        }

        let requested = if spec.multikey {
            ExistingIndex::Multikey
        } else {
            ExistingIndex::Plain {
                unique: spec.unique,
            }
        };
        if let Some(existing) = self.existing_index(&name)? {
            if existing != requested {
                return Err(DbError::command(
                    DbErrorCode::IndexOptionsConflict,
                    format!(
                        "index with name {name} already exists on {} with different options",
                        self.name
                    ),
                ));
            }
            debug!(
                "event=ensure_index module=collection status=exists collection={} index={}",
                self.name, name
            );
            return Ok(name);
        }

        let physical = self.physical_index_name(&name);
        if spec.multikey {
            self.create_multikey(&physical, spec.fields[0].name)?;
        } else {
            let keys = spec
                .fields
                .iter()
                .map(|field| format!("{} {}", key_expr(field.name), field.order.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "CREATE {}INDEX IF NOT EXISTS \"{physical}\" ON \"{}\" ({keys});",
                if spec.unique { "UNIQUE " } else { "" },
                self.name
            );
            self.conn
                .execute_batch(&sql)
                .map_err(|err| translate_write_error(err, WriteKind::Insert, &self.name))?;
        }

        debug!(
            "event=ensure_index module=collection status=created collection={} index={} unique={} multikey={}",
            self.name, name, spec.unique, spec.multikey
        );
        Ok(name)
    }

    /// Lists declared indexes by name, excluding the implicit `_id` key.
    pub fn list_indexes(&self) -> DbResult<Vec<IndexInfo>> {
        let prefix = self.physical_index_name("");
        let mut stmt = self.conn.prepare(
            "SELECT name, \"unique\", 0 FROM pragma_index_list(?1)
             WHERE origin = 'c'
             UNION ALL
             SELECT name, 0, 1 FROM sqlite_master
             WHERE type = 'table' AND substr(name, 1, length(?2)) = ?2
             ORDER BY 1;",
        )?;
        let mut rows = stmt.query([self.name.as_str(), prefix.as_str()])?;
        let mut indexes = Vec::new();
        while let Some(row) = rows.next()? {
            let physical: String = row.get(0)?;
            let name = physical
                .strip_prefix(&prefix)
                .map(str::to_string)
                .unwrap_or(physical);
            indexes.push(IndexInfo {
                name,
                unique: row.get(1)?,
                multikey: row.get(2)?,
            });
        }
        Ok(indexes)
    }

    /// Returns the key table of a multikey index on `field`, if one is declared.
    pub(crate) fn multikey_table(&self, field: &str) -> DbResult<Option<String>> {
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let name = format!("{field}_{}", order.as_i32());
            if self.existing_index(&name)? == Some(ExistingIndex::Multikey) {
                return Ok(Some(self.physical_index_name(&name)));
            }
        }
        Ok(None)
    }

    fn existing_index(&self, name: &str) -> DbResult<Option<ExistingIndex>> {
        let physical = self.physical_index_name(name);
        let plain: Option<bool> = self
            .conn
            .query_row(
                "SELECT \"unique\" FROM pragma_index_list(?1) WHERE name = ?2;",
                [self.name.as_str(), physical.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(unique) = plain {
            return Ok(Some(ExistingIndex::Plain { unique }));
        }

        let multikey: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [physical.as_str()],
            |row| row.get(0),
        )?;
        Ok(multikey.then_some(ExistingIndex::Multikey))
    }

    /// Builds a key table `(key, _id)` kept in step with the collection by
    /// triggers, then backfills it from the documents already stored.
    fn create_multikey(&self, table: &str, field: &str) -> DbResult<()> {
        let collection = &self.name;
        let element_key = format!("coalesce(j.value, {NULL_KEY_SQL})");
        let sql = format!(
            "SAVEPOINT ensure_multikey;
             CREATE TABLE \"{table}\" (
                key NOT NULL,
                _id TEXT NOT NULL,
                PRIMARY KEY (key, _id)
             ) WITHOUT ROWID;
             CREATE INDEX \"{table}._id\" ON \"{table}\" (_id);
             CREATE TRIGGER \"{table}.insert\" AFTER INSERT ON \"{collection}\" BEGIN
                INSERT OR IGNORE INTO \"{table}\" (key, _id)
                SELECT {element_key}, NEW._id FROM json_each(NEW.body, '$.{field}') AS j;
             END;
             CREATE TRIGGER \"{table}.update\" AFTER UPDATE OF body ON \"{collection}\" BEGIN
                DELETE FROM \"{table}\" WHERE _id = OLD._id;
                INSERT OR IGNORE INTO \"{table}\" (key, _id)
                SELECT {element_key}, NEW._id FROM json_each(NEW.body, '$.{field}') AS j;
             END;
             CREATE TRIGGER \"{table}.delete\" AFTER DELETE ON \"{collection}\" BEGIN
                DELETE FROM \"{table}\" WHERE _id = OLD._id;
             END;
             INSERT OR IGNORE INTO \"{table}\" (key, _id)
             SELECT {element_key}, c._id FROM \"{collection}\" AS c, json_each(c.body, '$.{field}') AS j;
             RELEASE ensure_multikey;"
        );
        if let Err(err) = self.conn.execute_batch(&sql) {
            self.conn
                .execute_batch("ROLLBACK TO ensure_multikey; RELEASE ensure_multikey;")?;
            return Err(err.into());
        }
        Ok(())
    }

    fn physical_index_name(&self, index: &str) -> String {
        format!("{}.{index}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{Collection, IndexField, IndexSpec};
    use crate::db::DbError;

    #[test]
    fn index_names_follow_field_direction_convention() {
        const SLUG_KEY: &[IndexField] = &[IndexField::asc("slug")];
        const HISTORY_KEY: &[IndexField] = &[IndexField::asc("pageId"), IndexField::desc("createdAt")];
        let slug = IndexSpec::unique(SLUG_KEY);
        let history = IndexSpec::new(HISTORY_KEY);

        assert_eq!(slug.name(), "slug_1");
        assert!(slug.unique);
        assert_eq!(history.name(), "pageId_1_createdAt_-1");
        assert!(!history.unique);
    }

    #[test]
    fn multikey_specs_are_single_field_and_non_unique() {
        const TAGS_KEY: &[IndexField] = &[IndexField::asc("tags")];
        const PAIR_KEY: &[IndexField] = &[IndexField::asc("tags"), IndexField::asc("slug")];
        let conn = crate::db::open_db_in_memory().unwrap();
        let pages = Collection::open(&conn, "pages").unwrap();

        let tags = IndexSpec::multikey(TAGS_KEY);
        assert_eq!(pages.ensure_index(&tags).unwrap(), "tags_1");
        assert!(pages.multikey_table("tags").unwrap().is_some());
        assert!(pages.multikey_table("slug").unwrap().is_none());

        let pair = IndexSpec::multikey(PAIR_KEY);
        assert!(matches!(pages.ensure_index(&pair), Err(DbError::InvalidName(_))));
        let unique = IndexSpec {
            unique: true,
            ..IndexSpec::multikey(TAGS_KEY)
        };
        assert!(matches!(pages.ensure_index(&unique), Err(DbError::InvalidName(_))));
    }
}
