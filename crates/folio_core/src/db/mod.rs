//! SQLite-backed document storage bootstrap and error taxonomy.
//!
//! # Responsibility
//! - Open and configure SQLite connections used as the document database.
//! - Define the storage error type and its stable numeric error codes.
//! - Classify uniqueness failures so callers can decide whether to retry.
//!
//! # Invariants
//! - Constraint failures raised by writes are surfaced as coded `Command`
//!   errors, never as raw driver errors.
//! - Errors are returned to the caller unchanged; this layer never retries.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod classify;
mod open;

pub use classify::is_unique_error;
pub use open::{open_db, open_db_in_memory, open_db_with_config};

pub type DbResult<T> = Result<T, DbError>;

/// Numeric error codes reported by the document database.
///
/// Values match the codes document-database clients already key their retry
/// logic on, so ops tooling and callers can compare raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorCode {
    /// An index with the same name exists with different options (85).
    IndexOptionsConflict,
    /// A unique index rejected an insert (11000).
    DuplicateKey,
    /// A unique index rejected an update (11001).
    DuplicateKeyOnUpdate,
    /// An upsert tried to change the `_id` of an existing document (13596).
    ImmutableIdField,
    /// Any other code reported by the database.
    Other(i32),
}

impl DbErrorCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::IndexOptionsConflict => 85,
            Self::DuplicateKey => 11000,
            Self::DuplicateKeyOnUpdate => 11001,
            Self::ImmutableIdField => 13596,
            Self::Other(code) => code,
        }
    }
}

impl From<i32> for DbErrorCode {
    fn from(value: i32) -> Self {
        match value {
            85 => Self::IndexOptionsConflict,
            11000 => Self::DuplicateKey,
            11001 => Self::DuplicateKeyOnUpdate,
            13596 => Self::ImmutableIdField,
            other => Self::Other(other),
        }
    }
}

impl Display for DbErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

#[derive(Debug)]
pub enum DbError {
    /// Driver-level failure without a document-database code.
    Sqlite(rusqlite::Error),
    /// Failure reported with a document-database error code.
    Command { code: DbErrorCode, message: String },
    /// A collection, index or field name is not usable as a storage identifier.
    InvalidName(String),
    /// A document could not be stored or decoded.
    InvalidDocument(String),
    Json(serde_json::Error),
}

impl DbError {
    pub fn command(code: impl Into<DbErrorCode>, message: impl Into<String>) -> Self {
        Self::Command {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the database error code, if this error carries one.
    pub fn code(&self) -> Option<DbErrorCode> {
        match self {
            Self::Command { code, .. } => Some(*code),
            Self::Sqlite(_) | Self::InvalidName(_) | Self::InvalidDocument(_) | Self::Json(_) => {
                None
            }
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Command { code, message } => write!(f, "E{code} {message}"),
            Self::InvalidName(name) => write!(f, "invalid storage name `{name}`"),
            Self::InvalidDocument(message) => write!(f, "invalid document: {message}"),
            Self::Json(err) => write!(f, "document encoding failed: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Command { .. } | Self::InvalidName(_) | Self::InvalidDocument(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Kind of write that produced a driver error, used to pick the duplicate-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Insert,
    Update,
}

/// Converts unique/primary-key constraint failures into coded duplicate-key errors.
pub(crate) fn translate_write_error(err: rusqlite::Error, kind: WriteKind, scope: &str) -> DbError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            let code = match kind {
                WriteKind::Insert => DbErrorCode::DuplicateKey,
                WriteKind::Update => DbErrorCode::DuplicateKeyOnUpdate,
            };
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            return DbError::command(code, format!("duplicate key error collection: {scope} {detail}"));
        }
    }
    DbError::Sqlite(err)
}
