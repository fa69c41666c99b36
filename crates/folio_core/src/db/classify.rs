//! Uniqueness classification for write failures.

use super::{DbError, DbErrorCode};

/// Returns whether `err` is a uniqueness problem that a caller may retry with a
/// regenerated key.
///
/// Duplicate-key failures on insert (11000) and update (11001) qualify, as does
/// an upsert that would change the `_id` of an existing document (13596), which
/// typically happens when the caller assigns `_id` itself.
///
/// # Caller contract
/// Before retrying on `true`, make sure every unique index that could have
/// produced the conflict is accounted for in the retry strategy. Regenerating a
/// slug does nothing for a conflict on `_id`, and the loop never ends.
pub fn is_unique_error(err: Option<&DbError>) -> bool {
    let Some(err) = err else {
        return false;
    };
    matches!(
        err.code(),
        Some(
            DbErrorCode::DuplicateKey
                | DbErrorCode::DuplicateKeyOnUpdate
                | DbErrorCode::ImmutableIdField
        )
    )
}

#[cfg(test)]
mod tests {
    use super::is_unique_error;
    use crate::db::DbError;

    #[test]
    fn absent_error_is_not_unique() {
        assert!(!is_unique_error(None));
    }

    #[test]
    fn duplicate_key_codes_are_unique() {
        for code in [11000, 11001, 13596] {
            let err = DbError::command(code, "conflict");
            assert!(is_unique_error(Some(&err)), "code {code} should classify");
        }
    }

    #[test]
    fn other_codes_and_uncoded_errors_are_not_unique() {
        assert!(!is_unique_error(Some(&DbError::command(9999, "other"))));
        assert!(!is_unique_error(Some(&DbError::command(85, "options"))));
        assert!(!is_unique_error(Some(&DbError::InvalidDocument(
            "bad".to_string()
        ))));
    }
}
