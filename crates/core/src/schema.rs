//! Column-list validation for per-project task and result schemas.
//!
//! A schema is an ordered list of user-chosen column names. The names are
//! stored verbatim and later used as payload keys, so they are restricted
//! to identifier-like strings and kept clear of the system-owned columns.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// System-owned columns of every task record.
pub const TASK_RESERVED_COLUMNS: &[&str] =
    &["id", "status", "worker_id", "claimed_at", "retry_count", "note"];

/// System-owned columns of every result record, on top of the task set.
pub const RESULT_RESERVED_COLUMNS: &[&str] = &[
    "id",
    "status",
    "worker_id",
    "claimed_at",
    "retry_count",
    "note",
    "task_id",
];

/// PostgreSQL truncates identifiers longer than this.
pub const MAX_COLUMN_NAME_BYTES: usize = 63;

/// Upper bound for caller-supplied worker ids.
pub const MAX_WORKER_ID_BYTES: usize = 255;

/// Letter or underscore first, then letters, digits, or underscores.
/// Unicode letters (e.g. CJK) are accepted.
const COLUMN_NAME_PATTERN: &str = r"^[\p{L}_][\p{L}\p{N}_]*$";

static COLUMN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(COLUMN_NAME_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Schema kind
// ---------------------------------------------------------------------------

/// Which of a project's two stores a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    Task,
    Result,
}

impl SchemaKind {
    /// Value stored in `project_schemas.kind`.
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Task => "task",
            SchemaKind::Result => "result",
        }
    }

    /// Column names users may not claim for this kind of store.
    pub fn reserved_columns(self) -> &'static [&'static str] {
        match self {
            SchemaKind::Task => TASK_RESERVED_COLUMNS,
            SchemaKind::Result => RESULT_RESERVED_COLUMNS,
        }
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a single user column name for a store of the given kind.
pub fn validate_column_name(kind: SchemaKind, name: &str) -> Result<(), CoreError> {
    if name.len() > MAX_COLUMN_NAME_BYTES {
        return Err(CoreError::InvalidSchema(format!(
            "Column name '{name}' exceeds {MAX_COLUMN_NAME_BYTES} bytes"
        )));
    }
    if !COLUMN_NAME_RE.is_match(name) {
        return Err(CoreError::InvalidSchema(format!(
            "Column name '{name}' must start with a letter or underscore and contain \
             only letters, digits, or underscores"
        )));
    }
    if kind
        .reserved_columns()
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(CoreError::InvalidSchema(format!(
            "Column name '{name}' is reserved for the system"
        )));
    }
    Ok(())
}

/// Validate a full column list for `define_*_schema`.
///
/// Rules:
/// - At least one column.
/// - Every name passes [`validate_column_name`].
/// - No duplicates.
pub fn validate_columns(kind: SchemaKind, columns: &[String]) -> Result<(), CoreError> {
    if columns.is_empty() {
        return Err(CoreError::InvalidSchema(format!(
            "A {kind} schema needs at least one column"
        )));
    }

    let mut seen = HashSet::with_capacity(columns.len());
    for name in columns {
        validate_column_name(kind, name)?;
        if !seen.insert(name.as_str()) {
            return Err(CoreError::InvalidSchema(format!(
                "Duplicate column name '{name}'"
            )));
        }
    }

    Ok(())
}

/// Error for a write whose rows were shaped against a schema that was
/// redefined before the write landed.
pub fn schema_changed(kind: SchemaKind) -> CoreError {
    CoreError::SchemaMismatch(format!(
        "The {kind} schema was redefined while the request was in flight"
    ))
}

/// Validate a caller-supplied worker id.
pub fn validate_worker_id(worker_id: &str) -> Result<(), CoreError> {
    if worker_id.trim().is_empty() {
        return Err(CoreError::Validation(
            "worker_id must not be empty".to_string(),
        ));
    }
    if worker_id.len() > MAX_WORKER_ID_BYTES {
        return Err(CoreError::Validation(format!(
            "worker_id must not exceed {MAX_WORKER_ID_BYTES} bytes"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // -- validate_column_name -------------------------------------------------

    #[test]
    fn accepts_identifier_like_names() {
        for name in ["url", "user_id", "_private", "page2", "标题", "Título"] {
            assert!(
                validate_column_name(SchemaKind::Task, name).is_ok(),
                "{name} should be accepted"
            );
        }
    }

    #[test]
    fn rejects_leading_digit_and_punctuation() {
        for name in ["2fast", "with space", "semi;colon", "quote\"d", "", "dash-ed"] {
            assert_matches!(
                validate_column_name(SchemaKind::Task, name),
                Err(CoreError::InvalidSchema(_)),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_reserved_names_case_insensitively() {
        assert!(validate_column_name(SchemaKind::Task, "status").is_err());
        assert!(validate_column_name(SchemaKind::Task, "Worker_ID").is_err());
        assert!(validate_column_name(SchemaKind::Task, "NOTE").is_err());
    }

    #[test]
    fn task_id_is_reserved_only_for_results() {
        assert!(validate_column_name(SchemaKind::Task, "task_id").is_ok());
        assert!(validate_column_name(SchemaKind::Result, "task_id").is_err());
        assert!(validate_column_name(SchemaKind::Result, "id").is_err());
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "a".repeat(MAX_COLUMN_NAME_BYTES + 1);
        assert!(validate_column_name(SchemaKind::Task, &name).is_err());
        let name = "a".repeat(MAX_COLUMN_NAME_BYTES);
        assert!(validate_column_name(SchemaKind::Task, &name).is_ok());
    }

    // -- validate_columns -----------------------------------------------------

    #[test]
    fn empty_column_list_rejected() {
        assert_matches!(
            validate_columns(SchemaKind::Result, &[]),
            Err(CoreError::InvalidSchema(_))
        );
    }

    #[test]
    fn duplicate_columns_rejected() {
        assert_matches!(
            validate_columns(SchemaKind::Task, &cols(&["url", "depth", "url"])),
            Err(CoreError::InvalidSchema(msg)) if msg.contains("Duplicate")
        );
    }

    #[test]
    fn valid_column_list_accepted() {
        assert!(validate_columns(SchemaKind::Task, &cols(&["url", "user_id"])).is_ok());
    }

    // -- validate_worker_id ---------------------------------------------------

    #[test]
    fn worker_id_rules() {
        assert!(validate_worker_id("crawler-01").is_ok());
        assert_matches!(validate_worker_id(""), Err(CoreError::Validation(_)));
        assert_matches!(validate_worker_id("   "), Err(CoreError::Validation(_)));
        let long = "w".repeat(MAX_WORKER_ID_BYTES + 1);
        assert_matches!(validate_worker_id(&long), Err(CoreError::Validation(_)));
    }
}
