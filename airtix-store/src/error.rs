use airtix_core::CoreError;
use tracing::error;

/// SQLSTATE `string_data_right_truncation`: a value wider than its VARCHAR column.
const STRING_TOO_LONG: &str = "22001";

/// Maps driver errors onto the core taxonomy.
pub fn storage_error(err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::RowNotFound => CoreError::NotFound("Row not found".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CoreError::Conflict(db.constraint().unwrap_or("unique constraint").to_string())
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(STRING_TOO_LONG) => {
            CoreError::Validation(db.message().to_string())
        }
        other => {
            error!("Database error: {}", other);
            CoreError::Storage(other.to_string())
        }
    }
}

/// Like [`storage_error`], with a caller-supplied message for unique violations.
pub fn conflict_as(err: sqlx::Error, message: impl FnOnce() -> String) -> CoreError {
    match storage_error(err) {
        CoreError::Conflict(_) => CoreError::Conflict(message()),
        other => other,
    }
}
