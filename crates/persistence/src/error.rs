//! # Persistence Errors
//!
//! Error types cho persistence layer, wrapping sqlx và IO errors.

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    // === Event store errors ===
    #[error("Event store IO error: {0}")]
    EventStoreIo(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Conversion errors ===
    #[error("Invalid decimal value: {field} = {value}")]
    InvalidDecimal { field: String, value: String },

    #[error("Invalid enum value: {field} = {value}")]
    InvalidEnumValue { field: String, value: String },
}

/// Result type alias cho PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    /// Tạo NotFound error
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Tạo InvalidEnumValue error
    pub fn invalid_enum(field: &str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Kiểm tra có phải lỗi not found không
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Kiểm tra có phải lỗi unique constraint không
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::UniqueViolation(_) => true,
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Lỗi hạ tầng tạm thời (lock, IO, pool) mà retry nguyên vẹn có thể thành công.
    ///
    /// Constraint violations và dữ liệu hỏng (decimal, enum, JSON) không phải.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => {
                matches!(db.kind(), sqlx::error::ErrorKind::Other)
            }
            Self::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Protocol(_)
            ),
            Self::EventStoreIo(_) => true,
            _ => false,
        }
    }

    /// Chuyển lỗi unique constraint của sqlx thành `UniqueViolation`
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::UniqueViolation(what.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PersistenceError::not_found("Customer", "CUST_404");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Record not found: Customer with id CUST_404");
    }

    #[test]
    fn test_unique_violation_check() {
        let err = PersistenceError::UniqueViolation("reconciliation STORE_1/2026-03-01".into());
        assert!(err.is_unique_violation());
        assert!(!PersistenceError::not_found("Venue", "V").is_unique_violation());
    }
}
