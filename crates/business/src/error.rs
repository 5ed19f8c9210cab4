//! Business layer errors
//!
//! Every failure is scoped to one request and surfaces as a typed
//! `SettlementError`; nothing here is fatal to the process.

use cashpoint_core::CoreError;
use cashpoint_persistence::PersistenceError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Settlement and reconciliation errors
#[derive(Debug, Error)]
pub enum SettlementError {
    // === Caller errors ===
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Limit exceeded: {limit} (requested {requested}, allowed {allowed})")]
    LimitExceeded {
        limit: String,
        requested: Decimal,
        allowed: Decimal,
    },

    #[error("Insufficient balance: required {required} tokens, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Duplicate submission: {0}")]
    DuplicateSubmission(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Transaction already reversed: {0}")]
    AlreadyReversed(String),

    #[error("Invalid {machine} transition: {from} -> {to}")]
    InvalidTransition {
        machine: String,
        from: String,
        to: String,
    },

    // === Infrastructure ===
    #[error("Persistence failure: {0}")]
    Persistence(#[source] PersistenceError),
}

/// Result type alias for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;

impl SettlementError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn limit_exceeded(limit: &str, requested: Decimal, allowed: Decimal) -> Self {
        Self::LimitExceeded {
            limit: limit.to_string(),
            requested,
            allowed,
        }
    }

    /// Only transient infrastructure failures may be retried unchanged;
    /// every operation is atomic so a retry never double-applies. Corrupt
    /// rows and constraint violations fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(err) if err.is_transient())
    }

    /// Stable code for the call boundary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::DuplicateSubmission(_) => "duplicate_submission",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyReversed(_) => "already_reversed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Persistence(_) => "persistence_failure",
        }
    }
}

impl From<CoreError> for SettlementError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { machine, from, to } => Self::InvalidTransition {
                machine: machine.to_string(),
                from,
                to,
            },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<PersistenceError> for SettlementError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Persistence(other),
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(PersistenceError::Database(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_exceeded_display() {
        let err = SettlementError::limit_exceeded("daily_limit_per_customer", dec!(50), dec!(20));
        assert!(err.to_string().contains("daily_limit_per_customer"));
        assert!(err.to_string().contains("requested 50"));
        assert_eq!(err.kind(), "limit_exceeded");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_core_error_mapping() {
        let err: SettlementError =
            CoreError::invalid_transition("reconciliation", "approved", "flagged").into();
        assert_eq!(err.kind(), "invalid_transition");

        let err: SettlementError = CoreError::InvalidRate(dec!(0)).into();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_persistence_error_mapping() {
        let err: SettlementError = PersistenceError::not_found("Customer", "CUST_404").into();
        assert!(matches!(err, SettlementError::NotFound { .. }));
        assert!(!err.is_retryable());

        let err: SettlementError = PersistenceError::UniqueViolation("x".to_string()).into();
        assert_eq!(err.kind(), "persistence_failure");
        assert!(!err.is_retryable());

        let err: SettlementError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind(), "persistence_failure");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_corrupt_rows_are_not_retryable() {
        for err in [
            PersistenceError::InvalidDecimal {
                field: "usd_amount".to_string(),
                value: "abc".to_string(),
            },
            PersistenceError::invalid_enum("status", "paused"),
        ] {
            let err: SettlementError = err.into();
            assert_eq!(err.kind(), "persistence_failure");
            assert!(!err.is_retryable(), "{err}");
        }

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: SettlementError = PersistenceError::EventStoreIo(io).into();
        assert!(err.is_retryable());
    }
}
