//! # Error Module
//!
//! Định nghĩa các domain errors cho Cashpoint sử dụng thiserror.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
///
/// Các lỗi nghiệp vụ cốt lõi, không liên quan đến infrastructure.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Money errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid exchange rate: {0} tokens per dollar")]
    InvalidRate(Decimal),

    #[error("Percentage out of range [0, 100]: {field} = {value}")]
    PercentageOutOfRange { field: String, value: Decimal },

    // === Validation errors ===
    #[error("Validation error: {0}")]
    ValidationError(String),

    // === State machine errors ===
    #[error("Invalid {machine} transition: {from} -> {to}")]
    InvalidTransition {
        machine: &'static str,
        from: String,
        to: String,
    },
}

/// Result type alias với CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Tạo InvalidTransition error
    pub fn invalid_transition(machine: &'static str, from: &str, to: &str) -> Self {
        Self::InvalidTransition {
            machine,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Kiểm tra có phải lỗi state machine không
    pub fn is_transition_error(&self) -> bool {
        matches!(self, CoreError::InvalidTransition { .. })
    }
}
