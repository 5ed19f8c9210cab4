//! # Account Module
//!
//! Định nghĩa LedgerAccount - số dư token nội bộ của customer.
//! Số dư chỉ thay đổi qua các conditional atomic write ở persistence layer,
//! không bao giờ read-then-write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Số dư token của customer.
///
/// Invariant: `balance >= 0` tại mọi thời điểm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAccount {
    /// ID customer (CUST_001, ...)
    pub customer_id: String,
    /// Tên hiển thị
    pub name: String,
    /// Số token hiện có
    pub balance: i64,
    /// Tổng USD đã cashout (trọn đời)
    pub total_withdrawn: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerAccount {
    /// Tạo account mới với số dư 0
    pub fn new(customer_id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            customer_id: customer_id.to_string(),
            name: name.to_string(),
            balance: 0,
            total_withdrawn: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} tokens, ${} withdrawn",
            self.customer_id, self.name, self.balance, self.total_withdrawn
        )
    }
}
