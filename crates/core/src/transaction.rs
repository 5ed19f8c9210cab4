//! # Transaction Module
//!
//! Định nghĩa SettlementTransaction - bản ghi append-only cho mọi thay đổi
//! số dư (cashout, cashout_reversal). Metadata là cấu trúc đóng, có version,
//! thay vì key/value tùy ý.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version hiện tại của metadata layout
pub const METADATA_VERSION: u8 = 1;

/// Loại transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Đổi token ra tiền mặt
    Cashout,
    /// Hoàn lại một cashout đã completed
    CashoutReversal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Cashout => "cashout",
            TransactionType::CashoutReversal => "cashout_reversal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cashout" => Some(TransactionType::Cashout),
            "cashout_reversal" => Some(TransactionType::CashoutReversal),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trạng thái transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    /// Cashout đã bị void bởi một reversal
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit fields của một cashout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashoutMetadata {
    pub version: u8,
    pub store_id: String,
    pub staff_id: String,
    /// `tokens_per_dollar` của config đã dùng
    pub exchange_rate_used: Decimal,
    /// ID config đã dùng ("default" nếu là fallback)
    pub rate_config_id: String,
    pub balance_before: i64,
    pub balance_after: i64,
    pub venue_commission_percent: Decimal,
    pub venue_commission: Decimal,
    pub cash_to_customer: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Audit fields của một reversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalMetadata {
    pub version: u8,
    pub original_transaction_id: String,
    pub reversed_by: String,
    pub reason: String,
    pub balance_before: i64,
    pub balance_after: i64,
}

/// Metadata theo từng loại transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementMetadata {
    Cashout(CashoutMetadata),
    Reversal(ReversalMetadata),
}

impl SettlementMetadata {
    pub fn balance_before(&self) -> i64 {
        match self {
            SettlementMetadata::Cashout(m) => m.balance_before,
            SettlementMetadata::Reversal(m) => m.balance_before,
        }
    }

    pub fn balance_after(&self) -> i64 {
        match self {
            SettlementMetadata::Cashout(m) => m.balance_after,
            SettlementMetadata::Reversal(m) => m.balance_after,
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            SettlementMetadata::Cashout(m) => m.version,
            SettlementMetadata::Reversal(m) => m.version,
        }
    }
}

/// Liên kết reversal gắn vào cashout gốc khi bị void.
///
/// Đây là trường duy nhất được thêm vào sau khi transaction đã ghi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalLink {
    pub reversal_transaction_id: String,
    pub reversed_by: String,
    pub reason: String,
    pub reversed_at: DateTime<Utc>,
}

/// Bản ghi append-only cho một thay đổi số dư.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTransaction {
    pub id: String,
    pub customer_id: String,
    pub tx_type: TransactionType,
    pub token_amount: i64,
    pub usd_amount: Decimal,
    pub status: TransactionStatus,
    /// Idempotency/reference id trả về cho caller
    pub reference_id: String,
    pub store_id: Option<String>,
    /// Staff thực hiện cashout, hoặc actor thực hiện reversal
    pub actor_id: String,
    pub metadata: SettlementMetadata,
    pub reversal: Option<ReversalLink>,
    pub created_at: DateTime<Utc>,
}

impl SettlementTransaction {
    /// Cashout completed và chưa bị reverse
    pub fn is_reversible(&self) -> bool {
        self.tx_type == TransactionType::Cashout
            && self.status == TransactionStatus::Completed
            && self.reversal.is_none()
    }

    pub fn cashout_metadata(&self) -> Option<&CashoutMetadata> {
        match &self.metadata {
            SettlementMetadata::Cashout(m) => Some(m),
            SettlementMetadata::Reversal(_) => None,
        }
    }
}
