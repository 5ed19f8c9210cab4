//! Database schema definitions
//!
//! DDL và row types cho sqlx mapping từ SQLite tables.
//! Decimal được lưu dạng TEXT để giữ nguyên precision.

use crate::error::{PersistenceError, PersistenceResult};
use cashpoint_core::{
    LedgerAccount, RateConfig, ReconciliationLedger, ReconciliationNote, ReconciliationStatus,
    ReversalLink, SettlementMetadata, SettlementStatus, SettlementTransaction, TransactionStatus,
    TransactionType,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// DDL statements, chạy theo thứ tự. Tất cả đều idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS rate_configs (
        id TEXT PRIMARY KEY,
        tokens_per_dollar TEXT NOT NULL,
        min_cashout TEXT NOT NULL,
        max_cashout_per_transaction TEXT NOT NULL,
        daily_limit_per_customer TEXT NOT NULL,
        daily_limit_per_staff TEXT NOT NULL,
        venue_commission_percent TEXT NOT NULL,
        effective_from DATETIME NOT NULL,
        effective_to DATETIME,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_by TEXT NOT NULL,
        created_at DATETIME NOT NULL
    )
    "#,
    // At most one active config, enforced by the database itself
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_rate_configs_single_active
    ON rate_configs(is_active) WHERE is_active = 1
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
        total_withdrawn TEXT NOT NULL DEFAULT '0',
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS venues (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        fee_percentage TEXT NOT NULL,
        created_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settlement_transactions (
        id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL,
        tx_type TEXT NOT NULL,
        token_amount INTEGER NOT NULL,
        usd_amount TEXT NOT NULL,
        status TEXT NOT NULL,
        reference_id TEXT NOT NULL UNIQUE,
        store_id TEXT,
        actor_id TEXT NOT NULL,
        metadata TEXT NOT NULL,
        reversal_transaction_id TEXT,
        reversed_by TEXT,
        reversal_reason TEXT,
        reversed_at DATETIME,
        created_at DATETIME NOT NULL,
        FOREIGN KEY (customer_id) REFERENCES customers(id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_settlement_customer_day
    ON settlement_transactions(customer_id, tx_type, status, created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_settlement_actor_day
    ON settlement_transactions(actor_id, tx_type, status, created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reconciliation_ledger (
        id TEXT PRIMARY KEY,
        store_id TEXT NOT NULL,
        reconciliation_date DATE NOT NULL,
        venue_gaming_revenue TEXT NOT NULL,
        software_fee_percentage TEXT NOT NULL,
        expected_software_fee TEXT NOT NULL,
        actual_software_fee TEXT,
        variance TEXT,
        variance_percentage TEXT,
        compliance_score TEXT,
        reconciliation_status TEXT NOT NULL DEFAULT 'pending',
        settlement_status TEXT NOT NULL DEFAULT 'unsettled',
        submitted_by TEXT NOT NULL,
        submitted_at DATETIME NOT NULL,
        approved_by TEXT,
        approved_at DATETIME,
        flagged_reason TEXT,
        resolved_by TEXT,
        resolved_at DATETIME,
        payment_sent_at DATETIME,
        amount_sent TEXT,
        payment_method TEXT,
        payment_sent_by TEXT,
        payment_received_at DATETIME,
        amount_received TEXT,
        payment_confirmed_by TEXT,
        updated_at DATETIME NOT NULL,
        UNIQUE (store_id, reconciliation_date),
        FOREIGN KEY (store_id) REFERENCES venues(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reconciliation_notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        reconciliation_id TEXT NOT NULL,
        action TEXT NOT NULL,
        actor_id TEXT NOT NULL,
        note TEXT NOT NULL,
        created_at DATETIME NOT NULL,
        FOREIGN KEY (reconciliation_id) REFERENCES reconciliation_ledger(id)
    )
    "#,
];

/// Parse Decimal lưu dạng TEXT
pub(crate) fn parse_decimal(field: &str, value: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(value).map_err(|_| PersistenceError::InvalidDecimal {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_optional_decimal(field: &str, value: Option<&str>) -> PersistenceResult<Option<Decimal>> {
    value.map(|v| parse_decimal(field, v)).transpose()
}

/// Row type cho bảng `rate_configs`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RateConfigRow {
    pub id: String,
    pub tokens_per_dollar: String,
    pub min_cashout: String,
    pub max_cashout_per_transaction: String,
    pub daily_limit_per_customer: String,
    pub daily_limit_per_staff: String,
    pub venue_commission_percent: String,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `customers`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub total_withdrawn: String, // Decimal stored as TEXT
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row type cho bảng `venues`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct VenueRow {
    pub id: String,
    pub name: String,
    pub fee_percentage: String,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `settlement_transactions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: String,
    pub customer_id: String,
    pub tx_type: String,
    pub token_amount: i64,
    pub usd_amount: String,
    pub status: String,
    pub reference_id: String,
    pub store_id: Option<String>,
    pub actor_id: String,
    pub metadata: String, // SettlementMetadata as JSON
    pub reversal_transaction_id: Option<String>,
    pub reversed_by: Option<String>,
    pub reversal_reason: Option<String>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `reconciliation_ledger`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub id: String,
    pub store_id: String,
    pub reconciliation_date: NaiveDate,
    pub venue_gaming_revenue: String,
    pub software_fee_percentage: String,
    pub expected_software_fee: String,
    pub actual_software_fee: Option<String>,
    pub variance: Option<String>,
    pub variance_percentage: Option<String>,
    pub compliance_score: Option<String>,
    pub reconciliation_status: String,
    pub settlement_status: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub flagged_reason: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub payment_sent_at: Option<DateTime<Utc>>,
    pub amount_sent: Option<String>,
    pub payment_method: Option<String>,
    pub payment_sent_by: Option<String>,
    pub payment_received_at: Option<DateTime<Utc>>,
    pub amount_received: Option<String>,
    pub payment_confirmed_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Row type cho bảng `reconciliation_notes`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct NoteRow {
    pub id: i64,
    pub reconciliation_id: String,
    pub action: String,
    pub actor_id: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

// === Conversion implementations ===

impl TryFrom<RateConfigRow> for RateConfig {
    type Error = PersistenceError;

    fn try_from(row: RateConfigRow) -> PersistenceResult<Self> {
        Ok(Self {
            tokens_per_dollar: parse_decimal("tokens_per_dollar", &row.tokens_per_dollar)?,
            min_cashout: parse_decimal("min_cashout", &row.min_cashout)?,
            max_cashout_per_transaction: parse_decimal(
                "max_cashout_per_transaction",
                &row.max_cashout_per_transaction,
            )?,
            daily_limit_per_customer: parse_decimal(
                "daily_limit_per_customer",
                &row.daily_limit_per_customer,
            )?,
            daily_limit_per_staff: parse_decimal(
                "daily_limit_per_staff",
                &row.daily_limit_per_staff,
            )?,
            venue_commission_percent: parse_decimal(
                "venue_commission_percent",
                &row.venue_commission_percent,
            )?,
            id: row.id,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CustomerRow> for LedgerAccount {
    type Error = PersistenceError;

    fn try_from(row: CustomerRow) -> PersistenceResult<Self> {
        Ok(Self {
            total_withdrawn: parse_decimal("total_withdrawn", &row.total_withdrawn)?,
            customer_id: row.id,
            name: row.name,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl VenueRow {
    pub fn fee_percentage(&self) -> PersistenceResult<Decimal> {
        parse_decimal("fee_percentage", &self.fee_percentage)
    }
}

impl TryFrom<TransactionRow> for SettlementTransaction {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> PersistenceResult<Self> {
        let tx_type = TransactionType::from_str(&row.tx_type)
            .ok_or_else(|| PersistenceError::invalid_enum("tx_type", &row.tx_type))?;
        let status = TransactionStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?;
        let metadata: SettlementMetadata = serde_json::from_str(&row.metadata)?;

        let reversal = match (
            row.reversal_transaction_id,
            row.reversed_by,
            row.reversal_reason,
            row.reversed_at,
        ) {
            (Some(reversal_transaction_id), Some(reversed_by), Some(reason), Some(reversed_at)) => {
                Some(ReversalLink {
                    reversal_transaction_id,
                    reversed_by,
                    reason,
                    reversed_at,
                })
            }
            _ => None,
        };

        Ok(Self {
            usd_amount: parse_decimal("usd_amount", &row.usd_amount)?,
            id: row.id,
            customer_id: row.customer_id,
            tx_type,
            token_amount: row.token_amount,
            status,
            reference_id: row.reference_id,
            store_id: row.store_id,
            actor_id: row.actor_id,
            metadata,
            reversal,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ReconciliationRow> for ReconciliationLedger {
    type Error = PersistenceError;

    fn try_from(row: ReconciliationRow) -> PersistenceResult<Self> {
        let reconciliation_status = ReconciliationStatus::from_str(&row.reconciliation_status)
            .ok_or_else(|| {
                PersistenceError::invalid_enum("reconciliation_status", &row.reconciliation_status)
            })?;
        let settlement_status = SettlementStatus::from_str(&row.settlement_status).ok_or_else(
            || PersistenceError::invalid_enum("settlement_status", &row.settlement_status),
        )?;

        Ok(Self {
            venue_gaming_revenue: parse_decimal("venue_gaming_revenue", &row.venue_gaming_revenue)?,
            software_fee_percentage: parse_decimal(
                "software_fee_percentage",
                &row.software_fee_percentage,
            )?,
            expected_software_fee: parse_decimal(
                "expected_software_fee",
                &row.expected_software_fee,
            )?,
            actual_software_fee: parse_optional_decimal(
                "actual_software_fee",
                row.actual_software_fee.as_deref(),
            )?,
            variance: parse_optional_decimal("variance", row.variance.as_deref())?,
            variance_percentage: parse_optional_decimal(
                "variance_percentage",
                row.variance_percentage.as_deref(),
            )?,
            compliance_score: parse_optional_decimal(
                "compliance_score",
                row.compliance_score.as_deref(),
            )?,
            amount_sent: parse_optional_decimal("amount_sent", row.amount_sent.as_deref())?,
            amount_received: parse_optional_decimal(
                "amount_received",
                row.amount_received.as_deref(),
            )?,
            id: row.id,
            store_id: row.store_id,
            reconciliation_date: row.reconciliation_date,
            reconciliation_status,
            settlement_status,
            submitted_by: row.submitted_by,
            submitted_at: row.submitted_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            flagged_reason: row.flagged_reason,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            payment_sent_at: row.payment_sent_at,
            payment_method: row.payment_method,
            payment_sent_by: row.payment_sent_by,
            payment_received_at: row.payment_received_at,
            payment_confirmed_by: row.payment_confirmed_by,
            updated_at: row.updated_at,
        })
    }
}

impl From<NoteRow> for ReconciliationNote {
    fn from(row: NoteRow) -> Self {
        Self {
            id: row.id,
            reconciliation_id: row.reconciliation_id,
            action: row.action,
            actor_id: row.actor_id,
            note: row.note,
            created_at: row.created_at,
        }
    }
}
