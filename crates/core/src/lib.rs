//! # Cashpoint Core
//!
//! Domain types cho token-to-cash settlement và venue reconciliation.
//! Crate này không làm I/O: chỉ có types, state machines và phép tính tiền.
//!
//! - [`RateConfig`] - tỷ giá token/USD và các hạn mức cashout
//! - [`LedgerAccount`] - số dư token của customer
//! - [`SettlementTransaction`] - bản ghi append-only cho mọi thay đổi số dư
//! - [`ReconciliationLedger`] - đối soát doanh thu venue theo ngày
//! - [`Event`] - audit journal (JSONL)

pub mod account;
pub mod config;
pub mod error;
pub mod event;
pub mod money;
pub mod rate;
pub mod reconciliation;
pub mod transaction;

pub use account::LedgerAccount;
pub use config::{EngineConfig, RateDefaults};
pub use error::{CoreError, CoreResult};
pub use event::{Event, EventType};
pub use money::{percent_of, round_usd, CashoutBreakdown};
pub use rate::{ConfigSource, EffectiveRate, NewRateConfig, RateConfig, DEFAULT_CONFIG_ID};
pub use reconciliation::{
    assess_fee, FeeAssessment, ReconciliationLedger, ReconciliationNote, ReconciliationStatus,
    SettlementStatus,
};
pub use transaction::{
    CashoutMetadata, ReversalLink, ReversalMetadata, SettlementMetadata, SettlementTransaction,
    TransactionStatus, TransactionType, METADATA_VERSION,
};
