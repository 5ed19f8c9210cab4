//! # Cashpoint Business
//!
//! Business logic layer - rate configs, cashouts and reversals, venue
//! reconciliation. Each service borrows a shared [`ServiceContext`].
//!
//! ```rust,ignore
//! let ctx = ServiceContext::new(&db, EngineConfig::default());
//! let receipt = CashoutService::new(&ctx)
//!     .process_cashout(CashoutRequest::new("CUST_001", 6_000, "STORE_01", "STAFF_01"))
//!     .await?;
//! ```

pub mod cashout;
pub mod error;
pub mod ledger;
pub mod rate;
pub mod reconciliation;
pub mod services;

pub use cashout::{CashoutReceipt, CashoutRequest, CashoutService, DailyTotals, ReversalReceipt};
pub use error::{SettlementError, SettlementResult};
pub use ledger::LedgerService;
pub use rate::RateConfigService;
pub use reconciliation::{ComplianceSummary, ReconciliationService};
pub use services::ServiceContext;
