//! # Cashpoint Persistence
//!
//! Persistence layer cho Cashpoint - SQLite (state) + JSONL audit journal.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Database                               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐ │
//! │  │   SQLite    │    │    JSONL    │    │     Repos       │ │
//! │  │  (state)    │    │  (journal)  │    │   (queries)     │ │
//! │  └─────────────┘    └─────────────┘    └─────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cashpoint_persistence::{Database, CustomerRepo};
//!
//! let db = Database::new("sqlite:cashpoint.db", "data/journal").await?;
//! let customer = CustomerRepo::get_by_id(db.pool(), "CUST_001").await?;
//! ```

pub mod error;
pub mod events;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use events::{EventFilter, EventReader, EventStore, JournalSummary};
pub use sqlite::schema::{
    CustomerRow, NoteRow, RateConfigRow, ReconciliationRow, TransactionRow, VenueRow,
};
pub use sqlite::{
    create_pool, init_database, CustomerRepo, FeeUpdate, NoteRepo, PaymentReceived, PaymentSent,
    RateConfigRepo, ReconciliationRepo, TransactionRepo, VenueRepo,
};

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

/// Database facade - unified access to SQLite + journal
pub struct Database {
    pool: SqlitePool,
    event_store: Arc<EventStore>,
}

impl Database {
    /// Mở database và tạo schema nếu chưa có
    ///
    /// # Arguments
    /// * `db_url` - SQLite database URL (e.g., "sqlite:cashpoint.db")
    /// * `journal_path` - Thư mục chứa JSONL journal
    pub async fn new<Q: AsRef<Path>>(db_url: &str, journal_path: Q) -> PersistenceResult<Self> {
        let pool = init_database(db_url).await?;
        let event_store = Arc::new(EventStore::new(journal_path)?);

        Ok(Self { pool, event_store })
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get event store
    pub fn events(&self) -> Arc<EventStore> {
        Arc::clone(&self.event_store)
    }

    /// Event reader for auditing
    pub fn event_reader(&self) -> EventReader {
        EventReader::new(self.event_store.base_path())
    }
}
