//! Shared service context
//!
//! Holds database access, the audit journal, engine configuration and the
//! clock every service reads "now" from.

use cashpoint_core::{EngineConfig, Event};
use cashpoint_persistence::{Database, EventStore};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Context for business operations - contains database access
pub struct ServiceContext {
    pool: SqlitePool,
    events: Arc<EventStore>,
    config: EngineConfig,
    fixed_now: Option<DateTime<Utc>>,
}

impl ServiceContext {
    /// Create new service context from database
    pub fn new(db: &Database, config: EngineConfig) -> Self {
        Self::from_parts(db.pool().clone(), db.events(), config)
    }

    /// Create from pool and event store directly
    pub fn from_parts(pool: SqlitePool, events: Arc<EventStore>, config: EngineConfig) -> Self {
        Self {
            pool,
            events,
            config,
            fixed_now: None,
        }
    }

    /// Pin the clock (tests, backfills)
    pub fn with_fixed_time(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    /// Get database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get event store
    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    /// Generate next event ID
    pub fn next_event_id(&self) -> String {
        self.events.next_event_id()
    }

    /// New record id, e.g. `TX_3f2a...`
    pub fn new_id(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }

    /// Append a committed action to the journal.
    ///
    /// The database commit already happened and is authoritative, so a
    /// journal failure is logged and swallowed.
    pub fn journal(&self, event: Event) {
        let event = event.at(self.now());
        if let Err(err) = self.events.append(&event) {
            warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                error = %err,
                "journal append failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_fixed_clock_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePoolOptions::new().connect_lazy("sqlite::memory:").unwrap();
        let events = Arc::new(EventStore::new(dir.path()).unwrap());
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();

        let ctx = ServiceContext::from_parts(pool, events, EngineConfig::default())
            .with_fixed_time(at);

        assert_eq!(ctx.now(), at);
        assert_eq!(ctx.next_event_id(), "EVT_000001");
        let id = ctx.new_id("TX");
        assert!(id.starts_with("TX_"));
        assert_ne!(id, ctx.new_id("TX"));
    }
}
