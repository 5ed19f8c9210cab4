#![allow(dead_code)]

use cashpoint_business::{LedgerService, RateConfigService, ReconciliationService, ServiceContext};
use cashpoint_core::{EngineConfig, NewRateConfig, RateConfig};
use cashpoint_persistence::Database;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

/// File-backed database and journal in a temp dir
pub struct Harness {
    _dir: TempDir,
    pub db: Database,
    pub ctx: ServiceContext,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("cashpoint.db").display());
        let db = Database::new(&url, dir.path().join("journal")).await.unwrap();
        let ctx = ServiceContext::new(&db, config).with_fixed_time(noon());
        Self { _dir: dir, db, ctx }
    }

    /// Another context on the same database, pinned to `at`
    pub fn at(&self, at: DateTime<Utc>) -> ServiceContext {
        ServiceContext::new(&self.db, self.ctx.config().clone()).with_fixed_time(at)
    }

    pub async fn customer(&self, id: &str, tokens: i64) {
        let ledger = LedgerService::new(&self.ctx);
        ledger.open_account(id, id).await.unwrap();
        if tokens > 0 {
            ledger.credit_rewards(id, tokens).await.unwrap();
        }
    }

    pub async fn venue(&self, id: &str, fee_percentage: Decimal) {
        ReconciliationService::new(&self.ctx)
            .register_venue(id, id, fee_percentage)
            .await
            .unwrap();
    }

    pub async fn rates(&self, data: NewRateConfig) -> RateConfig {
        RateConfigService::new(&self.ctx)
            .create_config(data, "ADMIN")
            .await
            .unwrap()
    }

    pub async fn balance(&self, id: &str) -> i64 {
        LedgerService::new(&self.ctx).get_balance(id).await.unwrap().balance
    }
}

/// 2026-10-16 12:00 UTC, the default clock of every harness
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
}

/// 1000 tokens per dollar, $5-$500 per cashout, $1000 per customer per day
pub fn standard_rates() -> NewRateConfig {
    NewRateConfig {
        tokens_per_dollar: dec!(1000),
        min_cashout: dec!(5),
        max_cashout_per_transaction: dec!(500),
        daily_limit_per_customer: dec!(1000),
        daily_limit_per_staff: dec!(5000),
        venue_commission_percent: dec!(0),
        effective_from: None,
    }
}
