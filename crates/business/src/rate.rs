//! Rate config operations
//!
//! RateConfigService owns the single-active-config invariant: activating a
//! new config and closing the previous one happen in one SQLite transaction.

use crate::error::{SettlementError, SettlementResult};
use crate::services::ServiceContext;
use cashpoint_core::{ConfigSource, EffectiveRate, Event, EventType, NewRateConfig, RateConfig};
use cashpoint_persistence::RateConfigRepo;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Rate Config Service - exchange rate and cashout limits
pub struct RateConfigService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RateConfigService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Active config whose window contains `as_of`
    pub async fn get_current(&self, as_of: DateTime<Utc>) -> SettlementResult<RateConfig> {
        RateConfigRepo::current_as_of(self.ctx.pool(), as_of)
            .await?
            .ok_or_else(|| SettlementError::not_found("RateConfig", &as_of.to_rfc3339()))
    }

    /// Effective config at `as_of`, falling back to the configured defaults.
    ///
    /// The returned `source` tells the caller which one it got.
    pub async fn get_current_exchange_rate(
        &self,
        as_of: DateTime<Utc>,
    ) -> SettlementResult<EffectiveRate> {
        match RateConfigRepo::current_as_of(self.ctx.pool(), as_of).await? {
            Some(config) => Ok(EffectiveRate {
                config,
                source: ConfigSource::Stored,
            }),
            None => {
                warn!(as_of = %as_of, "no active rate config, using defaults");
                Ok(EffectiveRate {
                    config: RateConfig::fallback(self.ctx.config().default_rates, as_of),
                    source: ConfigSource::Defaults,
                })
            }
        }
    }

    /// Deactivate every active config and activate a new one, atomically
    pub async fn create_config(
        &self,
        data: NewRateConfig,
        actor_id: &str,
    ) -> SettlementResult<RateConfig> {
        if actor_id.trim().is_empty() {
            return Err(SettlementError::validation("actor_id is required"));
        }
        data.validate()?;

        let now = self.ctx.now();
        let config = data.into_config(self.ctx.new_id("RC"), actor_id, now);

        let mut tx = self.ctx.pool().begin().await?;
        let closed = RateConfigRepo::deactivate_all(&mut *tx, now).await?;
        RateConfigRepo::insert(&mut *tx, &config).await?;
        tx.commit().await?;

        info!(
            config_id = %config.id,
            tokens_per_dollar = %config.tokens_per_dollar,
            effective_from = %config.effective_from,
            closed,
            "rate config activated"
        );

        self.ctx.journal(
            Event::new(
                self.ctx.next_event_id(),
                EventType::RateConfigActivated,
                actor_id,
                &config.id,
            )
            .with_record(&config.id)
            .with_description(&format!(
                "{} tokens/$, cashout ${}-${}",
                config.tokens_per_dollar, config.min_cashout, config.max_cashout_per_transaction
            )),
        );

        Ok(config)
    }

    /// Every config ever created, newest first
    pub async fn history(&self) -> SettlementResult<Vec<RateConfig>> {
        Ok(RateConfigRepo::list_all(self.ctx.pool()).await?)
    }
}
