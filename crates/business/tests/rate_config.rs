mod common;

use cashpoint_business::{RateConfigService, SettlementError};
use cashpoint_core::{ConfigSource, EventType, NewRateConfig};
use cashpoint_persistence::RateConfigRepo;
use chrono::Duration;
use common::{noon, standard_rates, Harness};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[tokio::test]
async fn test_no_config_uses_defaults() {
    let h = Harness::new().await;
    let service = RateConfigService::new(&h.ctx);

    let err = service.get_current(noon()).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound { .. }), "{err}");

    let effective = service.get_current_exchange_rate(noon()).await.unwrap();
    assert_eq!(effective.source, ConfigSource::Defaults);
    assert!(effective.is_default());
    assert_eq!(effective.config.tokens_per_dollar, dec!(1000));
    assert_eq!(effective.config.min_cashout, dec!(5));
}

#[tokio::test]
async fn test_new_config_replaces_active_one() {
    let h = Harness::new().await;

    let first = h.rates(standard_rates()).await;
    assert_eq!(RateConfigRepo::count_active(h.db.pool()).await.unwrap(), 1);

    let later = h.at(noon() + Duration::hours(3));
    let second = RateConfigService::new(&later)
        .create_config(
            NewRateConfig {
                tokens_per_dollar: dec!(800),
                ..standard_rates()
            },
            "ADMIN",
        )
        .await
        .unwrap();
    assert_eq!(RateConfigRepo::count_active(h.db.pool()).await.unwrap(), 1);

    let service = RateConfigService::new(&later);
    let current = service.get_current(later.now()).await.unwrap();
    assert_eq!(current.id, second.id);
    assert_eq!(current.tokens_per_dollar, dec!(800));

    let effective = service.get_current_exchange_rate(later.now()).await.unwrap();
    assert_eq!(effective.source, ConfigSource::Stored);

    let history = service.history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[1].id, first.id);
    assert!(!history[1].is_active);
    assert_eq!(history[1].effective_to, Some(later.now()));

    // Only the new config's window covers now; the old one closed at activation
    assert!(history[0].is_effective_at(later.now()));
    assert!(!history[1].is_effective_at(later.now()));
    assert!(!history[1].is_effective_at(noon()));
}

#[tokio::test]
async fn test_invalid_configs_rejected() {
    let h = Harness::new().await;
    let service = RateConfigService::new(&h.ctx);

    let cases = [
        NewRateConfig {
            tokens_per_dollar: dec!(0),
            ..standard_rates()
        },
        NewRateConfig {
            min_cashout: dec!(-1),
            ..standard_rates()
        },
        NewRateConfig {
            daily_limit_per_staff: dec!(0),
            ..standard_rates()
        },
        NewRateConfig {
            venue_commission_percent: dec!(150),
            ..standard_rates()
        },
    ];
    for data in cases {
        let err = service.create_config(data, "ADMIN").await.unwrap_err();
        assert!(matches!(err, SettlementError::Validation(_)), "{err}");
    }

    let err = service
        .create_config(standard_rates(), " ")
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)), "{err}");

    assert!(service.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_future_config_leaves_defaults_until_effective() {
    let h = Harness::new().await;
    let service = RateConfigService::new(&h.ctx);

    let starts = noon() + Duration::days(1);
    service
        .create_config(
            NewRateConfig {
                tokens_per_dollar: dec!(500),
                effective_from: Some(starts),
                ..standard_rates()
            },
            "ADMIN",
        )
        .await
        .unwrap();

    let now = service.get_current_exchange_rate(noon()).await.unwrap();
    assert!(now.is_default());

    let then = service.get_current_exchange_rate(starts).await.unwrap();
    assert_eq!(then.source, ConfigSource::Stored);
    assert_eq!(then.config.tokens_per_dollar, dec!(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_activation_keeps_one_active() {
    let h = Harness::new().await;
    let ctx = Arc::new(h.at(noon()));

    let mut handles = Vec::new();
    for rate in [500, 600, 700, 800, 900] {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            RateConfigService::new(&ctx)
                .create_config(
                    NewRateConfig {
                        tokens_per_dollar: rate.into(),
                        ..standard_rates()
                    },
                    "ADMIN",
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(RateConfigRepo::count_active(h.db.pool()).await.unwrap(), 1);
    assert_eq!(RateConfigRepo::list_all(h.db.pool()).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_activation_is_journaled() {
    let h = Harness::new().await;
    let config = h.rates(standard_rates()).await;

    let events = h.db.event_reader().read_all().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::RateConfigActivated);
    assert_eq!(events[0].record_id.as_deref(), Some(config.id.as_str()));
    assert_eq!(events[0].actor_id, "ADMIN");
}
