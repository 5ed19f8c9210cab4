//! Rate config commands

use anyhow::Result;
use cashpoint_business::{RateConfigService, ServiceContext};
use cashpoint_core::{NewRateConfig, RateConfig};

use crate::ConfigAction;

pub async fn handle(ctx: &ServiceContext, action: ConfigAction) -> Result<()> {
    let service = RateConfigService::new(ctx);

    match action {
        ConfigAction::Create {
            tokens_per_dollar,
            min,
            max,
            customer_daily,
            staff_daily,
            commission,
            effective_from,
            by,
        } => {
            let data = NewRateConfig {
                tokens_per_dollar,
                min_cashout: min,
                max_cashout_per_transaction: max,
                daily_limit_per_customer: customer_daily,
                daily_limit_per_staff: staff_daily,
                venue_commission_percent: commission,
                effective_from,
            };
            let config = service.create_config(data, &by).await?;
            println!("✅ Rate config activated: {}", config.id);
            print_config(&config);
        }

        ConfigAction::Show => {
            let rate = service.get_current_exchange_rate(ctx.now()).await?;
            if rate.is_default() {
                println!("⚠️  No active rate config, using built-in defaults");
            } else {
                println!("💱 Current rate config: {}", rate.config.id);
            }
            print_config(&rate.config);
        }

        ConfigAction::History => {
            let configs = service.history().await?;
            if configs.is_empty() {
                println!("📭 No rate configs yet");
                return Ok(());
            }

            let now = ctx.now();
            println!("📜 Rate config history (● in effect, ◌ scheduled):");
            for config in configs {
                let marker = if config.is_effective_at(now) {
                    "●"
                } else if config.is_active {
                    "◌"
                } else {
                    "○"
                };
                println!(
                    "   {} {} | {} tokens/$ | ${}-${} | from {} | by {}",
                    marker,
                    config.id,
                    config.tokens_per_dollar,
                    config.min_cashout,
                    config.max_cashout_per_transaction,
                    config.effective_from.format("%Y-%m-%d %H:%M"),
                    config.created_by
                );
            }
        }
    }

    Ok(())
}

fn print_config(config: &RateConfig) {
    println!("   Tokens per dollar:   {}", config.tokens_per_dollar);
    println!("   Min cashout:         ${}", config.min_cashout);
    println!("   Max per transaction: ${}", config.max_cashout_per_transaction);
    println!("   Customer daily:      ${}", config.daily_limit_per_customer);
    println!("   Staff daily:         ${}", config.daily_limit_per_staff);
    println!("   Venue commission:    {}%", config.venue_commission_percent);
    println!(
        "   Effective from:      {}",
        config.effective_from.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
