//! Customer account commands

use anyhow::Result;
use cashpoint_business::{CashoutService, LedgerService, ServiceContext};

use crate::CustomerAction;

pub async fn handle(ctx: &ServiceContext, action: CustomerAction) -> Result<()> {
    let ledger = LedgerService::new(ctx);

    match action {
        CustomerAction::Add { customer_id, name } => {
            let account = ledger.open_account(&customer_id, &name).await?;
            println!("✅ Account opened: {} ({})", account.customer_id, account.name);
        }

        CustomerAction::Credit {
            customer_id,
            tokens,
        } => {
            let balance = ledger.credit_rewards(&customer_id, tokens).await?;
            println!("💰 Credited {} tokens to {}", tokens, customer_id);
            println!("   Balance: {} tokens", balance);
        }

        CustomerAction::Show { customer_id, staff } => {
            let account = ledger.get_balance(&customer_id).await?;
            let today = ctx.config().business_date(ctx.now());
            let totals = CashoutService::new(ctx)
                .daily_totals(&customer_id, &staff, today)
                .await?;

            println!("👤 {} ({})", account.customer_id, account.name);
            println!("   Balance:         {} tokens", account.balance);
            println!("   Total withdrawn: ${}", account.total_withdrawn);
            println!("   Cashed out {}: ${}", totals.date, totals.customer_usd);
            println!("   Remaining today: ${}", totals.customer_remaining);
        }

        CustomerAction::History { customer_id, limit } => {
            let transactions = CashoutService::new(ctx)
                .list_customer_transactions(&customer_id, limit)
                .await?;
            if transactions.is_empty() {
                println!("📭 No transactions for {}", customer_id);
                return Ok(());
            }

            println!("📜 Transactions for {}:", customer_id);
            for tx in transactions {
                let reversed = if tx.reversal.is_some() { " (reversed)" } else { "" };
                println!(
                    "   {} | {} | {} | {} tokens | ${} | {}{}",
                    tx.created_at.format("%Y-%m-%d %H:%M:%S"),
                    tx.id,
                    tx.tx_type,
                    tx.token_amount,
                    tx.usd_amount,
                    tx.status,
                    reversed
                );
            }
        }
    }

    Ok(())
}
