//! Customer token accounts
//!
//! Opening accounts and crediting rewards belong to the surrounding
//! application; they are here so the engine can be seeded and operated
//! from the CLI and tests.

use crate::error::{SettlementError, SettlementResult};
use crate::services::ServiceContext;
use cashpoint_core::LedgerAccount;
use cashpoint_persistence::CustomerRepo;
use tracing::info;

/// Ledger Service - customer token balances
pub struct LedgerService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LedgerService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Open an account with a zero balance
    pub async fn open_account(&self, customer_id: &str, name: &str) -> SettlementResult<LedgerAccount> {
        if customer_id.trim().is_empty() {
            return Err(SettlementError::validation("customer_id is required"));
        }

        let mut account = LedgerAccount::new(customer_id, name);
        account.created_at = self.ctx.now();
        account.updated_at = account.created_at;

        CustomerRepo::insert(self.ctx.pool(), &account)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    SettlementError::DuplicateSubmission(format!("customer {}", customer_id))
                } else {
                    e.into()
                }
            })?;

        info!(customer_id, "account opened");
        Ok(account)
    }

    /// Credit reward tokens. Returns the new balance.
    pub async fn credit_rewards(&self, customer_id: &str, tokens: i64) -> SettlementResult<i64> {
        if tokens <= 0 {
            return Err(SettlementError::validation(format!(
                "reward tokens must be positive: {}",
                tokens
            )));
        }

        let balance =
            CustomerRepo::credit_tokens(self.ctx.pool(), customer_id, tokens, self.ctx.now())
                .await?;
        info!(customer_id, tokens, balance, "rewards credited");
        Ok(balance)
    }

    pub async fn get_balance(&self, customer_id: &str) -> SettlementResult<LedgerAccount> {
        Ok(CustomerRepo::get_by_id(self.ctx.pool(), customer_id).await?)
    }

    pub async fn list_accounts(&self) -> SettlementResult<Vec<LedgerAccount>> {
        Ok(CustomerRepo::get_all(self.ctx.pool()).await?)
    }
}
