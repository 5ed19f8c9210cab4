//! Cashout operations - token to cash, reversal, query surface
//!
//! CashoutService validates a request against the effective rate config,
//! then debits the balance and writes the transaction record inside one
//! SQLite transaction. The debit is a conditional UPDATE; the daily limit
//! checks before it are advisory.

use crate::error::{SettlementError, SettlementResult};
use crate::rate::RateConfigService;
use crate::services::ServiceContext;
use cashpoint_core::{
    CashoutBreakdown, CashoutMetadata, Event, LedgerAccount, ReversalLink, ReversalMetadata,
    SettlementMetadata, SettlementTransaction, TransactionStatus, TransactionType,
    DEFAULT_CONFIG_ID, METADATA_VERSION,
};
use cashpoint_persistence::{CustomerRepo, TransactionRepo};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// A staff-initiated cashout request
#[derive(Debug, Clone)]
pub struct CashoutRequest {
    pub customer_id: String,
    pub token_amount: i64,
    pub store_id: String,
    pub staff_id: String,
    pub notes: Option<String>,
    /// Caller idempotency key; generated when absent
    pub reference_id: Option<String>,
}

impl CashoutRequest {
    pub fn new(customer_id: &str, token_amount: i64, store_id: &str, staff_id: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            token_amount,
            store_id: store_id.to_string(),
            staff_id: staff_id.to_string(),
            notes: None,
            reference_id: None,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn with_reference(mut self, reference_id: &str) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }
}

/// Committed cashout
#[derive(Debug, Clone)]
pub struct CashoutReceipt {
    pub transaction: SettlementTransaction,
    /// Limits came from the hard-coded defaults, not a stored config
    pub used_default_rates: bool,
    /// An earlier commit with the same reference id was returned
    pub replayed: bool,
}

impl CashoutReceipt {
    fn from_transaction(transaction: SettlementTransaction, replayed: bool) -> Self {
        let used_default_rates = transaction
            .cashout_metadata()
            .map_or(false, |m| m.rate_config_id == DEFAULT_CONFIG_ID);
        Self {
            transaction,
            used_default_rates,
            replayed,
        }
    }

    pub fn reference_id(&self) -> &str {
        &self.transaction.reference_id
    }

    pub fn cash_to_customer(&self) -> Decimal {
        self.transaction
            .cashout_metadata()
            .map_or(self.transaction.usd_amount, |m| m.cash_to_customer)
    }

    pub fn balance_after(&self) -> i64 {
        self.transaction.metadata.balance_after()
    }
}

/// Committed reversal: the voided original and the compensating record
#[derive(Debug, Clone)]
pub struct ReversalReceipt {
    pub original: SettlementTransaction,
    pub reversal: SettlementTransaction,
}

/// Completed cashout totals for one business day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub customer_usd: Decimal,
    pub staff_usd: Decimal,
    pub customer_remaining: Decimal,
    pub staff_remaining: Decimal,
}

/// Cashout Service - handles token cashouts and reversals
pub struct CashoutService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> CashoutService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Convert `token_amount` tokens of a customer into cash.
    ///
    /// Either the debit and the transaction record both commit, or neither
    /// does. Retrying with the same `reference_id` returns the committed
    /// transaction instead of debiting again.
    pub async fn process_cashout(&self, req: CashoutRequest) -> SettlementResult<CashoutReceipt> {
        let pool = self.ctx.pool();

        if let Some(reference_id) = req.reference_id.as_deref() {
            if let Some(existing) = TransactionRepo::get_by_reference(pool, reference_id).await? {
                return Self::replay(&req, existing);
            }
        }

        for (field, value) in [
            ("customer_id", &req.customer_id),
            ("store_id", &req.store_id),
            ("staff_id", &req.staff_id),
        ] {
            if value.trim().is_empty() {
                return Err(SettlementError::validation(format!("{} is required", field)));
            }
        }
        if req.token_amount <= 0 {
            return Err(SettlementError::validation(format!(
                "token amount must be positive: {}",
                req.token_amount
            )));
        }

        // Requested -> Validated
        let now = self.ctx.now();
        let rate = RateConfigService::new(self.ctx)
            .get_current_exchange_rate(now)
            .await?;
        let config = &rate.config;
        let breakdown = CashoutBreakdown::compute(req.token_amount, config)?;

        if breakdown.exact_usd < config.min_cashout {
            warn!(
                customer_id = %req.customer_id,
                tokens = req.token_amount,
                usd = %breakdown.exact_usd,
                "cashout below minimum"
            );
            return Err(SettlementError::validation(format!(
                "cashout ${} is below the ${} minimum",
                breakdown.exact_usd, config.min_cashout
            )));
        }
        if breakdown.exact_usd > config.max_cashout_per_transaction {
            return Err(SettlementError::limit_exceeded(
                "max_cashout_per_transaction",
                breakdown.exact_usd,
                config.max_cashout_per_transaction,
            ));
        }

        let (day_start, day_end) = self.ctx.config().day_bounds(self.ctx.config().business_date(now));
        let customer_today = TransactionRepo::completed_usd_for_customer(
            pool,
            &req.customer_id,
            day_start,
            day_end,
        )
        .await?;
        let staff_today =
            TransactionRepo::completed_usd_for_staff(pool, &req.staff_id, day_start, day_end)
                .await?;
        debug!(
            customer_id = %req.customer_id,
            staff_id = %req.staff_id,
            customer_today = %customer_today,
            staff_today = %staff_today,
            usd = %breakdown.usd_amount,
            "daily limit check"
        );

        if customer_today + breakdown.usd_amount > config.daily_limit_per_customer {
            warn!(customer_id = %req.customer_id, "customer daily limit reached");
            return Err(SettlementError::limit_exceeded(
                "daily_limit_per_customer",
                breakdown.usd_amount,
                (config.daily_limit_per_customer - customer_today).max(Decimal::ZERO),
            ));
        }
        if staff_today + breakdown.usd_amount > config.daily_limit_per_staff {
            warn!(staff_id = %req.staff_id, "staff daily limit reached");
            return Err(SettlementError::limit_exceeded(
                "daily_limit_per_staff",
                breakdown.usd_amount,
                (config.daily_limit_per_staff - staff_today).max(Decimal::ZERO),
            ));
        }

        // Validated -> Committed
        let transaction_id = self.ctx.new_id("TX");
        let reference_id = req
            .reference_id
            .clone()
            .unwrap_or_else(|| self.ctx.new_id("REF"));

        let mut tx = pool.begin().await?;
        let debited = CustomerRepo::debit_if_sufficient(
            &mut *tx,
            &req.customer_id,
            req.token_amount,
            breakdown.usd_amount,
            now,
        )
        .await?;

        let Some(balance_after) = debited else {
            tx.rollback().await?;
            return Err(self.refused_debit(&req).await);
        };

        let record = SettlementTransaction {
            id: transaction_id,
            customer_id: req.customer_id.clone(),
            tx_type: TransactionType::Cashout,
            token_amount: req.token_amount,
            usd_amount: breakdown.usd_amount,
            status: TransactionStatus::Completed,
            reference_id,
            store_id: Some(req.store_id.clone()),
            actor_id: req.staff_id.clone(),
            metadata: SettlementMetadata::Cashout(CashoutMetadata {
                version: METADATA_VERSION,
                store_id: req.store_id.clone(),
                staff_id: req.staff_id.clone(),
                exchange_rate_used: config.tokens_per_dollar,
                rate_config_id: config.id.clone(),
                balance_before: balance_after + req.token_amount,
                balance_after,
                venue_commission_percent: config.venue_commission_percent,
                venue_commission: breakdown.venue_commission,
                cash_to_customer: breakdown.cash_to_customer,
                notes: req.notes.clone(),
            }),
            reversal: None,
            created_at: now,
        };

        if let Err(err) = TransactionRepo::insert(&mut *tx, &record).await {
            tx.rollback().await?;
            // Lost a race against a concurrent retry with the same reference id
            if err.is_unique_violation() && req.reference_id.is_some() {
                let existing =
                    TransactionRepo::get_by_reference(pool, &record.reference_id).await?;
                if let Some(existing) = existing {
                    return Self::replay(&req, existing);
                }
            }
            return Err(err.into());
        }
        tx.commit().await?;

        info!(
            transaction_id = %record.id,
            customer_id = %record.customer_id,
            store_id = %req.store_id,
            staff_id = %req.staff_id,
            tokens = record.token_amount,
            usd = %record.usd_amount,
            balance_after,
            "cashout completed"
        );

        self.ctx.journal(Event::cashout(
            &self.ctx.next_event_id(),
            &req.staff_id,
            &record.customer_id,
            &record.id,
            record.token_amount,
            record.usd_amount,
        ));

        Ok(CashoutReceipt {
            transaction: record,
            used_default_rates: rate.is_default(),
            replayed: false,
        })
    }

    fn replay(
        req: &CashoutRequest,
        existing: SettlementTransaction,
    ) -> SettlementResult<CashoutReceipt> {
        if existing.tx_type != TransactionType::Cashout
            || existing.customer_id != req.customer_id
            || existing.token_amount != req.token_amount
            || existing.store_id.as_deref() != Some(req.store_id.as_str())
            || existing.actor_id != req.staff_id
        {
            return Err(SettlementError::validation(format!(
                "reference id {} was already used for a different request",
                existing.reference_id
            )));
        }
        debug!(reference_id = %existing.reference_id, "cashout replayed");
        Ok(CashoutReceipt::from_transaction(existing, true))
    }

    /// Why the conditional debit touched no row
    async fn refused_debit(&self, req: &CashoutRequest) -> SettlementError {
        match CustomerRepo::get_by_id(self.ctx.pool(), &req.customer_id).await {
            Ok(account) => {
                warn!(
                    customer_id = %req.customer_id,
                    tokens = req.token_amount,
                    balance = account.balance,
                    "cashout refused, insufficient balance"
                );
                SettlementError::InsufficientBalance {
                    required: req.token_amount,
                    available: account.balance,
                }
            }
            Err(err) => err.into(),
        }
    }

    /// Void a completed cashout and credit the tokens back.
    ///
    /// The original is marked `failed` with a reversal link and a new
    /// `cashout_reversal` record is written; nothing is edited in place
    /// beyond the link.
    pub async fn reverse_cashout(
        &self,
        transaction_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> SettlementResult<ReversalReceipt> {
        if actor_id.trim().is_empty() {
            return Err(SettlementError::validation("actor_id is required"));
        }
        if reason.trim().is_empty() {
            return Err(SettlementError::validation("a reversal reason is required"));
        }

        let pool = self.ctx.pool();
        let original = TransactionRepo::get_by_id(pool, transaction_id).await?;
        Self::ensure_reversible(&original)?;

        let now = self.ctx.now();
        let link = ReversalLink {
            reversal_transaction_id: self.ctx.new_id("TX"),
            reversed_by: actor_id.to_string(),
            reason: reason.to_string(),
            reversed_at: now,
        };

        let mut tx = pool.begin().await?;
        if !TransactionRepo::mark_reversed(&mut *tx, &original.id, &link).await? {
            // Someone else reversed it between our read and the update
            tx.rollback().await?;
            let current = TransactionRepo::get_by_id(pool, transaction_id).await?;
            Self::ensure_reversible(&current)?;
            return Err(SettlementError::AlreadyReversed(transaction_id.to_string()));
        }

        let balance_after = CustomerRepo::credit_back(
            &mut *tx,
            &original.customer_id,
            original.token_amount,
            original.usd_amount,
            now,
        )
        .await?;

        let reversal = SettlementTransaction {
            id: link.reversal_transaction_id.clone(),
            customer_id: original.customer_id.clone(),
            tx_type: TransactionType::CashoutReversal,
            token_amount: original.token_amount,
            usd_amount: original.usd_amount,
            status: TransactionStatus::Completed,
            reference_id: format!("REVERSAL_{}", original.id),
            store_id: original.store_id.clone(),
            actor_id: actor_id.to_string(),
            metadata: SettlementMetadata::Reversal(ReversalMetadata {
                version: METADATA_VERSION,
                original_transaction_id: original.id.clone(),
                reversed_by: actor_id.to_string(),
                reason: reason.to_string(),
                balance_before: balance_after - original.token_amount,
                balance_after,
            }),
            reversal: None,
            created_at: now,
        };
        TransactionRepo::insert(&mut *tx, &reversal).await?;
        tx.commit().await?;

        info!(
            transaction_id = %original.id,
            reversal_id = %reversal.id,
            customer_id = %original.customer_id,
            tokens = original.token_amount,
            actor_id,
            "cashout reversed"
        );

        self.ctx.journal(
            Event::reversal(
                &self.ctx.next_event_id(),
                actor_id,
                &original.customer_id,
                &original.id,
                original.token_amount,
                reason,
            )
            .with_usd(original.usd_amount),
        );

        let original = TransactionRepo::get_by_id(pool, transaction_id).await?;
        Ok(ReversalReceipt { original, reversal })
    }

    fn ensure_reversible(tx: &SettlementTransaction) -> SettlementResult<()> {
        if tx.tx_type != TransactionType::Cashout {
            return Err(SettlementError::validation(format!(
                "{} is a {}, only cashouts can be reversed",
                tx.id, tx.tx_type
            )));
        }
        if tx.reversal.is_some() {
            return Err(SettlementError::AlreadyReversed(tx.id.clone()));
        }
        if tx.status != TransactionStatus::Completed {
            return Err(SettlementError::validation(format!(
                "{} is {}, only completed cashouts can be reversed",
                tx.id, tx.status
            )));
        }
        Ok(())
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> SettlementResult<SettlementTransaction> {
        Ok(TransactionRepo::get_by_id(self.ctx.pool(), transaction_id).await?)
    }

    /// Newest first
    pub async fn list_customer_transactions(
        &self,
        customer_id: &str,
        limit: i64,
    ) -> SettlementResult<Vec<SettlementTransaction>> {
        Ok(TransactionRepo::get_by_customer(self.ctx.pool(), customer_id, limit.max(1)).await?)
    }

    /// Completed cashout totals for `date` (reference timezone), against
    /// the limits in effect now
    pub async fn daily_totals(
        &self,
        customer_id: &str,
        staff_id: &str,
        date: NaiveDate,
    ) -> SettlementResult<DailyTotals> {
        let pool = self.ctx.pool();
        let (start, end) = self.ctx.config().day_bounds(date);
        let customer_usd =
            TransactionRepo::completed_usd_for_customer(pool, customer_id, start, end).await?;
        let staff_usd = TransactionRepo::completed_usd_for_staff(pool, staff_id, start, end).await?;

        let rate = RateConfigService::new(self.ctx)
            .get_current_exchange_rate(self.ctx.now())
            .await?;

        Ok(DailyTotals {
            date,
            customer_usd,
            staff_usd,
            customer_remaining: (rate.config.daily_limit_per_customer - customer_usd)
                .max(Decimal::ZERO),
            staff_remaining: (rate.config.daily_limit_per_staff - staff_usd).max(Decimal::ZERO),
        })
    }

    pub async fn get_balance(&self, customer_id: &str) -> SettlementResult<LedgerAccount> {
        Ok(CustomerRepo::get_by_id(self.ctx.pool(), customer_id).await?)
    }
}
