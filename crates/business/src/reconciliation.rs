//! Venue reconciliation - daily revenue, fee compliance, payment settlement
//!
//! Two independent state machines live on each row: the compliance status
//! (pending/approved/flagged/resolved) and the settlement status of the fee
//! payment. Every transition is a compare-and-swap on the current status,
//! committed together with an audit note.

use crate::error::{SettlementError, SettlementResult};
use crate::services::ServiceContext;
use cashpoint_core::{
    assess_fee, percent_of, round_usd, CoreError, Event, EventType, ReconciliationLedger,
    ReconciliationNote, ReconciliationStatus, SettlementStatus,
};
use cashpoint_persistence::{
    FeeUpdate, NoteRepo, PaymentReceived, PaymentSent, ReconciliationRepo, VenueRepo, VenueRow,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{info, warn};

/// Aggregate compliance figures over a date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceSummary {
    /// None for the system-wide summary
    pub store_id: Option<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_reconciliations: usize,
    pub pending: usize,
    pub approved: usize,
    pub flagged: usize,
    pub resolved: usize,
    pub settled: usize,
    pub disputed: usize,
    /// Rows with an actual fee recorded
    pub scored: usize,
    /// Mean compliance score of scored rows
    pub average_compliance_score: Option<Decimal>,
    pub total_revenue: Decimal,
    pub total_expected_fee: Decimal,
    pub total_actual_fee: Decimal,
    /// Sum of recorded variances
    pub total_variance: Decimal,
    /// Fee still owed on rows that are not settled
    pub outstanding_fee: Decimal,
}

impl ComplianceSummary {
    pub fn from_rows(
        store_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
        rows: &[ReconciliationLedger],
    ) -> Self {
        let mut summary = Self {
            store_id: store_id.map(str::to_string),
            from,
            to,
            total_reconciliations: rows.len(),
            pending: 0,
            approved: 0,
            flagged: 0,
            resolved: 0,
            settled: 0,
            disputed: 0,
            scored: 0,
            average_compliance_score: None,
            total_revenue: Decimal::ZERO,
            total_expected_fee: Decimal::ZERO,
            total_actual_fee: Decimal::ZERO,
            total_variance: Decimal::ZERO,
            outstanding_fee: Decimal::ZERO,
        };
        let mut score_sum = Decimal::ZERO;

        for row in rows {
            match row.reconciliation_status {
                ReconciliationStatus::Pending => summary.pending += 1,
                ReconciliationStatus::Approved => summary.approved += 1,
                ReconciliationStatus::Flagged => summary.flagged += 1,
                ReconciliationStatus::Resolved => summary.resolved += 1,
            }
            match row.settlement_status {
                SettlementStatus::Settled => summary.settled += 1,
                SettlementStatus::Disputed => summary.disputed += 1,
                _ => {}
            }

            summary.total_revenue += row.venue_gaming_revenue;
            summary.total_expected_fee += row.expected_software_fee;
            if let Some(actual) = row.actual_software_fee {
                summary.total_actual_fee += actual;
            }
            if let Some(variance) = row.variance {
                summary.total_variance += variance;
            }
            if let Some(score) = row.compliance_score {
                summary.scored += 1;
                score_sum += score;
            }
            if row.settlement_status != SettlementStatus::Settled {
                summary.outstanding_fee += row.outstanding_fee();
            }
        }

        if summary.scored > 0 {
            summary.average_compliance_score = Some(
                (score_sum / Decimal::from(summary.scored as u64))
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            );
        }

        summary
    }
}

/// Reconciliation Service - venue daily reconciliation and fee settlement
pub struct ReconciliationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReconciliationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    // === Venue master data ===

    /// Register or update a venue and its software fee percentage
    pub async fn register_venue(
        &self,
        store_id: &str,
        name: &str,
        fee_percentage: Decimal,
    ) -> SettlementResult<VenueRow> {
        if store_id.trim().is_empty() {
            return Err(SettlementError::validation("store_id is required"));
        }
        if fee_percentage < Decimal::ZERO || fee_percentage > Decimal::ONE_HUNDRED {
            return Err(CoreError::PercentageOutOfRange {
                field: "fee_percentage".to_string(),
                value: fee_percentage,
            }
            .into());
        }

        VenueRepo::upsert(self.ctx.pool(), store_id, name, fee_percentage, self.ctx.now()).await?;
        info!(store_id, fee_percentage = %fee_percentage, "venue registered");
        Ok(VenueRepo::get_by_id(self.ctx.pool(), store_id).await?)
    }

    pub async fn list_venues(&self) -> SettlementResult<Vec<VenueRow>> {
        Ok(VenueRepo::get_all(self.ctx.pool()).await?)
    }

    // === Compliance lifecycle ===

    /// Create the row for `(store_id, date)` from the venue's reported revenue.
    ///
    /// The venue's fee percentage is copied at submission time.
    pub async fn submit_daily_reconciliation(
        &self,
        store_id: &str,
        date: NaiveDate,
        venue_gaming_revenue: Decimal,
        submitted_by: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if venue_gaming_revenue < Decimal::ZERO {
            return Err(SettlementError::validation(format!(
                "venue gaming revenue cannot be negative: {}",
                venue_gaming_revenue
            )));
        }
        if submitted_by.trim().is_empty() {
            return Err(SettlementError::validation("submitted_by is required"));
        }

        let pool = self.ctx.pool();
        let venue = VenueRepo::get_by_id(pool, store_id).await?;
        if ReconciliationRepo::get_by_store_and_date(pool, store_id, date)
            .await?
            .is_some()
        {
            return Err(Self::duplicate(store_id, date));
        }

        let fee_percentage = venue.fee_percentage()?;
        let now = self.ctx.now();
        let record = ReconciliationLedger {
            id: self.ctx.new_id("REC"),
            store_id: store_id.to_string(),
            reconciliation_date: date,
            venue_gaming_revenue,
            software_fee_percentage: fee_percentage,
            expected_software_fee: round_usd(percent_of(venue_gaming_revenue, fee_percentage)),
            actual_software_fee: None,
            variance: None,
            variance_percentage: None,
            compliance_score: None,
            reconciliation_status: ReconciliationStatus::Pending,
            settlement_status: SettlementStatus::Unsettled,
            submitted_by: submitted_by.to_string(),
            submitted_at: now,
            approved_by: None,
            approved_at: None,
            flagged_reason: None,
            resolved_by: None,
            resolved_at: None,
            payment_sent_at: None,
            amount_sent: None,
            payment_method: None,
            payment_sent_by: None,
            payment_received_at: None,
            amount_received: None,
            payment_confirmed_by: None,
            updated_at: now,
        };

        let mut tx = pool.begin().await?;
        if let Err(err) = ReconciliationRepo::insert(&mut *tx, &record).await {
            tx.rollback().await?;
            if err.is_unique_violation() {
                return Err(Self::duplicate(store_id, date));
            }
            return Err(err.into());
        }
        NoteRepo::append(
            &mut *tx,
            &record.id,
            "submitted",
            submitted_by,
            &format!(
                "revenue {} at {}%, expected fee {}",
                record.venue_gaming_revenue,
                record.software_fee_percentage,
                record.expected_software_fee
            ),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            reconciliation_id = %record.id,
            store_id,
            date = %date,
            revenue = %venue_gaming_revenue,
            expected_fee = %record.expected_software_fee,
            "reconciliation submitted"
        );
        self.journal(EventType::ReconciliationSubmitted, submitted_by, &record, None);

        Ok(record)
    }

    fn duplicate(store_id: &str, date: NaiveDate) -> SettlementError {
        SettlementError::DuplicateSubmission(format!(
            "reconciliation for {} on {} already exists",
            store_id, date
        ))
    }

    /// Record the fee actually collected and score the row.
    ///
    /// A pending row whose variance exceeds the threshold is flagged in the
    /// same update.
    pub async fn record_actual_fee(
        &self,
        reconciliation_id: &str,
        actual_software_fee: Decimal,
        actor_id: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if actual_software_fee < Decimal::ZERO {
            return Err(SettlementError::validation(format!(
                "actual software fee cannot be negative: {}",
                actual_software_fee
            )));
        }

        let rec = self.get(reconciliation_id).await?;
        let from = rec.reconciliation_status;
        if !from.accepts_fee() {
            return Err(
                CoreError::invalid_transition("reconciliation", from.as_str(), "fee_recorded").into(),
            );
        }

        let config = self.ctx.config();
        let timely = config.is_timely(rec.reconciliation_date, rec.submitted_at);
        let assessment = assess_fee(
            rec.expected_software_fee,
            actual_software_fee,
            timely,
            config.timely_submission_bonus,
            config.variance_flag_threshold_percent,
        );

        let auto_flag = assessment.exceeds_threshold && from == ReconciliationStatus::Pending;
        let flagged_reason = auto_flag.then(|| {
            format!(
                "Variance {}% exceeds {}% threshold",
                assessment.variance_percentage, config.variance_flag_threshold_percent
            )
        });
        let now = self.ctx.now();
        let update = FeeUpdate {
            actual_software_fee,
            variance: assessment.variance,
            variance_percentage: assessment.variance_percentage,
            compliance_score: assessment.compliance_score,
            status: if auto_flag {
                ReconciliationStatus::Flagged
            } else {
                from
            },
            flagged_reason: flagged_reason.clone(),
            at: now,
        };

        let pool = self.ctx.pool();
        let mut tx = pool.begin().await?;
        if !ReconciliationRepo::update_fee(&mut *tx, reconciliation_id, from, &update).await? {
            tx.rollback().await?;
            return Err(self.stale_status(reconciliation_id, "fee_recorded").await);
        }
        NoteRepo::append(
            &mut *tx,
            reconciliation_id,
            "fee_recorded",
            actor_id,
            &format!(
                "actual fee {} (variance {}, {}%), score {}{}",
                actual_software_fee,
                assessment.variance,
                assessment.variance_percentage,
                assessment.compliance_score,
                if timely { ", timely" } else { "" }
            ),
            now,
        )
        .await?;
        if let Some(reason) = &flagged_reason {
            NoteRepo::append(&mut *tx, reconciliation_id, "flagged", actor_id, reason, now).await?;
        }
        tx.commit().await?;

        info!(
            reconciliation_id,
            store_id = %rec.store_id,
            actual_fee = %actual_software_fee,
            variance_pct = %assessment.variance_percentage,
            score = %assessment.compliance_score,
            "actual fee recorded"
        );
        let updated = self.get(reconciliation_id).await?;
        self.journal(
            EventType::ActualFeeRecorded,
            actor_id,
            &updated,
            Some(actual_software_fee),
        );
        if let Some(reason) = flagged_reason {
            warn!(reconciliation_id, store_id = %rec.store_id, %reason, "reconciliation auto-flagged");
            self.journal(EventType::ReconciliationFlagged, actor_id, &updated, None);
        }

        Ok(updated)
    }

    /// pending|flagged -> approved
    pub async fn approve(
        &self,
        reconciliation_id: &str,
        actor_id: &str,
        notes: Option<&str>,
    ) -> SettlementResult<ReconciliationLedger> {
        let rec = self.get(reconciliation_id).await?;
        let from = rec.reconciliation_status;
        from.ensure_transition(ReconciliationStatus::Approved)?;

        let now = self.ctx.now();
        let mut tx = self.ctx.pool().begin().await?;
        if !ReconciliationRepo::approve(&mut *tx, reconciliation_id, from, actor_id, now).await? {
            tx.rollback().await?;
            return Err(self.stale_status(reconciliation_id, "approved").await);
        }
        NoteRepo::append(
            &mut *tx,
            reconciliation_id,
            "approved",
            actor_id,
            notes.unwrap_or("approved"),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(reconciliation_id, actor_id, from = %from, "reconciliation approved");
        self.finish(EventType::ReconciliationApproved, actor_id, reconciliation_id, None)
            .await
    }

    /// pending -> flagged
    pub async fn flag(
        &self,
        reconciliation_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if reason.trim().is_empty() {
            return Err(SettlementError::validation("a flag reason is required"));
        }
        let rec = self.get(reconciliation_id).await?;
        let from = rec.reconciliation_status;
        from.ensure_transition(ReconciliationStatus::Flagged)?;

        let now = self.ctx.now();
        let mut tx = self.ctx.pool().begin().await?;
        if !ReconciliationRepo::flag(&mut *tx, reconciliation_id, from, reason, now).await? {
            tx.rollback().await?;
            return Err(self.stale_status(reconciliation_id, "flagged").await);
        }
        NoteRepo::append(&mut *tx, reconciliation_id, "flagged", actor_id, reason, now).await?;
        tx.commit().await?;

        warn!(reconciliation_id, actor_id, reason, "reconciliation flagged");
        self.finish(EventType::ReconciliationFlagged, actor_id, reconciliation_id, None)
            .await
    }

    /// flagged -> resolved
    pub async fn resolve(
        &self,
        reconciliation_id: &str,
        actor_id: &str,
        notes: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if notes.trim().is_empty() {
            return Err(SettlementError::validation("resolution notes are required"));
        }
        let rec = self.get(reconciliation_id).await?;
        let from = rec.reconciliation_status;
        from.ensure_transition(ReconciliationStatus::Resolved)?;

        let now = self.ctx.now();
        let mut tx = self.ctx.pool().begin().await?;
        if !ReconciliationRepo::resolve(&mut *tx, reconciliation_id, from, actor_id, now).await? {
            tx.rollback().await?;
            return Err(self.stale_status(reconciliation_id, "resolved").await);
        }
        NoteRepo::append(&mut *tx, reconciliation_id, "resolved", actor_id, notes, now).await?;
        tx.commit().await?;

        info!(reconciliation_id, actor_id, "reconciliation resolved");
        self.finish(EventType::ReconciliationResolved, actor_id, reconciliation_id, None)
            .await
    }

    // === Settlement lifecycle ===

    /// unsettled -> payment_sent, with the instant the venue sent the money
    pub async fn mark_payment_sent(
        &self,
        reconciliation_id: &str,
        amount: Decimal,
        method: &str,
        sent_at: DateTime<Utc>,
        actor_id: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::validation(format!(
                "payment amount must be positive: {}",
                amount
            )));
        }
        if method.trim().is_empty() {
            return Err(SettlementError::validation("payment method is required"));
        }
        let now = self.ctx.now();
        Self::ensure_not_future("sent_at", sent_at, now)?;

        let rec = self.get(reconciliation_id).await?;
        let from = rec.settlement_status;
        from.ensure_transition(SettlementStatus::PaymentSent)?;

        let payment = PaymentSent {
            amount,
            method: method.to_string(),
            sent_by: actor_id.to_string(),
            sent_at,
        };
        let mut tx = self.ctx.pool().begin().await?;
        let moved =
            ReconciliationRepo::record_payment_sent(&mut *tx, reconciliation_id, from, &payment, now)
                .await?;
        if !moved {
            tx.rollback().await?;
            return Err(self.stale_settlement(reconciliation_id, SettlementStatus::PaymentSent).await);
        }
        NoteRepo::append(
            &mut *tx,
            reconciliation_id,
            "payment_sent",
            actor_id,
            &format!("{} sent via {} at {}", amount, method, sent_at.to_rfc3339()),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(reconciliation_id, amount = %amount, method, "payment sent");
        self.finish(EventType::PaymentSent, actor_id, reconciliation_id, Some(amount))
            .await
    }

    /// payment_sent|partial -> partial|settled.
    ///
    /// Receipts accumulate; the row settles once the total received covers
    /// the fee due (actual if recorded, otherwise expected). `received_at`
    /// is the instant of the latest receipt.
    pub async fn confirm_payment_received(
        &self,
        reconciliation_id: &str,
        amount: Decimal,
        received_at: DateTime<Utc>,
        actor_id: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if amount <= Decimal::ZERO {
            return Err(SettlementError::validation(format!(
                "received amount must be positive: {}",
                amount
            )));
        }
        let now = self.ctx.now();
        Self::ensure_not_future("received_at", received_at, now)?;

        let rec = self.get(reconciliation_id).await?;
        if let Some(sent_at) = rec.payment_sent_at {
            if received_at < sent_at {
                return Err(SettlementError::validation(format!(
                    "received_at {} is before the payment was sent at {}",
                    received_at.to_rfc3339(),
                    sent_at.to_rfc3339()
                )));
            }
        }
        let from = rec.settlement_status;
        let total_received = rec.amount_received.unwrap_or(Decimal::ZERO) + amount;
        let to = if total_received >= rec.fee_due() {
            SettlementStatus::Settled
        } else {
            SettlementStatus::Partial
        };
        from.ensure_transition(to)?;

        let receipt = PaymentReceived {
            total_received,
            confirmed_by: actor_id.to_string(),
            received_at,
        };
        let mut tx = self.ctx.pool().begin().await?;
        let moved = ReconciliationRepo::record_payment_received(
            &mut *tx,
            reconciliation_id,
            from,
            to,
            &receipt,
            now,
        )
        .await?;
        if !moved {
            tx.rollback().await?;
            return Err(self.stale_settlement(reconciliation_id, to).await);
        }
        NoteRepo::append(
            &mut *tx,
            reconciliation_id,
            to.as_str(),
            actor_id,
            &format!("received {} (total {} of {})", amount, total_received, rec.fee_due()),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            reconciliation_id,
            amount = %amount,
            total_received = %total_received,
            status = %to,
            "payment received"
        );
        self.finish(EventType::PaymentConfirmed, actor_id, reconciliation_id, Some(amount))
            .await
    }

    /// payment_sent|partial -> disputed
    pub async fn dispute(
        &self,
        reconciliation_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> SettlementResult<ReconciliationLedger> {
        if reason.trim().is_empty() {
            return Err(SettlementError::validation("a dispute reason is required"));
        }
        let rec = self.get(reconciliation_id).await?;
        let from = rec.settlement_status;
        from.ensure_transition(SettlementStatus::Disputed)?;

        let now = self.ctx.now();
        let mut tx = self.ctx.pool().begin().await?;
        let moved = ReconciliationRepo::set_settlement_status(
            &mut *tx,
            reconciliation_id,
            from,
            SettlementStatus::Disputed,
            now,
        )
        .await?;
        if !moved {
            tx.rollback().await?;
            return Err(self.stale_settlement(reconciliation_id, SettlementStatus::Disputed).await);
        }
        NoteRepo::append(&mut *tx, reconciliation_id, "disputed", actor_id, reason, now).await?;
        tx.commit().await?;

        warn!(reconciliation_id, actor_id, reason, "payment disputed");
        self.finish(EventType::PaymentDisputed, actor_id, reconciliation_id, None)
            .await
    }

    // === Queries ===

    pub async fn get(&self, reconciliation_id: &str) -> SettlementResult<ReconciliationLedger> {
        Ok(ReconciliationRepo::get_by_id(self.ctx.pool(), reconciliation_id).await?)
    }

    /// Rows of one venue in `[from, to]`
    pub async fn list_for_store(
        &self,
        store_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SettlementResult<Vec<ReconciliationLedger>> {
        Ok(ReconciliationRepo::list(self.ctx.pool(), Some(store_id), from, to).await?)
    }

    /// Rows of every venue in `[from, to]`
    pub async fn list_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SettlementResult<Vec<ReconciliationLedger>> {
        Ok(ReconciliationRepo::list(self.ctx.pool(), None, from, to).await?)
    }

    /// Audit notes in the order they were written
    pub async fn notes(&self, reconciliation_id: &str) -> SettlementResult<Vec<ReconciliationNote>> {
        self.get(reconciliation_id).await?;
        Ok(NoteRepo::get_by_reconciliation(self.ctx.pool(), reconciliation_id).await?)
    }

    pub async fn system_compliance_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SettlementResult<ComplianceSummary> {
        let rows = self.list_by_date_range(from, to).await?;
        Ok(ComplianceSummary::from_rows(None, from, to, &rows))
    }

    pub async fn venue_compliance_summary(
        &self,
        store_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SettlementResult<ComplianceSummary> {
        VenueRepo::get_by_id(self.ctx.pool(), store_id).await?;
        let rows = self.list_for_store(store_id, from, to).await?;
        Ok(ComplianceSummary::from_rows(Some(store_id), from, to, &rows))
    }

    // === Helpers ===

    fn ensure_not_future(
        field: &str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SettlementResult<()> {
        if at > now {
            return Err(SettlementError::validation(format!(
                "{} {} is in the future",
                field,
                at.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// The CAS update lost to a concurrent request; report from the row's
    /// current compliance status
    async fn stale_status(&self, reconciliation_id: &str, to: &str) -> SettlementError {
        match self.get(reconciliation_id).await {
            Ok(current) => CoreError::invalid_transition(
                "reconciliation",
                current.reconciliation_status.as_str(),
                to,
            )
            .into(),
            Err(err) => err,
        }
    }

    async fn stale_settlement(&self, reconciliation_id: &str, to: SettlementStatus) -> SettlementError {
        match self.get(reconciliation_id).await {
            Ok(current) => CoreError::invalid_transition(
                "settlement",
                current.settlement_status.as_str(),
                to.as_str(),
            )
            .into(),
            Err(err) => err,
        }
    }

    async fn finish(
        &self,
        event_type: EventType,
        actor_id: &str,
        reconciliation_id: &str,
        amount: Option<Decimal>,
    ) -> SettlementResult<ReconciliationLedger> {
        let updated = self.get(reconciliation_id).await?;
        self.journal(event_type, actor_id, &updated, amount);
        Ok(updated)
    }

    fn journal(
        &self,
        event_type: EventType,
        actor_id: &str,
        rec: &ReconciliationLedger,
        amount: Option<Decimal>,
    ) {
        let mut event = Event::reconciliation(
            &self.ctx.next_event_id(),
            event_type,
            actor_id,
            &rec.store_id,
            &rec.id,
        )
        .with_description(&format!(
            "{} {} {}/{}",
            rec.reconciliation_date, rec.store_id, rec.reconciliation_status, rec.settlement_status
        ));
        if let Some(amount) = amount {
            event = event.with_usd(amount);
        }
        self.ctx.journal(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn row(status: ReconciliationStatus, expected: Decimal, actual: Option<Decimal>) -> ReconciliationLedger {
        let now = Utc::now();
        let assessment = actual.map(|a| assess_fee(expected, a, false, dec!(5), dec!(10)));
        ReconciliationLedger {
            id: "REC_1".to_string(),
            store_id: "STORE_01".to_string(),
            reconciliation_date: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            venue_gaming_revenue: expected * dec!(20),
            software_fee_percentage: dec!(5),
            expected_software_fee: expected,
            actual_software_fee: actual,
            variance: assessment.as_ref().map(|a| a.variance),
            variance_percentage: assessment.as_ref().map(|a| a.variance_percentage),
            compliance_score: assessment.as_ref().map(|a| a.compliance_score),
            reconciliation_status: status,
            settlement_status: SettlementStatus::Unsettled,
            submitted_by: "OP_01".to_string(),
            submitted_at: now,
            approved_by: None,
            approved_at: None,
            flagged_reason: None,
            resolved_by: None,
            resolved_at: None,
            payment_sent_at: None,
            amount_sent: None,
            payment_method: None,
            payment_sent_by: None,
            payment_received_at: None,
            amount_received: None,
            payment_confirmed_by: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_summary_counts_and_scores() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let mut settled = row(ReconciliationStatus::Approved, dec!(500), Some(dec!(500)));
        settled.settlement_status = SettlementStatus::Settled;
        settled.amount_received = Some(dec!(500));

        let rows = vec![
            settled,
            row(ReconciliationStatus::Flagged, dec!(500), Some(dec!(560))),
            row(ReconciliationStatus::Pending, dec!(200), None),
        ];
        let summary = ComplianceSummary::from_rows(None, day, day, &rows);

        assert_eq!(summary.total_reconciliations, 3);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.settled, 1);
        assert_eq!(summary.scored, 2);
        // (100 + 88) / 2
        assert_eq!(summary.average_compliance_score, Some(dec!(94)));
        assert_eq!(summary.total_expected_fee, dec!(1200));
        assert_eq!(summary.total_actual_fee, dec!(1060));
        assert_eq!(summary.total_variance, dec!(60));
        // 560 owed on the flagged row, 200 expected on the pending one
        assert_eq!(summary.outstanding_fee, dec!(760));
    }

    #[test]
    fn test_summary_empty_range() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let summary = ComplianceSummary::from_rows(Some("STORE_01"), day, day, &[]);

        assert_eq!(summary.total_reconciliations, 0);
        assert_eq!(summary.average_compliance_score, None);
        assert_eq!(summary.outstanding_fee, dec!(0));
        assert_eq!(summary.store_id.as_deref(), Some("STORE_01"));
    }
}
