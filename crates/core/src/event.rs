//! # Event Module
//!
//! Định nghĩa Event và EventType cho audit journal.
//! Events được ghi vào JSONL files sau khi transaction DB đã commit;
//! DB là nguồn sự thật, journal là bản sao phục vụ audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loại sự kiện trong hệ thống.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // === Rate config events ===
    RateConfigActivated,

    // === Settlement events ===
    CashoutCompleted,
    CashoutReversed,

    // === Reconciliation events ===
    ReconciliationSubmitted,
    ActualFeeRecorded,
    ReconciliationApproved,
    ReconciliationFlagged,
    ReconciliationResolved,

    // === Payment events ===
    PaymentSent,
    PaymentConfirmed,
    PaymentDisputed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RateConfigActivated => "rate_config_activated",
            EventType::CashoutCompleted => "cashout_completed",
            EventType::CashoutReversed => "cashout_reversed",
            EventType::ReconciliationSubmitted => "reconciliation_submitted",
            EventType::ActualFeeRecorded => "actual_fee_recorded",
            EventType::ReconciliationApproved => "reconciliation_approved",
            EventType::ReconciliationFlagged => "reconciliation_flagged",
            EventType::ReconciliationResolved => "reconciliation_resolved",
            EventType::PaymentSent => "payment_sent",
            EventType::PaymentConfirmed => "payment_confirmed",
            EventType::PaymentDisputed => "payment_disputed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let all = [
            EventType::RateConfigActivated,
            EventType::CashoutCompleted,
            EventType::CashoutReversed,
            EventType::ReconciliationSubmitted,
            EventType::ActualFeeRecorded,
            EventType::ReconciliationApproved,
            EventType::ReconciliationFlagged,
            EventType::ReconciliationResolved,
            EventType::PaymentSent,
            EventType::PaymentConfirmed,
            EventType::PaymentDisputed,
        ];
        let s = s.to_lowercase();
        all.into_iter().find(|t| t.as_str() == s)
    }

    /// Event có làm thay đổi số dư customer không
    pub fn moves_balance(&self) -> bool {
        matches!(self, EventType::CashoutCompleted | EventType::CashoutReversed)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event - một hành động đã commit.
///
/// Immutable, append-only, lưu vào JSONL files theo ngày.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// ID unique của event (EVT_000001, ...)
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,

    // === Actor ===
    /// Staff/operator/admin thực hiện
    pub actor_id: String,

    // === Subject ===
    /// Customer ID (settlement) hoặc store ID (reconciliation), hoặc config ID
    pub subject_id: String,
    /// Transaction ID hoặc reconciliation ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    // === Amount ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<i64>,
    /// USD (dạng string để đảm bảo precision)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Event {
    /// Tạo Event mới với thông tin cơ bản
    pub fn new(event_id: String, event_type: EventType, actor_id: &str, subject_id: &str) -> Self {
        Self {
            event_id,
            timestamp: Utc::now(),
            event_type,
            actor_id: actor_id.to_string(),
            subject_id: subject_id.to_string(),
            record_id: None,
            token_amount: None,
            usd_amount: None,
            description: None,
        }
    }

    // === Builder methods ===

    pub fn with_record(mut self, record_id: &str) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }

    pub fn with_tokens(mut self, tokens: i64) -> Self {
        self.token_amount = Some(tokens);
        self
    }

    pub fn with_usd(mut self, usd: Decimal) -> Self {
        self.usd_amount = Some(usd);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    // === Factory methods ===

    /// Tạo CashoutCompleted event
    pub fn cashout(
        event_id: &str,
        staff_id: &str,
        customer_id: &str,
        transaction_id: &str,
        tokens: i64,
        usd: Decimal,
    ) -> Self {
        Self::new(
            event_id.to_string(),
            EventType::CashoutCompleted,
            staff_id,
            customer_id,
        )
        .with_record(transaction_id)
        .with_tokens(tokens)
        .with_usd(usd)
    }

    /// Tạo CashoutReversed event
    pub fn reversal(
        event_id: &str,
        actor_id: &str,
        customer_id: &str,
        original_transaction_id: &str,
        tokens: i64,
        reason: &str,
    ) -> Self {
        Self::new(
            event_id.to_string(),
            EventType::CashoutReversed,
            actor_id,
            customer_id,
        )
        .with_record(original_transaction_id)
        .with_tokens(tokens)
        .with_description(reason)
    }

    /// Tạo event cho một reconciliation
    pub fn reconciliation(
        event_id: &str,
        event_type: EventType,
        actor_id: &str,
        store_id: &str,
        reconciliation_id: &str,
    ) -> Self {
        Self::new(event_id.to_string(), event_type, actor_id, store_id)
            .with_record(reconciliation_id)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} by {} on {}",
            self.event_id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.event_type,
            self.actor_id,
            self.subject_id
        )?;
        if let Some(tokens) = self.token_amount {
            write!(f, " ({} tokens)", tokens)?;
        }
        if let Some(usd) = self.usd_amount {
            write!(f, " ${}", usd)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cashout_event_json() {
        let event = Event::cashout("EVT_000001", "STAFF_1", "CUST_001", "TX_1", 6_000, dec!(6.00));
        let json = serde_json::to_string(&event).unwrap();

        assert!(json.contains(r#""event_type":"cashout_completed""#));
        assert!(json.contains(r#""usd_amount":"6.00""#));
        assert!(!json.contains("description"));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.token_amount, Some(6_000));
        assert!(parsed.event_type.moves_balance());
    }

    #[test]
    fn test_event_type_from_str() {
        assert_eq!(
            EventType::from_str("payment_disputed"),
            Some(EventType::PaymentDisputed)
        );
        assert_eq!(EventType::from_str("deposit"), None);
    }

    #[test]
    fn test_display() {
        let event = Event::reversal("EVT_000002", "MGR_1", "CUST_001", "TX_1", 6_000, "typo");
        let line = event.to_string();
        assert!(line.contains("cashout_reversed"));
        assert!(line.contains("6000 tokens"));
    }
}
