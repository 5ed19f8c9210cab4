//! # Reconciliation Module
//!
//! Định nghĩa ReconciliationLedger - một dòng cho mỗi (venue, ngày) - và hai
//! state machine độc lập: compliance (`ReconciliationStatus`) và thanh toán
//! (`SettlementStatus`). Chứa công thức variance và compliance score.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trạng thái compliance của một reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    /// Mới submit, chờ duyệt
    Pending,
    Approved,
    /// Cần review (thủ công hoặc do variance vượt ngưỡng)
    Flagged,
    /// Flag đã được xử lý
    Resolved,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Pending => "pending",
            ReconciliationStatus::Approved => "approved",
            ReconciliationStatus::Flagged => "flagged",
            ReconciliationStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ReconciliationStatus::Pending),
            "approved" => Some(ReconciliationStatus::Approved),
            "flagged" => Some(ReconciliationStatus::Flagged),
            "resolved" => Some(ReconciliationStatus::Resolved),
            _ => None,
        }
    }

    /// Kiểm tra chuyển trạng thái hợp lệ
    pub fn ensure_transition(&self, to: ReconciliationStatus) -> CoreResult<()> {
        use ReconciliationStatus::*;
        let allowed = matches!(
            (self, to),
            (Pending, Approved) | (Flagged, Approved) | (Pending, Flagged) | (Flagged, Resolved)
        );
        if allowed {
            Ok(())
        } else {
            Err(CoreError::invalid_transition(
                "reconciliation",
                self.as_str(),
                to.as_str(),
            ))
        }
    }

    /// Actual fee chỉ được ghi (hoặc sửa) khi chưa chốt
    pub fn accepts_fee(&self) -> bool {
        matches!(
            self,
            ReconciliationStatus::Pending | ReconciliationStatus::Flagged
        )
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trạng thái thanh toán phí, chỉ đi tiến
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Unsettled,
    PaymentSent,
    /// Đã nhận một phần
    Partial,
    Settled,
    /// Số tiền không khớp, cần xử lý thủ công
    Disputed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Unsettled => "unsettled",
            SettlementStatus::PaymentSent => "payment_sent",
            SettlementStatus::Partial => "partial",
            SettlementStatus::Settled => "settled",
            SettlementStatus::Disputed => "disputed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unsettled" => Some(SettlementStatus::Unsettled),
            "payment_sent" => Some(SettlementStatus::PaymentSent),
            "partial" => Some(SettlementStatus::Partial),
            "settled" => Some(SettlementStatus::Settled),
            "disputed" => Some(SettlementStatus::Disputed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Settled | SettlementStatus::Disputed)
    }

    /// unsettled -> payment_sent -> (partial ->)* settled | disputed
    pub fn ensure_transition(&self, to: SettlementStatus) -> CoreResult<()> {
        use SettlementStatus::*;
        let allowed = matches!(
            (self, to),
            (Unsettled, PaymentSent)
                | (PaymentSent, Partial)
                | (PaymentSent, Settled)
                | (PaymentSent, Disputed)
                | (Partial, Partial)
                | (Partial, Settled)
                | (Partial, Disputed)
        );
        if allowed {
            Ok(())
        } else {
            Err(CoreError::invalid_transition(
                "settlement",
                self.as_str(),
                to.as_str(),
            ))
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Đối soát doanh thu của một venue trong một ngày.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationLedger {
    pub id: String,
    pub store_id: String,
    pub reconciliation_date: NaiveDate,
    pub venue_gaming_revenue: Decimal,
    /// Copy từ venue master data lúc submit
    pub software_fee_percentage: Decimal,
    pub expected_software_fee: Decimal,
    pub actual_software_fee: Option<Decimal>,
    pub variance: Option<Decimal>,
    pub variance_percentage: Option<Decimal>,
    pub compliance_score: Option<Decimal>,
    pub reconciliation_status: ReconciliationStatus,
    pub settlement_status: SettlementStatus,

    // === Audit ===
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub flagged_reason: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,

    // === Payment ===
    pub payment_sent_at: Option<DateTime<Utc>>,
    pub amount_sent: Option<Decimal>,
    pub payment_method: Option<String>,
    pub payment_sent_by: Option<String>,
    pub payment_received_at: Option<DateTime<Utc>>,
    pub amount_received: Option<Decimal>,
    pub payment_confirmed_by: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl ReconciliationLedger {
    /// Phí phải trả: actual nếu đã ghi, ngược lại expected
    pub fn fee_due(&self) -> Decimal {
        self.actual_software_fee
            .unwrap_or(self.expected_software_fee)
    }

    /// Phí còn thiếu (không âm)
    pub fn outstanding_fee(&self) -> Decimal {
        let received = self.amount_received.unwrap_or(Decimal::ZERO);
        (self.fee_due() - received).max(Decimal::ZERO)
    }
}

/// Một dòng audit note, append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationNote {
    pub id: i64,
    pub reconciliation_id: String,
    pub action: String,
    pub actor_id: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// Kết quả so sánh actual fee với expected fee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAssessment {
    /// actual - expected
    pub variance: Decimal,
    /// variance / expected * 100, 0 nếu expected = 0
    pub variance_percentage: Decimal,
    /// 0..=100
    pub compliance_score: Decimal,
    /// |variance_percentage| vượt ngưỡng flag
    pub exceeds_threshold: bool,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Tính variance và compliance score.
///
/// `score = max(0, 100 - |variance%|)`, cộng `timely_bonus` (tối đa 100)
/// nếu submit đúng hạn.
pub fn assess_fee(
    expected: Decimal,
    actual: Decimal,
    timely: bool,
    timely_bonus: Decimal,
    flag_threshold_percent: Decimal,
) -> FeeAssessment {
    let variance = actual - expected;
    let variance_percentage = if expected.is_zero() {
        Decimal::ZERO
    } else {
        round2(variance / expected * Decimal::ONE_HUNDRED)
    };

    let mut score = (Decimal::ONE_HUNDRED - variance_percentage.abs()).max(Decimal::ZERO);
    if timely {
        score = (score + timely_bonus).min(Decimal::ONE_HUNDRED);
    }

    FeeAssessment {
        variance,
        variance_percentage,
        compliance_score: score,
        exceeds_threshold: variance_percentage.abs() > flag_threshold_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assess_exact_match() {
        let a = assess_fee(dec!(500), dec!(500), false, dec!(5), dec!(10));
        assert_eq!(a.variance, dec!(0));
        assert_eq!(a.variance_percentage, dec!(0));
        assert_eq!(a.compliance_score, dec!(100));
        assert!(!a.exceeds_threshold);

        // bonus cannot push past 100
        let a = assess_fee(dec!(500), dec!(500), true, dec!(5), dec!(10));
        assert_eq!(a.compliance_score, dec!(100));
    }

    #[test]
    fn test_assess_over_threshold() {
        let a = assess_fee(dec!(500), dec!(560), false, dec!(5), dec!(10));
        assert_eq!(a.variance, dec!(60));
        assert_eq!(a.variance_percentage, dec!(12));
        assert_eq!(a.compliance_score, dec!(88));
        assert!(a.exceeds_threshold);
    }

    #[test]
    fn test_assess_timely_bonus() {
        let a = assess_fee(dec!(500), dec!(450), true, dec!(5), dec!(10));
        assert_eq!(a.variance, dec!(-50));
        assert_eq!(a.variance_percentage, dec!(-10));
        assert_eq!(a.compliance_score, dec!(95));
        assert!(!a.exceeds_threshold);

        let a = assess_fee(dec!(500), dec!(480), true, dec!(5), dec!(10));
        assert_eq!(a.compliance_score, dec!(100));
    }

    #[test]
    fn test_assess_threshold_is_exclusive() {
        let a = assess_fee(dec!(500), dec!(550), false, dec!(5), dec!(10));
        assert_eq!(a.variance_percentage, dec!(10));
        assert!(!a.exceeds_threshold);
    }

    #[test]
    fn test_assess_zero_expected() {
        let a = assess_fee(dec!(0), dec!(25), false, dec!(5), dec!(10));
        assert_eq!(a.variance, dec!(25));
        assert_eq!(a.variance_percentage, dec!(0));
        assert_eq!(a.compliance_score, dec!(100));
    }

    #[test]
    fn test_assess_score_floor() {
        let a = assess_fee(dec!(100), dec!(350), true, dec!(5), dec!(10));
        assert_eq!(a.variance_percentage, dec!(250));
        assert_eq!(a.compliance_score, dec!(5));

        let a = assess_fee(dec!(100), dec!(350), false, dec!(5), dec!(10));
        assert_eq!(a.compliance_score, dec!(0));
    }

    #[test]
    fn test_reconciliation_transitions() {
        use ReconciliationStatus::*;
        assert!(Pending.ensure_transition(Approved).is_ok());
        assert!(Flagged.ensure_transition(Approved).is_ok());
        assert!(Pending.ensure_transition(Flagged).is_ok());
        assert!(Flagged.ensure_transition(Resolved).is_ok());

        assert!(Approved.ensure_transition(Flagged).is_err());
        assert!(Flagged.ensure_transition(Flagged).is_err());
        assert!(Resolved.ensure_transition(Approved).is_err());
        assert!(Pending.ensure_transition(Resolved).is_err());
    }

    #[test]
    fn test_settlement_moves_forward_only() {
        use SettlementStatus::*;
        assert!(Unsettled.ensure_transition(PaymentSent).is_ok());
        assert!(PaymentSent.ensure_transition(Settled).is_ok());
        assert!(PaymentSent.ensure_transition(Disputed).is_ok());
        assert!(Partial.ensure_transition(Settled).is_ok());

        assert!(Unsettled.ensure_transition(Settled).is_err());
        assert!(Settled.ensure_transition(PaymentSent).is_err());
        assert!(Disputed.ensure_transition(Settled).is_err());
        assert!(PaymentSent.ensure_transition(Unsettled).is_err());
        assert!(Settled.is_terminal());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            SettlementStatus::from_str("payment_sent"),
            Some(SettlementStatus::PaymentSent)
        );
        assert_eq!(
            ReconciliationStatus::from_str("Flagged"),
            Some(ReconciliationStatus::Flagged)
        );
        assert_eq!(SettlementStatus::from_str("paid"), None);
    }
}
