//! # Money Module
//!
//! Phép tính tiền cho cashout: quy đổi token -> USD, hoa hồng venue,
//! và làm tròn về cent. Dùng `rust_decimal::Decimal` cho mọi số tiền.

use crate::error::{CoreError, CoreResult};
use crate::rate::RateConfig;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Làm tròn số tiền USD về 2 chữ số (cent), half away from zero.
pub fn round_usd(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount * percent / 100`, không làm tròn.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}

/// Kết quả quy đổi một cashout theo RateConfig.
///
/// `exact_usd` được dùng để kiểm tra hạn mức; các trường còn lại đã làm tròn
/// về cent và là giá trị được ghi vào transaction.
///
/// # Examples
/// ```
/// use cashpoint_core::{CashoutBreakdown, RateConfig};
/// use rust_decimal_macros::dec;
///
/// let config = RateConfig::fallback(Default::default(), chrono::Utc::now());
/// let b = CashoutBreakdown::compute(6_000, &config).unwrap();
/// assert_eq!(b.usd_amount, dec!(6.00));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashoutBreakdown {
    /// Số token bị trừ
    pub token_amount: i64,
    /// `token_amount / tokens_per_dollar` chưa làm tròn
    pub exact_usd: Decimal,
    /// Giá trị USD của cashout (cent)
    pub usd_amount: Decimal,
    /// Hoa hồng venue (cent)
    pub venue_commission: Decimal,
    /// Tiền mặt trả cho customer = usd_amount - venue_commission
    pub cash_to_customer: Decimal,
}

impl CashoutBreakdown {
    /// Quy đổi `token_amount` theo config.
    pub fn compute(token_amount: i64, config: &RateConfig) -> CoreResult<Self> {
        if token_amount <= 0 {
            return Err(CoreError::InvalidAmount(format!(
                "token amount must be positive: {}",
                token_amount
            )));
        }

        let exact_usd = Decimal::from(token_amount)
            .checked_div(config.tokens_per_dollar)
            .ok_or(CoreError::InvalidRate(config.tokens_per_dollar))?;

        let usd_amount = round_usd(exact_usd);
        let venue_commission = round_usd(percent_of(usd_amount, config.venue_commission_percent));

        Ok(Self {
            token_amount,
            exact_usd,
            usd_amount,
            venue_commission,
            cash_to_customer: usd_amount - venue_commission,
        })
    }
}

impl fmt::Display for CashoutBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tokens = ${} (commission ${}, cash ${})",
            self.token_amount, self.usd_amount, self.venue_commission, self.cash_to_customer
        )
    }
}
