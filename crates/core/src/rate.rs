//! # Rate Module
//!
//! Định nghĩa RateConfig - tỷ giá token/USD và các hạn mức cashout,
//! có hiệu lực trong cửa sổ thời gian `[effective_from, effective_to)`.

use crate::config::RateDefaults;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id dành riêng cho config dựng từ defaults (không có trong DB).
pub const DEFAULT_CONFIG_ID: &str = "default";

/// Cấu hình tỷ giá và hạn mức.
///
/// Tất cả hạn mức tính bằng USD. Tại mọi thời điểm chỉ có tối đa một config
/// `is_active = true` với `effective_to = None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateConfig {
    pub id: String,
    /// Số token đổi được 1 USD (> 0)
    pub tokens_per_dollar: Decimal,
    pub min_cashout: Decimal,
    pub max_cashout_per_transaction: Decimal,
    pub daily_limit_per_customer: Decimal,
    pub daily_limit_per_staff: Decimal,
    /// Phần trăm hoa hồng venue, trong [0, 100]
    pub venue_commission_percent: Decimal,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl RateConfig {
    /// Dựng config từ defaults, dùng khi DB chưa có config nào active.
    pub fn fallback(defaults: RateDefaults, now: DateTime<Utc>) -> Self {
        Self {
            id: DEFAULT_CONFIG_ID.to_string(),
            tokens_per_dollar: defaults.tokens_per_dollar,
            min_cashout: defaults.min_cashout,
            max_cashout_per_transaction: defaults.max_cashout_per_transaction,
            daily_limit_per_customer: defaults.daily_limit_per_customer,
            daily_limit_per_staff: defaults.daily_limit_per_staff,
            venue_commission_percent: defaults.venue_commission_percent,
            effective_from: now,
            effective_to: None,
            is_active: true,
            created_by: "system".to_string(),
            created_at: now,
        }
    }

    /// Config có hiệu lực tại `as_of` không
    pub fn is_effective_at(&self, as_of: DateTime<Utc>) -> bool {
        self.is_active
            && self.effective_from <= as_of
            && self.effective_to.map_or(true, |to| as_of < to)
    }
}

/// Dữ liệu đầu vào để tạo RateConfig mới.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRateConfig {
    pub tokens_per_dollar: Decimal,
    pub min_cashout: Decimal,
    pub max_cashout_per_transaction: Decimal,
    pub daily_limit_per_customer: Decimal,
    pub daily_limit_per_staff: Decimal,
    pub venue_commission_percent: Decimal,
    /// None = hiệu lực ngay lúc tạo
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
}

impl NewRateConfig {
    /// Kiểm tra các trường số: phải dương, commission trong [0, 100],
    /// và min_cashout không vượt quá max_cashout_per_transaction.
    pub fn validate(&self) -> CoreResult<()> {
        if self.tokens_per_dollar <= Decimal::ZERO {
            return Err(CoreError::InvalidRate(self.tokens_per_dollar));
        }

        let positives = [
            ("min_cashout", self.min_cashout),
            ("max_cashout_per_transaction", self.max_cashout_per_transaction),
            ("daily_limit_per_customer", self.daily_limit_per_customer),
            ("daily_limit_per_staff", self.daily_limit_per_staff),
        ];
        for (field, value) in positives {
            if value <= Decimal::ZERO {
                return Err(CoreError::ValidationError(format!(
                    "{} must be positive, got {}",
                    field, value
                )));
            }
        }

        if self.venue_commission_percent < Decimal::ZERO
            || self.venue_commission_percent > Decimal::ONE_HUNDRED
        {
            return Err(CoreError::PercentageOutOfRange {
                field: "venue_commission_percent".to_string(),
                value: self.venue_commission_percent,
            });
        }

        if self.min_cashout > self.max_cashout_per_transaction {
            return Err(CoreError::ValidationError(format!(
                "min_cashout {} exceeds max_cashout_per_transaction {}",
                self.min_cashout, self.max_cashout_per_transaction
            )));
        }

        Ok(())
    }

    /// Tạo RateConfig active từ input đã validate.
    pub fn into_config(
        self,
        id: String,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> RateConfig {
        RateConfig {
            id,
            tokens_per_dollar: self.tokens_per_dollar,
            min_cashout: self.min_cashout,
            max_cashout_per_transaction: self.max_cashout_per_transaction,
            daily_limit_per_customer: self.daily_limit_per_customer,
            daily_limit_per_staff: self.daily_limit_per_staff,
            venue_commission_percent: self.venue_commission_percent,
            effective_from: self.effective_from.unwrap_or(now),
            effective_to: None,
            is_active: true,
            created_by: created_by.to_string(),
            created_at: now,
        }
    }
}

impl From<RateDefaults> for NewRateConfig {
    fn from(defaults: RateDefaults) -> Self {
        Self {
            tokens_per_dollar: defaults.tokens_per_dollar,
            min_cashout: defaults.min_cashout,
            max_cashout_per_transaction: defaults.max_cashout_per_transaction,
            daily_limit_per_customer: defaults.daily_limit_per_customer,
            daily_limit_per_staff: defaults.daily_limit_per_staff,
            venue_commission_percent: defaults.venue_commission_percent,
            effective_from: None,
        }
    }
}

/// Nguồn của config đang dùng
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Config lưu trong `rate_configs`
    Stored,
    /// Không có config active, dùng defaults hard-coded
    Defaults,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::Stored => "stored",
            ConfigSource::Defaults => "defaults",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Config đang có hiệu lực cùng với nguồn của nó.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRate {
    pub config: RateConfig,
    pub source: ConfigSource,
}

impl EffectiveRate {
    pub fn is_default(&self) -> bool {
        self.source == ConfigSource::Defaults
    }
}
