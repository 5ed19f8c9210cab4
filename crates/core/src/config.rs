//! Engine configuration with configurable thresholds
//!
//! Every field has a serde default, so a partial JSON file only overrides
//! what it names.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Configuration for the settlement and reconciliation engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // === Calendar ===
    /// Offset of the reference timezone from UTC, in minutes.
    ///
    /// Every "calendar day" (cashout daily limits, reconciliation dates,
    /// timely-submission windows) is cut at midnight in this timezone.
    #[serde(default)]
    pub reference_utc_offset_minutes: i32,

    // === Compliance scoring ===
    /// Absolute variance percentage above which a pending row is auto-flagged
    #[serde(default = "default_variance_flag_threshold")]
    pub variance_flag_threshold_percent: Decimal,

    /// Hours after the close of the reconciliation day that still count as timely
    #[serde(default = "default_timely_submission_hours")]
    pub timely_submission_hours: i64,

    /// Score bonus for timely submissions (result capped at 100)
    #[serde(default = "default_timely_submission_bonus")]
    pub timely_submission_bonus: Decimal,

    // === Fallback rates ===
    /// Used when no rate config is active
    #[serde(default)]
    pub default_rates: RateDefaults,
}

/// Hard-coded fallback rates, used only when `rate_configs` has no active row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDefaults {
    #[serde(default = "default_tokens_per_dollar")]
    pub tokens_per_dollar: Decimal,
    #[serde(default = "default_min_cashout")]
    pub min_cashout: Decimal,
    #[serde(default = "default_max_cashout")]
    pub max_cashout_per_transaction: Decimal,
    #[serde(default = "default_daily_limit_customer")]
    pub daily_limit_per_customer: Decimal,
    #[serde(default = "default_daily_limit_staff")]
    pub daily_limit_per_staff: Decimal,
    #[serde(default)]
    pub venue_commission_percent: Decimal,
}

fn default_variance_flag_threshold() -> Decimal {
    Decimal::new(10, 0)
}

fn default_timely_submission_hours() -> i64 {
    24
}

fn default_timely_submission_bonus() -> Decimal {
    Decimal::new(5, 0)
}

fn default_tokens_per_dollar() -> Decimal {
    Decimal::new(1_000, 0)
}

fn default_min_cashout() -> Decimal {
    Decimal::new(5, 0)
}

fn default_max_cashout() -> Decimal {
    Decimal::new(500, 0)
}

fn default_daily_limit_customer() -> Decimal {
    Decimal::new(1_000, 0)
}

fn default_daily_limit_staff() -> Decimal {
    Decimal::new(5_000, 0)
}

impl Default for RateDefaults {
    fn default() -> Self {
        Self {
            tokens_per_dollar: default_tokens_per_dollar(),
            min_cashout: default_min_cashout(),
            max_cashout_per_transaction: default_max_cashout(),
            daily_limit_per_customer: default_daily_limit_customer(),
            daily_limit_per_staff: default_daily_limit_staff(),
            venue_commission_percent: Decimal::ZERO,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_utc_offset_minutes: 0,
            variance_flag_threshold_percent: default_variance_flag_threshold(),
            timely_submission_hours: default_timely_submission_hours(),
            timely_submission_bonus: default_timely_submission_bonus(),
            default_rates: RateDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Reject values that would silently change how days are cut
    pub fn validate(&self) -> CoreResult<()> {
        if self.checked_offset().is_none() {
            return Err(CoreError::ValidationError(format!(
                "reference_utc_offset_minutes must be within ±1439, got {}",
                self.reference_utc_offset_minutes
            )));
        }
        if self.timely_submission_hours < 0 {
            return Err(CoreError::ValidationError(format!(
                "timely_submission_hours must not be negative, got {}",
                self.timely_submission_hours
            )));
        }
        Ok(())
    }

    fn checked_offset(&self) -> Option<FixedOffset> {
        self.reference_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Reference timezone; configs that skipped `validate` fall back to UTC.
    pub fn reference_offset(&self) -> FixedOffset {
        self.checked_offset().unwrap_or_else(|| Utc.fix())
    }

    /// Calendar day of `at` in the reference timezone
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.reference_offset()).date_naive()
    }

    /// `[start, end)` of `date` in the reference timezone, as UTC instants
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let offset = Duration::seconds(self.reference_offset().local_minus_utc() as i64);
        let start = Utc.from_utc_datetime(&(local_midnight - offset));
        (start, start + Duration::days(1))
    }

    /// Submitted no later than `timely_submission_hours` after the day closed
    pub fn is_timely(&self, date: NaiveDate, submitted_at: DateTime<Utc>) -> bool {
        let (_, day_end) = self.day_bounds(date);
        submitted_at <= day_end + Duration::hours(self.timely_submission_hours)
    }
}
