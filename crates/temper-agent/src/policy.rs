//! Retention policy: how long each retention class keeps its entries

use serde::{Deserialize, Serialize};
use std::time::Duration;
use temper_domain::RetentionClass;

/// Maximum age per retention class, in whole hours
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use temper_agent::RetentionPolicy;
/// use temper_domain::RetentionClass;
///
/// let policy = RetentionPolicy::default();
/// assert_eq!(policy.max_age(RetentionClass::Daily), Duration::from_secs(24 * 3600));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Maximum age of daily entries (in hours)
    /// Default: 24 hours
    #[serde(default = "default_daily_hours")]
    pub daily_hours: u64,

    /// Maximum age of weekly entries (in hours)
    /// Default: 168 hours (7 days)
    #[serde(default = "default_weekly_hours")]
    pub weekly_hours: u64,

    /// Maximum age of monthly entries (in hours)
    /// Default: 720 hours (30 days)
    #[serde(default = "default_monthly_hours")]
    pub monthly_hours: u64,
}

fn default_daily_hours() -> u64 {
    24
}

fn default_weekly_hours() -> u64 {
    7 * 24
}

fn default_monthly_hours() -> u64 {
    30 * 24
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily_hours: default_daily_hours(),
            weekly_hours: default_weekly_hours(),
            monthly_hours: default_monthly_hours(),
        }
    }
}

impl RetentionPolicy {
    /// Maximum age in hours for a class
    pub fn max_age_hours(&self, class: RetentionClass) -> u64 {
        match class {
            RetentionClass::Daily => self.daily_hours,
            RetentionClass::Weekly => self.weekly_hours,
            RetentionClass::Monthly => self.monthly_hours,
        }
    }

    /// Maximum age of an entry of the given class
    pub fn max_age(&self, class: RetentionClass) -> Duration {
        Duration::from_secs(self.max_age_hours(class).saturating_mul(3600))
    }

    /// Whether longer-lived classes never expire sooner than shorter-lived ones
    pub fn is_monotonic(&self) -> bool {
        RetentionClass::ALL
            .windows(2)
            .all(|pair| self.max_age_hours(pair[0]) <= self.max_age_hours(pair[1]))
    }
}
