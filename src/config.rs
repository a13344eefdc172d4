//! Scheduler configuration.
//!
//! Loaded from TOML or built in code:
//!
//! ```
//! use u_timetable::config::{RetentionPolicy, SchedulerConfig};
//!
//! let config = SchedulerConfig::from_toml_str(r#"
//!     periods_per_day = 6
//!     timezone = "Europe/Berlin"
//!     lock_timeout_ms = 500
//!     retention = "delete"
//! "#).unwrap();
//! assert_eq!(config.periods_per_day, 6);
//! assert_eq!(config.retention, RetentionPolicy::Delete);
//! ```

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};

/// What happens to Global entries replaced by refresh or promotion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Keep replaced entries in the store's archive.
    #[default]
    Archive,
    /// Drop replaced entries.
    Delete,
}

/// Scheduling core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Periods per teaching day (N in `1..=N`).
    pub periods_per_day: u8,
    /// School's local calendar, as an IANA timezone name.
    pub timezone: String,
    /// Maximum wait for a class or teacher lock.
    pub lock_timeout_ms: u64,
    /// Fate of replaced Global entries.
    pub retention: RetentionPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            periods_per_day: 8,
            timezone: "UTC".to_string(),
            lock_timeout_ms: 2_000,
            retention: RetentionPolicy::Archive,
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a TOML document. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| TimetableError::validation(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets periods per day.
    pub fn with_periods_per_day(mut self, periods: u8) -> Self {
        self.periods_per_day = periods;
        self
    }

    /// Sets the timezone name.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Sets the lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Lock timeout as a duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| TimetableError::validation(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.periods_per_day == 0 {
            return Err(TimetableError::validation("periods_per_day must be at least 1"));
        }
        self.tz()?;
        Ok(())
    }
}

/// Source of "today" in the school's calendar.
pub trait Clock: Send + Sync {
    /// Today's date in `tz`.
    fn today(&self, tz: Tz) -> NaiveDate;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self, tz: Tz) -> NaiveDate {
        Utc::now().with_timezone(&tz).date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self, _tz: Tz) -> NaiveDate {
        self.0
    }
}
