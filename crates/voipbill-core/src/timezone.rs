//! Timezone utilities for date handling
//!
//! Billing days are bucketed at local midnight, so every conversion from a
//! calendar day to an epoch timestamp goes through a [`TimezoneConfig`].

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use tracing::debug;

use crate::error::{BillingError, Result};

/// Minutes per step when moving out of a DST gap
const GAP_STEP_MINUTES: i64 = 15;
const GAP_SEARCH_STEPS: i64 = 4 * 24;

/// Configuration for timezone handling
#[derive(Debug, Clone)]
pub struct TimezoneConfig {
    /// The timezone to use for date operations
    pub tz: Tz,
    /// Whether the timezone is UTC
    pub is_utc: bool,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        let tz = get_local_timezone();
        Self {
            is_utc: tz == Tz::UTC,
            tz,
        }
    }
}

impl TimezoneConfig {
    /// UTC configuration, mostly useful in tests
    pub fn utc() -> Self {
        Self {
            tz: Tz::UTC,
            is_utc: true,
        }
    }

    /// Create a new timezone configuration from CLI arguments
    pub fn from_cli(timezone_str: Option<&str>, use_utc: bool) -> Result<Self> {
        if use_utc {
            return Ok(Self::utc());
        }

        if let Some(tz_str) = timezone_str {
            let tz = Tz::from_str(tz_str).map_err(|_| {
                BillingError::InvalidTimezone(format!(
                    "'{}'. Use format like 'Europe/Madrid', 'America/New_York', or 'UTC'",
                    tz_str
                ))
            })?;
            Ok(Self {
                tz,
                is_utc: tz == Tz::UTC,
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Get the display name for the configured timezone
    pub fn display_name(&self) -> &str {
        if self.is_utc { "UTC" } else { self.tz.name() }
    }

    /// Today's date in the configured timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Epoch milliseconds of a local wall-clock time
    ///
    /// Ambiguous times (DST fold) resolve to the earlier instant. Times that
    /// do not exist locally (DST gap) move forward to the first valid local
    /// time, so a skipped midnight still lands on its own day.
    pub fn local_millis(&self, local: NaiveDateTime) -> i64 {
        if let Some(dt) = self.tz.from_local_datetime(&local).earliest() {
            return dt.timestamp_millis();
        }

        let shifted = (1..=GAP_SEARCH_STEPS)
            .map(|step| local + Duration::minutes(GAP_STEP_MINUTES * step))
            .find_map(|t| self.tz.from_local_datetime(&t).earliest());
        match shifted {
            Some(dt) => {
                debug!("{} does not exist in {}, using {}", local, self.tz.name(), dt);
                dt.timestamp_millis()
            }
            None => {
                debug!("{} does not exist in {}, reading as UTC", local, self.tz.name());
                local.and_utc().timestamp_millis()
            }
        }
    }

    /// Epoch milliseconds of local midnight of `date`
    pub fn midnight_millis(&self, date: NaiveDate) -> i64 {
        self.local_millis(date.and_time(chrono::NaiveTime::MIN))
    }
}

/// Detect the system's local timezone
///
/// This function attempts to detect the local timezone from the system.
/// If detection fails, it falls back to UTC.
pub fn get_local_timezone() -> Tz {
    // Try to get the timezone from the TZ environment variable first
    #[allow(clippy::collapsible_if)]
    if let Ok(tz_str) = std::env::var("TZ") {
        if let Ok(tz) = Tz::from_str(&tz_str) {
            debug!("Using timezone from TZ environment variable: {}", tz_str);
            return tz;
        }
    }

    match iana_time_zone::get_timezone() {
        Ok(tz_str) => match Tz::from_str(&tz_str) {
            Ok(tz) => {
                debug!("Using system timezone from iana-time-zone: {}", tz_str);
                tz
            }
            Err(_) => {
                debug!(
                    "Could not parse timezone from iana-time-zone: '{}', falling back to UTC",
                    tz_str
                );
                Tz::UTC
            }
        },
        Err(e) => {
            debug!(
                "Could not detect local timezone via iana-time-zone: {:?}, falling back to UTC",
                e
            );
            Tz::UTC
        }
    }
}
