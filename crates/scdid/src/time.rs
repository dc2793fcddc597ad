use chrono::{DateTime, Datelike, Local, TimeZone};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// A trait for time sources that return the current wall-clock second.
///
/// This abstraction allows you to plug in the system clock or a fixed time
/// source in tests.
///
/// # Example
///
/// ```
/// use scdid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> u64 {
///         1_700_000_000
///     }
/// }
///
/// assert_eq!(FixedTime.current_secs(), 1_700_000_000);
/// ```
pub trait TimeSource {
    /// Returns the number of whole seconds since the Unix epoch.
    fn current_secs(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_secs(&self) -> u64 {
        (**self).current_secs()
    }
}

/// Reads `SystemTime::now()` on every call.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_secs(&self) -> u64 {
        // A clock set before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Maps a Unix second to a Gregorian calendar year and 1-based month.
pub trait Calendar {
    /// Returns `None` when `secs` cannot be represented as a date.
    fn year_month(&self, secs: u64) -> Option<(i32, u32)>;
}

impl<C: Calendar + ?Sized> Calendar for Arc<C> {
    fn year_month(&self, secs: u64) -> Option<(i32, u32)> {
        (**self).year_month(secs)
    }
}

/// Gregorian calendar in UTC.
#[derive(Copy, Clone, Debug, Default)]
pub struct UtcCalendar;

impl Calendar for UtcCalendar {
    fn year_month(&self, secs: u64) -> Option<(i32, u32)> {
        let dt = DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)?;
        Some((dt.year(), dt.month()))
    }
}

/// Gregorian calendar in the host's local timezone.
///
/// Producers on hosts with different timezones disagree on the month of
/// reference times near a month boundary. Prefer [`UtcCalendar`] unless every
/// producer is pinned to the same zone.
#[derive(Copy, Clone, Debug, Default)]
pub struct LocalCalendar;

impl Calendar for LocalCalendar {
    fn year_month(&self, secs: u64) -> Option<(i32, u32)> {
        let dt = Local
            .timestamp_opt(i64::try_from(secs).ok()?, 0)
            .single()?;
        Some((dt.year(), dt.month()))
    }
}
