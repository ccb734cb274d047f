//! Time utilities: whole-unit calendar arithmetic and timezone-aware input parsing.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("invalid timezone: {0}")]
    Timezone(String),

    #[error("invalid local datetime '{0}' (expected YYYY-MM-DD or YYYY-MM-DD HH:MM)")]
    Format(String),

    #[error("ambiguous or invalid local time (DST?): {0}")]
    Ambiguous(String),
}

/// Whole days from `from` to `to`; zero when `to` precedes `from`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> u64 {
    u64::try_from((to - from).num_days()).unwrap_or(0)
}

/// Whole calendar months from `from` to `to`; zero when `to` precedes `from`.
///
/// A month is only complete once the day-of-month of `from` is reached again,
/// so 2024-01-31 to 2024-04-30 is two months and 2024-05-01 is three.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u64 {
    let mut months = i64::from(to.year() - from.year()) * 12 + i64::from(to.month())
        - i64::from(from.month());
    if to.day() < from.day() {
        months -= 1;
    }
    u64::try_from(months).unwrap_or(0)
}

/// First date at which `months_between(from, date) >= n`.
///
/// When the target month is too short for `from`'s day, the month is only
/// complete on the first day of the following month.
pub fn add_whole_months(from: NaiveDate, n: u32) -> Option<NaiveDate> {
    let total = i64::from(from.month0()) + i64::from(n);
    let year = i32::try_from(i64::from(from.year()) + total / 12).ok()?;
    let month = u32::try_from(total % 12).ok()? + 1;

    // December has 31 days, so the fallback never leaves the year.
    NaiveDate::from_ymd_opt(year, month, from.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, month + 1, 1))
}

pub fn add_days(from: NaiveDate, n: u64) -> Option<NaiveDate> {
    from.checked_add_days(Days::new(n))
}

/// Parse "2026-02-20" or "2026-02-20 14:30" in an IANA tz like "America/Chicago",
/// returning UTC. A bare date means local midnight.
pub fn parse_local_datetime_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>, TimeError> {
    let zone: Tz = tz
        .parse()
        .map_err(|_| TimeError::Timezone(tz.to_string()))?;

    let trimmed = local.trim();
    let ndt = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M")
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| TimeError::Format(local.to_string()))?;

    let local_dt = zone
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| TimeError::Ambiguous(format!("{local} {tz}")))?;

    Ok(local_dt.with_timezone(&Utc))
}
