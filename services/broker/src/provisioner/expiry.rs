//! Credential expiry computation.

use std::num::NonZeroU32;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

/// Extra time granted past the paid period, so a renewal reminder sent on the
/// expiry date still reaches a working credential.
pub const GRACE_PERIOD: Days = Days::new(1);

/// Advance `at` by `months` calendar months, keeping the day of month.
///
/// A day past the end of the target month rolls over into the following
/// month (Jan 31 + 1 month is Mar 3 in a common year), so no paid day is lost.
fn advance_months(at: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    let month0 = i64::from(at.month0()) + i64::from(months);
    let year = i32::try_from(i64::from(at.year()) + month0 / 12).ok()?;
    let month = u32::try_from(month0 % 12).ok()? + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let date = first.checked_add_days(Days::new(u64::from(at.day0())))?;
    Some(date.and_time(at.time()).and_utc())
}

/// Hard expiry for a credential valid `months` calendar months from `now`.
///
/// Returns `None` if the result leaves chrono's range.
pub fn expires_at(now: DateTime<Utc>, months: NonZeroU32) -> Option<DateTime<Utc>> {
    advance_months(now, months.get())?.checked_add_days(GRACE_PERIOD)
}
