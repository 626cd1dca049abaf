//! Time and timestamp utilities

use chrono::{DateTime, Duration, FixedOffset, Local, SubsecRound, TimeZone};

/// Current local time with its UTC offset, at whole-second precision
pub fn now() -> DateTime<FixedOffset> {
    to_fixed(&Local::now()).trunc_subsecs(0)
}

/// Convert any zoned time to a fixed-offset one
pub fn to_fixed<Tz: TimeZone>(at: &DateTime<Tz>) -> DateTime<FixedOffset> {
    at.fixed_offset()
}

/// `at` moved forward by whole days
pub fn add_days(at: &DateTime<FixedOffset>, days: i64) -> DateTime<FixedOffset> {
    *at + Duration::days(days)
}
