//! Local-time helpers; the service runs on KST (UTC+9) unless configured otherwise.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

/// Fixed offset for `hours` east of UTC. Out-of-range values fall back to UTC.
pub fn offset(hours: i32) -> FixedOffset {
    hours.checked_mul(3600).and_then(FixedOffset::east_opt).unwrap_or_else(|| {
        tracing::warn!(hours, "invalid TIMEZONE_OFFSET; using UTC");
        Utc.fix()
    })
}

/// Calendar date of `now` in the configured zone.
pub fn local_date(now: DateTime<Utc>, hours: i32) -> NaiveDate {
    now.with_timezone(&offset(hours)).date_naive()
}

/// Monday = 0 … Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> i64 {
    i64::from(date.weekday().num_days_from_monday())
}

/// UTC instant at which the local day containing `now` began.
pub fn start_of_local_day(now: DateTime<Utc>, hours: i32) -> DateTime<Utc> {
    let tz = offset(hours);
    let midnight = local_date(now, hours).and_hms_opt(0, 0, 0).unwrap_or_default();
    tz.from_local_datetime(&midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}
