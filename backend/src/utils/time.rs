use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// First instant and last second of a calendar month, or `None` for an invalid month.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((
        start_of_day(first),
        start_of_day(next) - Duration::seconds(1),
    ))
}

/// Start of the calendar month `offset` months before the one containing `now`.
pub fn month_start_before(now: DateTime<Utc>, offset: u32) -> Option<DateTime<Utc>> {
    let total = now.year() * 12 + now.month0() as i32 - offset as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).map(start_of_day)
}

/// The window of equal length that ends right before `start`.
pub fn previous_period(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let length = end - start;
    let previous_end = start - Duration::seconds(1);
    (previous_end - length, previous_end)
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}
