use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};

/// Bounds of the fetch window, `[now, now + 1 day]`, as RFC 3339 strings for `timeMin`/`timeMax`.
pub fn fetch_window(now: DateTime<Utc>) -> (String, String) {
    let until = now.checked_add_days(Days::new(1)).unwrap_or(DateTime::<Utc>::MAX_UTC);

    (
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        until.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
