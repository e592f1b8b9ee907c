use chrono::{DateTime, FixedOffset, Utc};

/// RFC 1123 with a numeric zone, e.g. `Mon, 01 Jan 2024 09:00:00 +0000`.
const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A normalized event. Two events are equal when both the instant and the
/// rendered line match; calendar identity plays no part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    timestamp: DateTime<Utc>,
    display_line: String,
}

impl Event {
    /// Builds the event, rendering the time in the offset it was written in.
    pub fn new(start: DateTime<FixedOffset>, title: &str) -> Self {
        Self {
            timestamp: start.with_timezone(&Utc),
            display_line: format!("{} -- {}\n", start.format(DISPLAY_FORMAT), title),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn display_line(&self) -> &str {
        &self.display_line
    }

    pub fn is_after(&self, now: DateTime<Utc>) -> bool {
        self.timestamp > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn test_display_line() {
        let event = Event::new(at("2024-01-01T09:00:00Z"), "Standup");
        assert_eq!(
            event.display_line(),
            "Mon, 01 Jan 2024 09:00:00 +0000 -- Standup\n"
        );
    }

    #[test]
    fn test_display_line_keeps_source_offset() {
        let event = Event::new(at("2025-01-06T09:30:00+09:00"), "Check Email & Prep");
        assert_eq!(
            event.display_line(),
            "Mon, 06 Jan 2025 09:30:00 +0900 -- Check Email & Prep\n"
        );
        assert_eq!(
            event.timestamp(),
            Utc.with_ymd_and_hms(2025, 1, 6, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_equality_uses_time_and_line() {
        let a = Event::new(at("2024-01-01T09:00:00Z"), "Standup");
        let b = Event::new(at("2024-01-01T09:00:00Z"), "Standup");
        let c = Event::new(at("2024-01-01T09:00:00Z"), "Retro");
        let d = Event::new(at("2024-01-01T09:30:00Z"), "Standup");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_same_instant_different_offset_is_distinct() {
        // Same instant, but the rendered line differs.
        let utc = Event::new(at("2024-01-01T09:00:00Z"), "Standup");
        let cet = Event::new(at("2024-01-01T10:00:00+01:00"), "Standup");

        assert_eq!(utc.timestamp(), cet.timestamp());
        assert_ne!(utc, cet);
    }

    #[test]
    fn test_is_after() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        assert!(!Event::new(at("2024-01-01T09:00:00Z"), "a").is_after(now));
        assert!(!Event::new(at("2024-01-01T10:00:00Z"), "b").is_after(now));
        assert!(Event::new(at("2024-01-01T11:00:00Z"), "c").is_after(now));
    }
}
