use chrono::{DateTime, NaiveDate};
use thiserror::Error;

use crate::core::event::Event;
use crate::google::calendar::model::EventItem;
use crate::shared::utils::date::midnight_utc;

const NO_SUMMARY: &str = "(no summary)";

/// Reasons a raw record yields no event. Neither is fatal to a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("event {0} has no start time")]
    MissingStart(String),
    #[error("event {0} has an unparseable start time '{1}'")]
    UnparseableStart(String, String),
}

/// Converts a raw calendar item into an [`Event`].
///
/// `dateTime` values are RFC 3339. All-day `date` values become midnight UTC
/// of that day.
pub fn normalize_event(item: &EventItem) -> Result<Event, NormalizeError> {
    let id = || item.id.clone().unwrap_or_else(|| "<no id>".to_string());

    let raw = item
        .start_value()
        .ok_or_else(|| NormalizeError::MissingStart(id()))?;

    let start = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt,
        Err(_) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|date| midnight_utc(date).fixed_offset())
            .map_err(|_| NormalizeError::UnparseableStart(id(), raw.to_string()))?,
    };

    let title = item.summary.as_deref().unwrap_or(NO_SUMMARY);

    Ok(Event::new(start, title))
}
