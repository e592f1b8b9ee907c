use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use std::fmt::Write;
use tracing::{debug, warn};

use crate::core::collection::EventCollection;
use crate::core::event::Clock;
use crate::core::normalize::{normalize_event, NormalizeError};
use crate::core::report::render;
use crate::core::source::CalendarSource;
use crate::google::calendar::model::{CalendarListEntry, EventItem};
use crate::shared::utils::date::fetch_window;

pub struct Agenda<S, C> {
    source: S,
    clock: C,
    fetch_concurrency: usize,
}

/// Everything gathered from the calendars for one reference instant.
#[derive(Debug, Default)]
pub struct Collected {
    pub events: EventCollection,
    /// Display names of calendars that returned no events, in calendar-list order.
    pub empty_calendars: Vec<String>,
    pub skipped: usize,
}

impl<S: CalendarSource, C: Clock> Agenda<S, C> {
    pub fn new(source: S, clock: C, fetch_concurrency: usize) -> Self {
        Self {
            source,
            clock,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Fetches the next day of events from every calendar.
    ///
    /// Fetches run concurrently, but results are consumed in calendar-list
    /// order, so the collection is built the same way as a sequential fetch.
    pub async fn collect(&self, now: DateTime<Utc>) -> anyhow::Result<Collected> {
        let (time_min, time_max) = fetch_window(now);
        let (time_min, time_max) = (time_min.as_str(), time_max.as_str());

        let calendars = self
            .source
            .list_calendars()
            .await
            .context("Unable to retrieve calendar list")?;

        debug!(
            calendars = calendars.len(),
            time_min, time_max, "fetching events"
        );

        let fetches = calendars.iter().map(|calendar| async move {
            self.source
                .list_events(&calendar.id, time_min, time_max)
                .await
                .with_context(|| {
                    format!(
                        "Unable to retrieve events for calendar {}",
                        calendar.display_name()
                    )
                })
                .map(|items| (calendar, items))
        });

        let results: Vec<(&CalendarListEntry, Vec<EventItem>)> = stream::iter(fetches)
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        let mut collected = Collected::default();
        for (calendar, items) in results {
            if items.is_empty() {
                collected
                    .empty_calendars
                    .push(calendar.display_name().to_string());
                continue;
            }

            for item in &items {
                match normalize_event(item) {
                    Ok(event) => {
                        collected.events.insert(event);
                    }
                    Err(err @ NormalizeError::MissingStart(_)) => {
                        debug!(calendar = calendar.display_name(), "skipping record: {}", err);
                        collected.skipped += 1;
                    }
                    Err(err @ NormalizeError::UnparseableStart(..)) => {
                        warn!(calendar = calendar.display_name(), "skipping record: {}", err);
                        collected.skipped += 1;
                    }
                }
            }
        }

        if collected.skipped > 0 {
            warn!(skipped = collected.skipped, "some events had no usable start time");
        }
        if collected.events.is_empty() {
            debug!("no events in the fetch window");
        } else {
            debug!(events = collected.events.len(), "collected distinct events");
        }

        Ok(collected)
    }

    /// Builds today's report. The clock is read once and that instant is used
    /// for both the fetch window and the ongoing/today split.
    pub async fn today(&self) -> anyhow::Result<String> {
        let now = self.clock.now();
        let collected = self.collect(now).await?;

        let mut out = String::new();
        for name in &collected.empty_calendars {
            writeln!(out, "No upcoming events found for calendar {}", name)?;
        }
        if !collected.empty_calendars.is_empty() {
            out.push('\n');
        }

        let partition = collected.events.finalize(now);
        out.push_str(&render(&partition));

        Ok(out)
    }
}
