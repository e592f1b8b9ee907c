use async_trait::async_trait;

use crate::google::calendar::client::GoogleCalendarClient;
use crate::google::calendar::model::{CalendarListEntry, EventItem};

/// Where raw calendar data comes from. Errors are fatal to the run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_calendars(&self) -> anyhow::Result<Vec<CalendarListEntry>>;

    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> anyhow::Result<Vec<EventItem>>;
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn list_calendars(&self) -> anyhow::Result<Vec<CalendarListEntry>> {
        self.fetch_calendar_list().await
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: &str,
        time_max: &str,
    ) -> anyhow::Result<Vec<EventItem>> {
        self.fetch_calendar_events(calendar_id, time_min, time_max)
            .await
    }
}
