use serde::Deserialize;

#[allow(dead_code)]
#[derive(Deserialize, Debug)]
pub struct CalendarListResponse {
    #[serde(rename = "kind")]
    pub kind: Option<String>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "items", default)]
    pub items: Vec<CalendarListEntry>,
}

#[allow(dead_code)]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CalendarListEntry {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "summary")]
    pub summary: Option<String>,
    #[serde(rename = "summaryOverride")]
    pub summary_override: Option<String>,
    #[serde(rename = "primary", default)]
    pub primary: bool,
}

impl CalendarListEntry {
    pub fn display_name(&self) -> &str {
        self.summary_override
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or(&self.id)
    }
}

#[allow(dead_code)]
#[derive(Deserialize, Debug)]
pub struct CalendarEventsResponse {
    #[serde(rename = "kind")]
    pub kind: Option<String>,
    #[serde(rename = "summary")]
    pub summary: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "items", default)]
    pub items: Vec<EventItem>,
}

#[allow(dead_code)]
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EventItem {
    #[serde(rename = "id")]
    pub id: Option<String>,
    #[serde(rename = "status")]
    pub status: Option<String>,
    #[serde(rename = "summary")]
    pub summary: Option<String>,
    #[serde(rename = "start")]
    pub start: Option<EventDateTime>,
    #[serde(rename = "end")]
    pub end: Option<EventDateTime>,
}

#[allow(dead_code)]
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDateTime {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
    #[serde(rename = "date")]
    pub date: Option<String>,
}

impl EventItem {
    /// The raw start value: `dateTime` when set, otherwise the all-day `date`.
    pub fn start_value(&self) -> Option<&str> {
        let start = self.start.as_ref()?;
        start
            .date_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| start.date.as_deref().filter(|s| !s.is_empty()))
    }
}
