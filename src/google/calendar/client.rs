use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

use super::model::{CalendarEventsResponse, CalendarListEntry, CalendarListResponse, EventItem};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Error, Debug)]
pub enum GoogleCalendarError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

pub struct GoogleCalendarClient {
    client: Client,
    access_token: String,
    base_url: Url,
}

impl GoogleCalendarClient {
    pub fn new<T: Into<String>>(token: T) -> anyhow::Result<Self> {
        let base_url = Url::parse(CALENDAR_API_BASE)
            .map_err(|e| GoogleCalendarError::InvalidUrl(e.to_string()))?;
        Ok(Self::with_base_url(Client::new(), token, base_url))
    }

    pub fn with_base_url<T: Into<String>>(client: Client, token: T, base_url: Url) -> Self {
        GoogleCalendarClient {
            client,
            access_token: token.into(),
            base_url,
        }
    }

    pub async fn fetch_calendar_list(&self) -> anyhow::Result<Vec<CalendarListEntry>> {
        let url = api_url(&self.base_url, &["users", "me", "calendarList"])?;

        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(url.clone()).bearer_auth(&self.access_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page = request
                .send()
                .await
                .map_err(GoogleCalendarError::from)?
                .error_for_status()
                .map_err(GoogleCalendarError::from)?
                .json::<CalendarListResponse>()
                .await
                .map_err(GoogleCalendarError::from)?;

            calendars.extend(page.items);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = calendars.len(), "fetched calendar list");
        Ok(calendars)
    }

    pub async fn fetch_calendar_events(
        &self,
        calendar_id: &str,
        since: &str,
        until: &str,
    ) -> anyhow::Result<Vec<EventItem>> {
        let url = api_url(&self.base_url, &["calendars", calendar_id, "events"])?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", since),
                ("timeMax", until),
                ("showDeleted", "false"),
                ("singleEvents", "true"),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.as_str()));
            }

            let page = self
                .client
                .get(url.clone())
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await
                .map_err(GoogleCalendarError::from)?
                .error_for_status()
                .map_err(GoogleCalendarError::from)?
                .json::<CalendarEventsResponse>()
                .await
                .map_err(GoogleCalendarError::from)?;

            events.extend(page.items);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "fetched calendar events");
        Ok(events)
    }
}

/// Builds an API url, percent-encoding each segment (calendar ids may contain `#`).
fn api_url(base: &Url, segments: &[&str]) -> Result<Url, GoogleCalendarError> {
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|_| GoogleCalendarError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn google_base() -> Url {
        Url::parse(CALENDAR_API_BASE).unwrap()
    }

    /// Serves one canned JSON body per connection and returns the request lines it saw.
    async fn serve_pages(
        pages: Vec<&'static str>,
    ) -> anyhow::Result<(Url, JoinHandle<anyhow::Result<Vec<String>>>)> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let base_url = Url::parse(&format!("http://{}/calendar/v3", listener.local_addr()?))?;

        let server = tokio::spawn(async move {
            let mut request_lines = Vec::new();
            for body in pages {
                let (mut stream, _) = listener.accept().await?;

                let mut reader = BufReader::new(&mut stream);
                let mut request_line = String::new();
                reader.read_line(&mut request_line).await?;
                loop {
                    let mut header = String::new();
                    let read = reader.read_line(&mut header).await?;
                    if read == 0 || header == "\r\n" {
                        break;
                    }
                }
                request_lines.push(request_line.trim_end().to_string());

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await?;
            }
            Ok::<_, anyhow::Error>(request_lines)
        });

        Ok((base_url, server))
    }

    fn local_client(base_url: Url) -> anyhow::Result<GoogleCalendarClient> {
        let http = Client::builder().no_proxy().build()?;
        Ok(GoogleCalendarClient::with_base_url(http, "ya29.test", base_url))
    }

    #[test]
    fn test_calendar_list_url() -> anyhow::Result<()> {
        let url = api_url(&google_base(), &["users", "me", "calendarList"])?;
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/users/me/calendarList"
        );
        Ok(())
    }

    #[test]
    fn test_events_url_encodes_calendar_id() -> anyhow::Result<()> {
        let url = api_url(&google_base(), &[
            "calendars",
            "en.usa#holiday@group.v.calendar.google.com",
            "events",
        ])?;
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/en.usa%23holiday@group.v.calendar.google.com/events"
        );
        Ok(())
    }

    #[test]
    fn test_events_url_encodes_slash() -> anyhow::Result<()> {
        let url = api_url(&google_base(), &["calendars", "a/b", "events"])?;
        assert!(url.as_str().ends_with("/calendars/a%2Fb/events"));
        Ok(())
    }

    #[tokio::test]
    async fn test_calendar_list_follows_page_token() -> anyhow::Result<()> {
        let (base_url, server) = serve_pages(vec![
            r#"{"items": [{"id": "me@example.com", "summary": "Me"}], "nextPageToken": "page-2"}"#,
            r#"{"items": [{"id": "team@group.calendar.google.com", "summary": "Team"}]}"#,
        ])
        .await?;

        let calendars = local_client(base_url)?.fetch_calendar_list().await?;
        let requests = server.await??;

        let ids: Vec<&str> = calendars.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["me@example.com", "team@group.calendar.google.com"]);
        assert_eq!(
            requests,
            vec![
                "GET /calendar/v3/users/me/calendarList HTTP/1.1",
                "GET /calendar/v3/users/me/calendarList?pageToken=page-2 HTTP/1.1",
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_calendar_events_follows_page_token() -> anyhow::Result<()> {
        let (base_url, server) = serve_pages(vec![
            r#"{"items": [{"id": "a", "start": {"dateTime": "2024-01-01T09:00:00Z"}}], "nextPageToken": "p2"}"#,
            r#"{"items": [{"id": "b", "start": {"date": "2024-01-02"}}]}"#,
        ])
        .await?;

        let events = local_client(base_url)?
            .fetch_calendar_events("me@example.com", "2024-01-01T10:00:00Z", "2024-01-02T10:00:00Z")
            .await?;
        let requests = server.await??;

        let ids: Vec<Option<&str>> = events.iter().map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("a"), Some("b")]);

        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /calendar/v3/calendars/me@example.com/events?"));
        assert!(requests[0].contains("singleEvents=true"));
        assert!(!requests[0].contains("pageToken"));
        assert!(requests[1].contains("pageToken=p2"));
        assert!(requests[1].contains("timeMin=2024-01-01T10%3A00%3A00Z"));

        Ok(())
    }
}
