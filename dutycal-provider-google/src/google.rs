//! Google Calendar client.
//!
//! Event calls go through `google_calendar::Client`. The push-notification
//! endpoints (`events.watch`, `channels.stop`) are plain REST calls, since
//! dutycal needs Google's channel response as-is.

use anyhow::{Context, Result, anyhow};
use dutycal_core::remote::PROP_APP;
use dutycal_core::remote::entry::EntryQuery;
use google_calendar::Client;
use google_calendar::types::{Event, OrderBy, SendUpdates};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::session::Session;
use crate::types::{Channel, ChannelRequest, StopChannelRequest};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

pub struct GoogleClient {
    client: Client,
    http: reqwest::Client,
    token: String,
    calendar_id: String,
}

/// Deleted (410) and unknown (404) resources are treated alike.
fn is_gone(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

/// Same check for errors surfaced by `google_calendar`, which only carry the
/// status in their message.
fn is_gone_error(error: &impl std::fmt::Display) -> bool {
    let message = error.to_string();
    ["404", "410", "Not Found", "Gone"]
        .iter()
        .any(|needle| message.contains(needle))
}

impl GoogleClient {
    pub async fn connect(calendar_id: &str) -> Result<Self> {
        let session = Session::load_valid().await?;
        Ok(Self::with_token(session.access_token(), calendar_id))
    }

    fn with_token(token: &str, calendar_id: &str) -> Self {
        GoogleClient {
            client: Client::new(
                String::new(),
                String::new(),
                String::new(),
                token.to_string(),
                String::new(),
            ),
            http: reqwest::Client::new(),
            token: token.to_string(),
            calendar_id: calendar_id.to_string(),
        }
    }

    /// All events matching `query`, across every page.
    pub async fn list_events(&self, query: &EntryQuery) -> Result<Vec<Event>> {
        let time_min = query.time_min.map(|t| t.to_rfc3339()).unwrap_or_default();
        let time_max = query.time_max.map(|t| t.to_rfc3339()).unwrap_or_default();
        let updated_min = query
            .updated_min
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let private: Vec<String> = query
            .tag
            .iter()
            .map(|tag| format!("{PROP_APP}={tag}"))
            .collect();

        let response = self
            .client
            .events()
            .list_all(
                &self.calendar_id,
                "",                 // i_cal_uid
                0,                  // max_attendees
                OrderBy::default(), // order_by
                &private,           // private_extended_property
                "",                 // q
                &[],                // shared_extended_property
                false,              // show_deleted
                false,              // show_hidden_invitations
                true,               // single_events
                &time_max,          // time_max
                &time_min,          // time_min
                "",                 // time_zone
                &updated_min,       // updated_min
            )
            .await
            .context("Failed to list events")?;

        debug!(count = response.body.len(), "Fetched events");
        Ok(response.body)
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<Event>> {
        match self
            .client
            .events()
            .get(&self.calendar_id, event_id, 0, "")
            .await
        {
            Ok(response) => Ok(Some(response.body).filter(|e| e.status != "cancelled")),
            Err(e) if is_gone_error(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to fetch event {event_id}")),
        }
    }

    pub async fn insert_event(&self, event: &Event) -> Result<Event> {
        let response = self
            .client
            .events()
            .insert(
                &self.calendar_id,
                0,
                0,
                false,
                SendUpdates::None,
                false,
                event,
            )
            .await
            .with_context(|| format!("Failed to create event: {}", event.summary))?;

        Ok(response.body)
    }

    pub async fn update_event(&self, event_id: &str, event: &Event) -> Result<Event> {
        let response = self
            .client
            .events()
            .update(
                &self.calendar_id,
                event_id,
                0,
                0,
                false,
                SendUpdates::None,
                false,
                event,
            )
            .await
            .with_context(|| format!("Failed to update event {event_id}"))?;

        Ok(response.body)
    }

    /// Deleting an event that is already gone succeeds.
    pub async fn delete_event(&self, event_id: &str) -> Result<()> {
        let result = self
            .client
            .events()
            .delete(&self.calendar_id, event_id, false, SendUpdates::None)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_gone_error(&e) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete event {event_id}")),
        }
    }

    fn url(segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(API_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid API base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {what}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to {what}: {status} {body}");
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response to {what}"))
    }

    pub async fn watch(&self, calendar_id: &str, address: &str) -> Result<Channel> {
        let url = Self::url(&["calendars", calendar_id, "events", "watch"])?;
        let body = ChannelRequest {
            id: uuid::Uuid::new_v4().to_string(),
            kind: "web_hook",
            address,
        };
        self.send(
            self.request(Method::POST, url).json(&body),
            &format!("watch calendar {calendar_id}"),
        )
        .await
    }

    pub async fn stop_channel(&self, channel_id: &str, resource_id: &str) -> Result<()> {
        let url = Self::url(&["channels", "stop"])?;
        let body = StopChannelRequest {
            id: channel_id,
            resource_id,
        };

        let response = self
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to stop channel {channel_id}"))?;

        let status = response.status();
        if status.is_success() || is_gone(status) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Failed to stop channel {channel_id}: {status} {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url_escapes_calendar_id() {
        let url = GoogleClient::url(&[
            "calendars",
            "family#1@group.calendar.google.com",
            "events",
            "watch",
        ])
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/family%231@group.calendar.google.com/events/watch"
        );
    }

    #[test]
    fn test_channel_stop_url() {
        let url = GoogleClient::url(&["channels", "stop"]).unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/calendar/v3/channels/stop");
    }

    #[test]
    fn test_gone_statuses() {
        assert!(is_gone(StatusCode::NOT_FOUND));
        assert!(is_gone(StatusCode::GONE));
        assert!(!is_gone(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_gone_errors_are_recognised_by_message() {
        assert!(is_gone_error(&"code 410, error: Resource has been deleted"));
        assert!(is_gone_error(&"404 Not Found"));
        assert!(!is_gone_error(&"403 Forbidden: rate limit exceeded"));
    }

    #[test]
    fn test_client_keeps_calendar_and_token() {
        let client = GoogleClient::with_token("ya29.token", "primary");
        assert_eq!(client.calendar_id, "primary");
        assert_eq!(client.token, "ya29.token");
    }
}
