//! Conversion between Google events and dutycal entries.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use dutycal_core::remote::entry::{EntryDraft, RemoteEntry};
use dutycal_core::remote::subscription::NotificationSubscription;
use google_calendar::types::{Event, EventDateTime};

use crate::types::Channel;

/// Channels without an expiration from Google live for a week.
const DEFAULT_CHANNEL_TTL_DAYS: i64 = 7;

/// `None` for cancelled events and events without an id or a usable start.
pub fn entry_from_google(event: Event) -> Option<RemoteEntry> {
    if event.status == "cancelled" || event.id.is_empty() {
        return None;
    }

    let start = event.start.as_ref()?;
    let date = start
        .date
        .or_else(|| start.date_time.map(|dt| dt.date_naive()))?;
    let properties = private_properties(&event);

    Some(RemoteEntry {
        id: event.id,
        date,
        title: event.summary,
        description: if event.description.is_empty() {
            None
        } else {
            Some(event.description)
        },
        properties,
        updated: event.updated,
    })
}

/// The event's private extended properties.
fn private_properties(event: &Event) -> BTreeMap<String, String> {
    event
        .extended_properties
        .as_ref()
        .and_then(|p| serde_json::to_value(p).ok())
        .and_then(|mut p| p.get_mut("private").map(serde_json::Value::take))
        .and_then(|private| serde_json::from_value(private).ok())
        .unwrap_or_default()
}

fn all_day(date: chrono::NaiveDate) -> EventDateTime {
    EventDateTime {
        date: Some(date),
        date_time: None,
        time_zone: String::new(),
    }
}

/// All-day, non-blocking event covering `draft.date`.
pub fn google_from_draft(draft: &EntryDraft) -> Result<Event> {
    let extended_properties = serde_json::from_value(serde_json::json!({
        "private": draft.properties,
    }))
    .context("Failed to encode entry properties")?;

    Ok(Event {
        summary: draft.title.clone(),
        description: draft.description.clone(),
        start: Some(all_day(draft.date)),
        end: Some(all_day(draft.date + Duration::days(1))),
        transparency: "transparent".to_string(),
        extended_properties: Some(extended_properties),
        ..Default::default()
    })
}

pub fn subscription_from_channel(
    channel: Channel,
    calendar_ref: &str,
) -> Result<NotificationSubscription> {
    let expires_at = match channel.expiration.as_deref() {
        Some(ms) => {
            let ms: i64 = ms
                .parse()
                .with_context(|| format!("Invalid channel expiration '{ms}'"))?;
            DateTime::<Utc>::from_timestamp_millis(ms)
                .with_context(|| format!("Channel expiration {ms} out of range"))?
        }
        None => Utc::now() + Duration::days(DEFAULT_CHANNEL_TTL_DAYS),
    };

    Ok(NotificationSubscription {
        subscription_id: channel.id,
        resource_ref: channel.resource_id,
        calendar_ref: calendar_ref.to_string(),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn event(json: serde_json::Value) -> Event {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_draft_becomes_all_day_event() {
        let draft = EntryDraft {
            date: date(3),
            title: "Sam".into(),
            description: "On duty: Sam".into(),
            properties: BTreeMap::from([("dutycal_app".to_string(), "dutycal".to_string())]),
        };

        let google = google_from_draft(&draft).unwrap();
        assert_eq!(google.start.as_ref().unwrap().date, Some(date(3)));
        assert_eq!(google.end.as_ref().unwrap().date, Some(date(4)));
        assert_eq!(google.transparency, "transparent");
        assert_eq!(private_properties(&google)["dutycal_app"], "dutycal");
    }

    #[test]
    fn test_entry_from_api_json() {
        let google = event(serde_json::json!({
            "id": "abc123",
            "status": "confirmed",
            "summary": "Alex",
            "start": { "date": "2025-02-05" },
            "end": { "date": "2025-02-06" },
            "updated": "2025-02-01T09:30:00.000Z",
            "extendedProperties": { "private": { "dutycal_parent": "Alex" } }
        }));

        let entry = entry_from_google(google).unwrap();
        assert_eq!(entry.id, "abc123");
        assert_eq!(entry.date, date(5));
        assert_eq!(entry.title, "Alex");
        assert_eq!(entry.description, None);
        assert_eq!(entry.properties["dutycal_parent"], "Alex");
        assert!(entry.updated.is_some());
    }

    #[test]
    fn test_timed_and_cancelled_events() {
        let timed = event(serde_json::json!({
            "id": "t1",
            "summary": "Dentist",
            "start": { "dateTime": "2025-02-07T10:00:00Z" },
            "end": { "dateTime": "2025-02-07T11:00:00Z" }
        }));
        let entry = entry_from_google(timed).unwrap();
        assert_eq!(entry.date, date(7));
        assert!(entry.properties.is_empty());

        let cancelled = event(serde_json::json!({
            "id": "c1",
            "status": "cancelled",
            "start": { "date": "2025-02-07" },
            "end": { "date": "2025-02-08" }
        }));
        assert!(entry_from_google(cancelled).is_none());
    }

    #[test]
    fn test_channel_expiration_millis() {
        let channel = Channel {
            id: "chan".into(),
            resource_id: "res".into(),
            expiration: Some("1767225600000".into()),
        };

        let sub = subscription_from_channel(channel, "primary").unwrap();
        assert_eq!(sub.expires_at.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(sub.resource_ref, "res");
    }
}
