//! Calendar events and the providers that supply them.
//!
//! The engine only consumes events for a single day. Real providers live
//! outside this crate; the implementations here cover fixed event lists,
//! a deterministic generated day, and a primary-then-generated fallback.

mod generated;

pub use generated::GeneratedCalendar;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::{CalendarError, Result, ValidationError};

/// A fixed event already on the user's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
}

impl CalendarEvent {
    /// Create a new calendar event
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            location: None,
            attendees: Vec::new(),
        }
    }

    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Check if this event overlaps with a time range
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && self.end > start
    }

    /// Reject events whose end is not after their start.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidTimeRange`] naming the event.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.start >= self.end {
            return Err(ValidationError::InvalidTimeRange {
                subject: format!("event {}", self.id),
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Source of calendar events for a user and day.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Provider identifier used in logs (e.g. "static", "generated").
    fn name(&self) -> &str;

    /// Fetch all events for `user_id` on `date`.
    async fn fetch_events(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEvent>>;
}

/// Provider backed by a fixed list of events.
///
/// Events on other dates are filtered out so one file can hold several days.
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    events: Vec<CalendarEvent>,
}

impl StaticCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self { events }
    }

    /// Load a JSON array of events from disk.
    ///
    /// # Errors
    /// Returns an IO error if the file cannot be read, or
    /// [`CalendarError::Malformed`] if it is not an event array.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let events: Vec<CalendarEvent> = serde_json::from_str(&content)
            .map_err(|e| CalendarError::Malformed(format!("{}: {e}", path.display())))?;
        Ok(Self::new(events))
    }
}

#[async_trait]
impl CalendarProvider for StaticCalendar {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_events(&self, _user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.start.date() == date || e.end.date() == date)
            .cloned()
            .collect())
    }
}

/// Tries a primary provider and falls back to a generated day on failure.
pub struct FallbackCalendar {
    primary: Arc<dyn CalendarProvider>,
    fallback: GeneratedCalendar,
}

impl FallbackCalendar {
    pub fn new(primary: Arc<dyn CalendarProvider>, fallback: GeneratedCalendar) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl CalendarProvider for FallbackCalendar {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn fetch_events(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        match self.primary.fetch_events(user_id, date).await {
            Ok(events) => Ok(events),
            Err(e) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    error = %e,
                    "calendar provider failed, using generated events"
                );
                self.fallback.fetch_events(user_id, date).await
            }
        }
    }
}
