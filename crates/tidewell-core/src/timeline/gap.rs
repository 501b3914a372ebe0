//! Time gap detection between calendar events.
//!
//! Finds the free slots of a day: the space before the first event, between
//! events, and after the last one, minus the sleep window. Overlapping events
//! are merged into a single occupied interval first.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::error::ValidationError;

/// Size category of a time gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSize {
    Small,  // < 30 minutes
    Medium, // 30-60 minutes
    Large,  // > 60 minutes
}

impl GapSize {
    /// Categorize a gap by its duration in minutes
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes < 30 {
            Self::Small
        } else if minutes <= 60 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

/// Where a gap sits relative to the day's events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    BeforeFirst,
    BetweenEvents,
    AfterLast,
    /// No events at all
    FullDay,
}

/// Daily sleep window in local time. `start > end` wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SleepWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Concrete sleep intervals touching `[from, to)`.
    fn intervals(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        if self.start == self.end {
            return Vec::new();
        }
        let mut intervals = Vec::new();
        let mut date = from.date() - Duration::days(1);
        while date <= to.date() {
            let start = date.and_time(self.start);
            let end = if self.start < self.end {
                date.and_time(self.end)
            } else {
                (date + Duration::days(1)).and_time(self.end)
            };
            if start < to && end > from {
                intervals.push((start, end));
            }
            date += Duration::days(1);
        }
        intervals
    }
}

/// A free slot where tasks can be anchored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
    pub gap_type: GapType,
    pub size_category: GapSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_event_id: Option<String>,
    /// Capacity not yet consumed by placed tasks
    pub remaining_minutes: i64,
}

impl AvailableSlot {
    /// Create a fresh, unconsumed slot
    pub fn new(id: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime, gap_type: GapType) -> Self {
        let duration_minutes = (end - start).num_minutes();
        Self {
            id: id.into(),
            start,
            end,
            duration_minutes,
            gap_type,
            size_category: GapSize::from_minutes(duration_minutes),
            previous_event_id: None,
            next_event_id: None,
            remaining_minutes: duration_minutes,
        }
    }

    /// Check if a task of the given duration fits in the remaining capacity
    pub fn can_fit(&self, minutes: i64) -> bool {
        minutes > 0 && minutes <= self.remaining_minutes
    }

    /// Earliest free point; tasks are packed from the slot start.
    pub fn next_free(&self) -> NaiveDateTime {
        self.start + Duration::minutes(self.duration_minutes - self.remaining_minutes)
    }

    /// Consume capacity for a task and return its `(start, end)`.
    ///
    /// Returns `None` and leaves the slot untouched if the task does not fit.
    pub fn reserve(&mut self, minutes: i64) -> Option<(NaiveDateTime, NaiveDateTime)> {
        if !self.can_fit(minutes) {
            return None;
        }
        let start = self.next_free();
        self.remaining_minutes -= minutes;
        Some((start, start + Duration::minutes(minutes)))
    }

    /// Whether `[start, end)` lies entirely inside this slot
    pub fn contains(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start >= self.start && end <= self.end && start < end
    }
}

/// Occupied interval built from one or more merged events.
#[derive(Debug, Clone)]
struct Occupied {
    start: NaiveDateTime,
    end: NaiveDateTime,
    first_event_id: String,
    last_event_id: String,
}

/// Detector for finding free slots in a day
#[derive(Debug, Clone, Copy)]
pub struct GapFinder {
    /// Minimum gap duration to keep (in minutes)
    min_gap_minutes: i64,
}

impl GapFinder {
    /// Create a new finder with default settings (15 min minimum)
    pub fn new() -> Self {
        Self { min_gap_minutes: 15 }
    }

    /// Set the minimum gap duration
    pub fn with_min_gap(mut self, minutes: i64) -> Self {
        self.min_gap_minutes = minutes.max(1);
        self
    }

    pub fn min_gap_minutes(&self) -> i64 {
        self.min_gap_minutes
    }

    /// Find free slots between events in a day.
    ///
    /// # Arguments
    /// * `events` - Existing calendar events
    /// * `day_start` - Start of the day window
    /// * `day_end` - End of the day window
    /// * `sleep` - Optional sleep window subtracted from every gap
    ///
    /// # Returns
    /// Slots sorted by start time, with ids `slot-0`, `slot-1`, ...
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidTimeRange`] for an event or a day
    /// window whose end is not after its start.
    pub fn find_gaps(
        &self,
        events: &[CalendarEvent],
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
        sleep: Option<SleepWindow>,
    ) -> Result<Vec<AvailableSlot>, ValidationError> {
        if day_start >= day_end {
            return Err(ValidationError::InvalidTimeRange {
                subject: "day window".to_string(),
                start: day_start,
                end: day_end,
            });
        }
        for event in events {
            event.validate()?;
        }

        let occupied = merge_events(events, day_start, day_end);

        // Candidate gaps with their type and bounding events
        let mut candidates: Vec<(NaiveDateTime, NaiveDateTime, GapType, Option<String>, Option<String>)> =
            Vec::new();
        if occupied.is_empty() {
            candidates.push((day_start, day_end, GapType::FullDay, None, None));
        } else {
            let mut cursor = day_start;
            let mut previous: Option<&Occupied> = None;
            for block in &occupied {
                if block.start > cursor {
                    let gap_type = if previous.is_none() {
                        GapType::BeforeFirst
                    } else {
                        GapType::BetweenEvents
                    };
                    candidates.push((
                        cursor,
                        block.start,
                        gap_type,
                        previous.map(|p| p.last_event_id.clone()),
                        Some(block.first_event_id.clone()),
                    ));
                }
                cursor = cursor.max(block.end);
                previous = Some(block);
            }
            if cursor < day_end {
                candidates.push((
                    cursor,
                    day_end,
                    GapType::AfterLast,
                    previous.map(|p| p.last_event_id.clone()),
                    None,
                ));
            }
        }

        let sleep_intervals = sleep
            .map(|s| s.intervals(day_start, day_end))
            .unwrap_or_default();

        let mut slots = Vec::new();
        for (start, end, gap_type, previous_id, next_id) in candidates {
            for (piece_start, piece_end) in subtract_intervals(start, end, &sleep_intervals) {
                if (piece_end - piece_start).num_minutes() < self.min_gap_minutes {
                    continue;
                }
                let mut slot = AvailableSlot::new(String::new(), piece_start, piece_end, gap_type);
                slot.previous_event_id = previous_id.clone();
                slot.next_event_id = next_id.clone();
                slots.push(slot);
            }
        }

        slots.sort_by_key(|s| s.start);
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.id = format!("slot-{index}");
        }

        tracing::debug!(
            events = events.len(),
            occupied = occupied.len(),
            slots = slots.len(),
            "gap detection finished"
        );
        Ok(slots)
    }
}

impl Default for GapFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort, clip to the day window, and merge overlapping or touching events.
fn merge_events(events: &[CalendarEvent], day_start: NaiveDateTime, day_end: NaiveDateTime) -> Vec<Occupied> {
    let mut sorted: Vec<&CalendarEvent> = events
        .iter()
        .filter(|e| e.end > day_start && e.start < day_end)
        .collect();
    sorted.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut merged: Vec<Occupied> = Vec::new();
    for event in sorted {
        let start = event.start.max(day_start);
        let end = event.end.min(day_end);
        match merged.last_mut() {
            Some(last) if start <= last.end => {
                if end > last.end {
                    last.end = end;
                    last.last_event_id = event.id.clone();
                }
            }
            _ => merged.push(Occupied {
                start,
                end,
                first_event_id: event.id.clone(),
                last_event_id: event.id.clone(),
            }),
        }
    }
    merged
}

/// Remove every `(start, end)` in `holes` from `[start, end)`.
fn subtract_intervals(
    start: NaiveDateTime,
    end: NaiveDateTime,
    holes: &[(NaiveDateTime, NaiveDateTime)],
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let mut pieces = vec![(start, end)];
    for &(hole_start, hole_end) in holes {
        pieces = pieces
            .into_iter()
            .flat_map(|(s, e)| {
                if hole_end <= s || hole_start >= e {
                    return vec![(s, e)];
                }
                let mut kept = Vec::with_capacity(2);
                if hole_start > s {
                    kept.push((s, hole_start));
                }
                if hole_end < e {
                    kept.push((hole_end, e));
                }
                kept
            })
            .collect();
    }
    pieces
}

/// Convenience function matching the engine contract:
/// events, day window, sleep window, minimum gap.
///
/// # Errors
/// See [`GapFinder::find_gaps`].
pub fn find_gaps(
    events: &[CalendarEvent],
    day_start: NaiveDateTime,
    day_end: NaiveDateTime,
    sleep: Option<SleepWindow>,
    min_gap_minutes: i64,
) -> Result<Vec<AvailableSlot>, ValidationError> {
    GapFinder::new()
        .with_min_gap(min_gap_minutes)
        .find_gaps(events, day_start, day_end, sleep)
}
