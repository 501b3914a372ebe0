//! Deterministic generated calendar day.
//!
//! Used when no provider is configured or the real provider fails. The seed
//! is derived from the user id and date, so the same user sees the same
//! generated day on every call.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sha2::{Digest, Sha256};

use super::{CalendarEvent, CalendarProvider};
use crate::error::Result;

const TITLES: [&str; 6] = [
    "Team standup",
    "Project sync",
    "Lunch",
    "1:1",
    "Client call",
    "Planning review",
];

/// Calendar provider that invents a plausible working day.
#[derive(Debug, Clone)]
pub struct GeneratedCalendar {
    /// Inclusive range for the number of events per day
    min_events: usize,
    max_events: usize,
}

impl GeneratedCalendar {
    pub fn new(min_events: usize, max_events: usize) -> Self {
        Self {
            min_events: min_events.min(max_events),
            max_events: max_events.max(min_events),
        }
    }

    fn seed(user_id: &str, date: NaiveDate) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(date.to_string().as_bytes());
        hasher.finalize().into()
    }

    /// Generate the events for a user and day.
    pub fn generate(&self, user_id: &str, date: NaiveDate) -> Vec<CalendarEvent> {
        let mut rng = Pcg64::from_seed(Self::seed(user_id, date));
        let count = rng.gen_range(self.min_events..=self.max_events);

        let mut events: Vec<CalendarEvent> = (0..count)
            .filter_map(|i| {
                // Half-hour starts between 09:00 and 16:30
                let start_slot = rng.gen_range(0..16u32);
                let duration = 30 * rng.gen_range(1..=3i64);
                let title = TITLES[rng.gen_range(0..TITLES.len())];
                let start = date.and_hms_opt(9 + start_slot / 2, 30 * (start_slot % 2), 0)?;
                Some(CalendarEvent::new(
                    format!("generated-{i}"),
                    title,
                    start,
                    start + Duration::minutes(duration),
                ))
            })
            .collect();

        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        events
    }
}

impl Default for GeneratedCalendar {
    fn default() -> Self {
        Self::new(2, 5)
    }
}

#[async_trait]
impl CalendarProvider for GeneratedCalendar {
    fn name(&self) -> &str {
        "generated"
    }

    async fn fetch_events(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        Ok(self.generate(user_id, date))
    }
}
