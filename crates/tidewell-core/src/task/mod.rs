//! Tasks to anchor and their time-of-day preference tags.
//!
//! Tasks are produced elsewhere (coaching plans, LLM task generation) and are
//! immutable input to the engine. A task carries the time it was originally
//! proposed for, which the scorer uses as "distance from plan".

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl PriorityLevel {
    /// Rank used for deterministic tie-breaks (higher first).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// Part of the day a task is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBlock {
    Morning,   // 06:00-12:00
    Afternoon, // 12:00-17:00
    Evening,   // 17:00-22:00
}

impl TimeBlock {
    const ALL: [TimeBlock; 3] = [Self::Morning, Self::Afternoon, Self::Evening];

    /// Hour range `[start, end)` covered by this block
    pub fn hours(&self) -> (u32, u32) {
        match self {
            Self::Morning => (6, 12),
            Self::Afternoon => (12, 17),
            Self::Evening => (17, 22),
        }
    }

    fn ordinal(&self) -> i32 {
        match self {
            Self::Morning => 0,
            Self::Afternoon => 1,
            Self::Evening => 2,
        }
    }

    /// Block containing the given time of day, if any
    pub fn containing(time: NaiveTime) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|block| hour_in_range(time, block.hours()))
    }
}

/// Energy zone a task is best suited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyZone {
    Peak,     // 08:00-12:00
    Steady,   // 12:00-17:00
    Recovery, // 17:00-22:00
}

impl EnergyZone {
    const ALL: [EnergyZone; 3] = [Self::Peak, Self::Steady, Self::Recovery];

    /// Hour range `[start, end)` covered by this zone
    pub fn hours(&self) -> (u32, u32) {
        match self {
            Self::Peak => (8, 12),
            Self::Steady => (12, 17),
            Self::Recovery => (17, 22),
        }
    }

    fn ordinal(&self) -> i32 {
        match self {
            Self::Peak => 0,
            Self::Steady => 1,
            Self::Recovery => 2,
        }
    }

    /// Zone containing the given time of day, if any
    pub fn containing(time: NaiveTime) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|zone| hour_in_range(time, zone.hours()))
    }
}

fn hour_in_range(time: NaiveTime, (start, end): (u32, u32)) -> bool {
    let hour = time.hour();
    hour >= start && hour < end
}

/// Match between a placement time and a preferred window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMatch {
    Inside,
    Adjacent,
    Outside,
}

/// A task's declared time-of-day preference, whichever tag it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePreference {
    Block(TimeBlock),
    Zone(EnergyZone),
}

impl TimePreference {
    /// Classify a placement time against this preference.
    pub fn classify(&self, time: NaiveTime) -> WindowMatch {
        let (wanted, actual) = match self {
            Self::Block(block) => (block.ordinal(), TimeBlock::containing(time).map(|b| b.ordinal())),
            Self::Zone(zone) => (zone.ordinal(), EnergyZone::containing(time).map(|z| z.ordinal())),
        };
        match actual {
            Some(ordinal) if ordinal == wanted => WindowMatch::Inside,
            Some(ordinal) if (ordinal - wanted).abs() == 1 => WindowMatch::Adjacent,
            _ => WindowMatch::Outside,
        }
    }
}

/// Longest task accepted, one full day.
pub const MAX_TASK_DURATION_MINUTES: i64 = 24 * 60;

/// A flexible wellness task waiting for a concrete start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskToAnchor {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority_level: PriorityLevel,
    /// Originally proposed start, used as fallback and for plan distance
    pub preferred_start: NaiveDateTime,
    pub preferred_end: NaiveDateTime,
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_block: Option<TimeBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_zone_preference: Option<EnergyZone>,
}

impl TaskToAnchor {
    /// Create a task with medium priority and no tags.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        preferred_start: NaiveDateTime,
        duration_minutes: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: String::new(),
            priority_level: PriorityLevel::Medium,
            preferred_start,
            preferred_end: preferred_start + chrono::Duration::minutes(duration_minutes),
            duration_minutes,
            time_block: None,
            energy_zone_preference: None,
        }
    }

    pub fn with_priority(mut self, priority: PriorityLevel) -> Self {
        self.priority_level = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_time_block(mut self, block: TimeBlock) -> Self {
        self.time_block = Some(block);
        self
    }

    pub fn with_energy_zone(mut self, zone: EnergyZone) -> Self {
        self.energy_zone_preference = Some(zone);
        self
    }

    /// The tag-based preference; a time block wins over an energy zone.
    pub fn time_preference(&self) -> Option<TimePreference> {
        self.time_block
            .map(TimePreference::Block)
            .or(self.energy_zone_preference.map(TimePreference::Zone))
    }

    /// Reject tasks that cannot be placed meaningfully.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for an empty id, a duration outside
    /// `1..=MAX_TASK_DURATION_MINUTES`, or a preferred window whose end is not
    /// after its start.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "task.id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.duration_minutes <= 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("task {}.durationMinutes", self.id),
                message: format!("must be positive, got {}", self.duration_minutes),
            });
        }
        if self.duration_minutes > MAX_TASK_DURATION_MINUTES {
            return Err(ValidationError::InvalidValue {
                field: format!("task {}.durationMinutes", self.id),
                message: format!(
                    "must be at most {MAX_TASK_DURATION_MINUTES}, got {}",
                    self.duration_minutes
                ),
            });
        }
        if self.preferred_start >= self.preferred_end {
            return Err(ValidationError::InvalidTimeRange {
                subject: format!("task {}", self.id),
                start: self.preferred_start,
                end: self.preferred_end,
            });
        }
        Ok(())
    }
}

/// Validate a whole task list, including id uniqueness.
///
/// # Errors
/// Returns the first [`ValidationError`] found.
pub fn validate_tasks(tasks: &[TaskToAnchor]) -> std::result::Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for task in tasks {
        task.validate()?;
        if !seen.insert(task.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                kind: "task".to_string(),
                id: task.id.clone(),
            });
        }
    }
    Ok(())
}

/// External producer of tasks for a user and day.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Load the tasks to anchor for `user_id` on `date`.
    async fn load_tasks(&self, user_id: &str, date: NaiveDate) -> Result<Vec<TaskToAnchor>>;
}

/// Task source returning a fixed list regardless of user or date.
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSource {
    tasks: Vec<TaskToAnchor>,
}

impl StaticTaskSource {
    pub fn new(tasks: Vec<TaskToAnchor>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl TaskSource for StaticTaskSource {
    async fn load_tasks(&self, _user_id: &str, _date: NaiveDate) -> Result<Vec<TaskToAnchor>> {
        Ok(self.tasks.clone())
    }
}
