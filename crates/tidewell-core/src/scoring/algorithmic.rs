//! Deterministic heuristic scorer (0-15 points).
//!
//! Every term is a pure function of the task and the slot, evaluated at the
//! point where the task would actually land (the slot's next free minute).

use async_trait::async_trait;

use super::{Scorer, TaskSlotScore, ALGORITHMIC_MAX_SCORE};
use crate::calendar::CalendarEvent;
use crate::task::{EnergyZone, PriorityLevel, TaskToAnchor, WindowMatch};
use crate::timeline::{AvailableSlot, GapSize};

/// Shift from the planned start at which proximity credit reaches zero
pub const MAX_PLAN_SHIFT_MINUTES: i64 = 240;

/// Duration fit (0-2 points).
///
/// Rewards slots whose remaining capacity is close to the task duration:
/// - ratio >= 0.75: 2.0
/// - ratio >= 0.5: 1.5
/// - ratio >= 0.25: 1.0
/// - any smaller ratio: 0.5
/// - does not fit: 0
pub fn duration_fit_score(task: &TaskToAnchor, slot: &AvailableSlot) -> f64 {
    if !slot.can_fit(task.duration_minutes) {
        return 0.0;
    }
    let ratio = task.duration_minutes as f64 / slot.remaining_minutes as f64;
    if ratio >= 0.75 {
        2.0
    } else if ratio >= 0.5 {
        1.5
    } else if ratio >= 0.25 {
        1.0
    } else {
        0.5
    }
}

/// Time-window match (0-10 points).
///
/// Proximity credit decays linearly with the shift from the planned start and
/// is zero at [`MAX_PLAN_SHIFT_MINUTES`]. A time-block or energy-zone tag
/// contributes 10 inside its window, 5 in an adjacent one, 0 otherwise, and
/// is averaged with the proximity credit.
pub fn time_window_score(task: &TaskToAnchor, slot: &AvailableSlot) -> f64 {
    let placement = slot.next_free();
    let shift = (placement - task.preferred_start).num_minutes().abs();
    let proximity =
        10.0 * (1.0 - shift.min(MAX_PLAN_SHIFT_MINUTES) as f64 / MAX_PLAN_SHIFT_MINUTES as f64);

    match task.time_preference() {
        Some(preference) => {
            let tag_credit = match preference.classify(placement.time()) {
                WindowMatch::Inside => 10.0,
                WindowMatch::Adjacent => 5.0,
                WindowMatch::Outside => 0.0,
            };
            (tag_credit + proximity) / 2.0
        }
        None => proximity,
    }
}

/// Priority alignment (0-3 points).
///
/// - High: 3 in a large or peak-hour slot, 2 in a medium slot, 1 otherwise
/// - Medium: 2 in a large or medium slot, 1.5 in a small slot
/// - Low: 1
pub fn priority_alignment_score(task: &TaskToAnchor, slot: &AvailableSlot) -> f64 {
    let peak = EnergyZone::containing(slot.next_free().time()) == Some(EnergyZone::Peak);
    match task.priority_level {
        PriorityLevel::High => match slot.size_category {
            GapSize::Large => 3.0,
            _ if peak => 3.0,
            GapSize::Medium => 2.0,
            GapSize::Small => 1.0,
        },
        PriorityLevel::Medium => match slot.size_category {
            GapSize::Large | GapSize::Medium => 2.0,
            GapSize::Small => 1.5,
        },
        PriorityLevel::Low => 1.0,
    }
}

/// Heuristic scorer with no I/O and no randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgorithmicScorer;

impl AlgorithmicScorer {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous scoring used by the trait impl and by other scorers.
    pub fn evaluate(&self, task: &TaskToAnchor, slot: &AvailableSlot) -> TaskSlotScore {
        let duration_fit = duration_fit_score(task, slot);
        let time_window = time_window_score(task, slot);
        let priority = priority_alignment_score(task, slot);
        let shift = (slot.next_free() - task.preferred_start).num_minutes();

        TaskSlotScore {
            task_id: task.id.clone(),
            slot_id: slot.id.clone(),
            duration_fit,
            time_window,
            priority,
            task_context: None,
            dependency: None,
            energy: None,
            total_score: duration_fit + time_window + priority,
            max_score: ALGORITHMIC_MAX_SCORE,
            reasoning: Some(format!(
                "{} min task in {} min of {:?} slot, {shift:+} min from plan",
                task.duration_minutes, slot.remaining_minutes, slot.size_category
            )),
            ai_fallback: false,
        }
    }
}

#[async_trait]
impl Scorer for AlgorithmicScorer {
    fn name(&self) -> &str {
        "algorithmic"
    }

    fn max_score(&self) -> f64 {
        ALGORITHMIC_MAX_SCORE
    }

    async fn score(
        &self,
        task: &TaskToAnchor,
        slot: &AvailableSlot,
        _context: &[CalendarEvent],
    ) -> TaskSlotScore {
        self.evaluate(task, slot)
    }
}
