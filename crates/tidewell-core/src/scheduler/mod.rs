//! Greedy placement of tasks into free slots.
//!
//! This module turns scored (task, slot) pairs into concrete start times:
//! - Generates every pair where the task fits the slot's remaining capacity
//! - Scores all pairs with a [`Scorer`]
//! - Commits pairs in descending score order, packing each slot from its start
//! - Reports tasks that fit nowhere as unassigned
//!
//! The greedy pass is intentional: it is deterministic and cheap for the tens
//! of tasks a day holds. It is not a global optimum.

mod holistic;

pub use holistic::{HolisticPlanner, HolisticRejection};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::calendar::CalendarEvent;
use crate::coordinator::AnchoringMode;
use crate::scoring::{Scorer, TaskSlotCandidate, TaskSlotScore};
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// One task placed at a concrete time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub task_id: String,
    pub title: String,
    pub slot_id: String,
    pub anchored_start: NaiveDateTime,
    pub anchored_end: NaiveDateTime,
    pub original_start: NaiveDateTime,
    /// `anchored_start - original_start` in minutes
    pub time_adjustment_minutes: i64,
    /// 0.0-1.0
    pub confidence_score: f64,
    pub scoring_breakdown: TaskSlotScore,
}

impl TaskAssignment {
    pub fn new(
        task: &TaskToAnchor,
        slot_id: impl Into<String>,
        anchored_start: NaiveDateTime,
        confidence_score: f64,
        scoring_breakdown: TaskSlotScore,
    ) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            slot_id: slot_id.into(),
            anchored_start,
            anchored_end: anchored_start + chrono::Duration::minutes(task.duration_minutes),
            original_start: task.preferred_start,
            time_adjustment_minutes: (anchored_start - task.preferred_start).num_minutes(),
            confidence_score,
            scoring_breakdown,
        }
    }

    /// Whether this placement shares any minute with `other`
    pub fn overlaps(&self, other: &TaskAssignment) -> bool {
        self.anchored_start < other.anchored_end && other.anchored_start < self.anchored_end
    }
}

/// Outcome of one anchoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub total_tasks: usize,
    pub tasks_anchored: usize,
    /// Anchored away from the original start
    pub tasks_rescheduled: usize,
    /// Anchored exactly at the original start
    pub tasks_kept_original: usize,
    /// Sorted by anchored start, then task id
    pub assignments: Vec<TaskAssignment>,
    /// Ids of tasks that fit no slot, in input order
    pub unassigned_tasks: Vec<String>,
    pub average_confidence: f64,
    pub strategy: AnchoringMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl AssignmentResult {
    /// Assemble a result from committed placements.
    pub fn from_assignments(
        tasks: &[TaskToAnchor],
        mut assignments: Vec<TaskAssignment>,
        strategy: AnchoringMode,
    ) -> Self {
        assignments.sort_by(|a, b| {
            a.anchored_start
                .cmp(&b.anchored_start)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        let placed: HashSet<&str> = assignments.iter().map(|a| a.task_id.as_str()).collect();
        let unassigned_tasks = tasks
            .iter()
            .filter(|t| !placed.contains(t.id.as_str()))
            .map(|t| t.id.clone())
            .collect();

        let tasks_rescheduled = assignments
            .iter()
            .filter(|a| a.time_adjustment_minutes != 0)
            .count();

        let average_confidence = if assignments.is_empty() {
            0.0
        } else {
            let sum: f64 = assignments.iter().map(|a| a.confidence_score).sum();
            (sum / assignments.len() as f64 * 1000.0).round() / 1000.0
        };

        Self {
            total_tasks: tasks.len(),
            tasks_anchored: assignments.len(),
            tasks_rescheduled,
            tasks_kept_original: assignments.len() - tasks_rescheduled,
            assignments,
            unassigned_tasks,
            average_confidence,
            strategy,
            fallback_reason: None,
        }
    }

    /// Every task unassigned.
    pub fn empty(tasks: &[TaskToAnchor], strategy: AnchoringMode) -> Self {
        Self::from_assignments(tasks, Vec::new(), strategy)
    }

    pub fn with_fallback_reason(mut self, reason: impl Into<String>) -> Self {
        self.fallback_reason = Some(reason.into());
        self
    }

    /// Whether any two assignments overlap in time.
    pub fn has_overlaps(&self) -> bool {
        self.assignments
            .windows(2)
            .any(|pair| pair[0].overlaps(&pair[1]))
    }
}

/// Deterministic ordering of scored pairs: best first.
///
/// Total score descending, then priority (High first), task id, slot start
/// and slot id.
fn compare_scored(
    a: &(TaskSlotCandidate, TaskSlotScore),
    b: &(TaskSlotCandidate, TaskSlotScore),
) -> Ordering {
    b.1.total_score
        .total_cmp(&a.1.total_score)
        .then_with(|| {
            b.0.task
                .priority_level
                .rank()
                .cmp(&a.0.task.priority_level.rank())
        })
        .then_with(|| a.0.task.id.cmp(&b.0.task.id))
        .then_with(|| a.0.slot.start.cmp(&b.0.slot.start))
        .then_with(|| a.0.slot.id.cmp(&b.0.slot.id))
}

/// Greedy task-to-slot assigner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Assigner;

impl Assigner {
    pub fn new() -> Self {
        Self
    }

    /// Every (task, slot) pair where the task fits the slot.
    pub fn candidates(tasks: &[TaskToAnchor], slots: &[AvailableSlot]) -> Vec<TaskSlotCandidate> {
        tasks
            .iter()
            .flat_map(|task| {
                slots
                    .iter()
                    .filter(|slot| slot.can_fit(task.duration_minutes))
                    .map(|slot| TaskSlotCandidate::new(task.clone(), slot.clone()))
            })
            .collect()
    }

    /// Score all pairs and place tasks greedily.
    ///
    /// Slots are copied into a private ledger; the caller's slots are not
    /// touched. The result's `strategy` is [`AnchoringMode::Algorithmic`];
    /// callers running another mode overwrite it.
    pub async fn assign(
        &self,
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
        scorer: &dyn Scorer,
        context: &[CalendarEvent],
    ) -> AssignmentResult {
        let candidates = Self::candidates(tasks, slots);
        tracing::debug!(
            scorer = scorer.name(),
            tasks = tasks.len(),
            slots = slots.len(),
            pairs = candidates.len(),
            "scoring candidate pairs"
        );

        let scores = scorer.score_batch(&candidates, context).await;
        let mut scored: Vec<(TaskSlotCandidate, TaskSlotScore)> =
            candidates.into_iter().zip(scores).collect();
        scored.sort_by(compare_scored);

        let mut ledger: Vec<AvailableSlot> = slots.to_vec();
        let mut placed: HashSet<String> = HashSet::new();
        let mut assignments = Vec::new();

        for (candidate, score) in scored {
            if placed.contains(&candidate.task.id) {
                continue;
            }
            let Some(slot) = ledger.iter_mut().find(|s| s.id == candidate.slot.id) else {
                continue;
            };
            let Some((start, _end)) = slot.reserve(candidate.task.duration_minutes) else {
                continue;
            };

            assignments.push(TaskAssignment::new(
                &candidate.task,
                slot.id.clone(),
                start,
                score.confidence(),
                score,
            ));
            placed.insert(candidate.task.id);
        }

        AssignmentResult::from_assignments(tasks, assignments, AnchoringMode::Algorithmic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::AlgorithmicScorer;
    use crate::task::PriorityLevel;
    use crate::timeline::GapType;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn slot(id: &str, start: NaiveDateTime, end: NaiveDateTime) -> AvailableSlot {
        AvailableSlot::new(id, start, end, GapType::BetweenEvents)
    }

    /// Gives every pair the same score so only the tie-break decides.
    struct FlatScorer;

    #[async_trait]
    impl Scorer for FlatScorer {
        fn name(&self) -> &str {
            "flat"
        }

        fn max_score(&self) -> f64 {
            10.0
        }

        async fn score(
            &self,
            task: &TaskToAnchor,
            slot: &AvailableSlot,
            _context: &[CalendarEvent],
        ) -> TaskSlotScore {
            let mut score = AlgorithmicScorer::new().evaluate(task, slot);
            score.total_score = 5.0;
            score.max_score = 10.0;
            score
        }
    }

    #[tokio::test]
    async fn walk_lands_after_standup() {
        let tasks = vec![TaskToAnchor::new("walk", "Walk", at(9, 0), 30)];
        let slots = vec![
            slot("slot-0", at(6, 0), at(9, 0)),
            slot("slot-1", at(10, 0), at(22, 0)),
        ];

        let result = Assigner::new()
            .assign(&tasks, &slots, &AlgorithmicScorer::new(), &[])
            .await;

        assert_eq!(result.tasks_anchored, 1);
        let walk = &result.assignments[0];
        assert_eq!(walk.slot_id, "slot-1");
        assert_eq!(walk.anchored_start, at(10, 0));
        assert_eq!(walk.anchored_end, at(10, 30));
        assert_eq!(walk.time_adjustment_minutes, 60);
        assert_eq!(walk.confidence_score, 0.667);
        assert_eq!(result.tasks_rescheduled, 1);
        assert_eq!(result.tasks_kept_original, 0);
    }

    #[tokio::test]
    async fn oversized_task_is_unassigned() {
        let tasks = vec![
            TaskToAnchor::new("long", "Long hike", at(9, 0), 120),
            TaskToAnchor::new("short", "Stretch", at(9, 0), 10),
        ];
        let slots = vec![slot("slot-0", at(9, 0), at(10, 0))];

        let result = Assigner::new()
            .assign(&tasks, &slots, &AlgorithmicScorer::new(), &[])
            .await;

        assert_eq!(result.total_tasks, 2);
        assert_eq!(result.tasks_anchored, 1);
        assert_eq!(result.unassigned_tasks, vec!["long".to_string()]);
        assert_eq!(result.tasks_kept_original, 1);
    }

    #[tokio::test]
    async fn slot_hosts_tasks_back_to_back() {
        let tasks = vec![
            TaskToAnchor::new("a", "Meditate", at(14, 0), 20),
            TaskToAnchor::new("b", "Journal", at(14, 0), 20),
            TaskToAnchor::new("c", "Tea", at(14, 0), 20),
        ];
        let slots = vec![slot("slot-0", at(14, 0), at(14, 45))];

        let result = Assigner::new().assign(&tasks, &slots, &FlatScorer, &[]).await;

        assert_eq!(result.tasks_anchored, 2);
        assert_eq!(result.assignments[0].task_id, "a");
        assert_eq!(result.assignments[0].anchored_start, at(14, 0));
        assert_eq!(result.assignments[1].task_id, "b");
        assert_eq!(result.assignments[1].anchored_start, at(14, 20));
        assert_eq!(result.unassigned_tasks, vec!["c".to_string()]);
        assert!(!result.has_overlaps());
        assert_eq!(slots[0].remaining_minutes, 45);
    }

    #[tokio::test]
    async fn ties_break_on_priority_then_id() {
        let tasks = vec![
            TaskToAnchor::new("b", "Nap", at(14, 0), 30),
            TaskToAnchor::new("c", "Run", at(14, 0), 30).with_priority(PriorityLevel::High),
            TaskToAnchor::new("a", "Read", at(14, 0), 30),
        ];
        let slots = vec![slot("slot-0", at(14, 0), at(15, 0))];

        let result = Assigner::new().assign(&tasks, &slots, &FlatScorer, &[]).await;

        let ids: Vec<&str> = result.assignments.iter().map(|a| a.task_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(result.unassigned_tasks, vec!["b".to_string()]);
        assert_eq!(result.average_confidence, 0.5);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_results() {
        let tasks: Vec<TaskToAnchor> = (0..6)
            .map(|i| TaskToAnchor::new(format!("t{i}"), "Break", at(8 + i, 0), 25))
            .collect();
        let slots = vec![
            slot("slot-0", at(7, 0), at(8, 30)),
            slot("slot-1", at(11, 0), at(12, 0)),
            slot("slot-2", at(15, 0), at(17, 0)),
        ];
        let scorer = AlgorithmicScorer::new();

        let first = Assigner::new().assign(&tasks, &slots, &scorer, &[]).await;
        let second = Assigner::new().assign(&tasks, &slots, &scorer, &[]).await;
        assert_eq!(first, second);
        assert!(!first.has_overlaps());
    }

    #[test]
    fn empty_result_reports_everything_unassigned() {
        let tasks = vec![TaskToAnchor::new("a", "Walk", at(9, 0), 30)];
        let result = AssignmentResult::empty(&tasks, AnchoringMode::Hybrid)
            .with_fallback_reason("no slots");
        assert_eq!(result.tasks_anchored, 0);
        assert_eq!(result.average_confidence, 0.0);
        assert_eq!(result.unassigned_tasks, vec!["a".to_string()]);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["strategy"], "hybrid");
        assert_eq!(json["fallbackReason"], "no slots");
        assert_eq!(json["unassignedTasks"][0], "a");
    }
}
