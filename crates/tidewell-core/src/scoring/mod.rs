//! Task/slot compatibility scoring.
//!
//! A [`Scorer`] rates how well a task fits a slot. Three implementations are
//! interchangeable behind the trait:
//!
//! | Scorer | Range | Source |
//! |--------|-------|--------|
//! | [`AlgorithmicScorer`] | 0-15 | duration fit, time window, priority |
//! | [`AiScorer`] | 0-33 | task context, dependency flow, energy (model) |
//! | [`HybridScorer`] | 0-48 | sum of both |
//!
//! Scorers never fail: model outages turn into neutral or algorithmic-only
//! scores so that scheduling always proceeds.

mod ai;
mod algorithmic;
mod hybrid;

pub use ai::AiScorer;
pub use algorithmic::{
    duration_fit_score, priority_alignment_score, time_window_score, AlgorithmicScorer,
    MAX_PLAN_SHIFT_MINUTES,
};
pub use hybrid::HybridScorer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// Upper bound of the algorithmic score
pub const ALGORITHMIC_MAX_SCORE: f64 = 15.0;
/// Upper bound of each model-judged sub-score
pub const AI_SUB_SCORE_MAX: f64 = 11.0;
/// Upper bound of the model score (three sub-scores)
pub const AI_MAX_SCORE: f64 = 3.0 * AI_SUB_SCORE_MAX;
/// Score returned when the model cannot be consulted
pub const AI_NEUTRAL_SCORE: f64 = AI_MAX_SCORE / 2.0;
/// Upper bound of the hybrid score
pub const HYBRID_MAX_SCORE: f64 = ALGORITHMIC_MAX_SCORE + AI_MAX_SCORE;

/// Score for one (task, slot) pair, with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSlotScore {
    pub task_id: String,
    pub slot_id: String,
    /// 0-2
    pub duration_fit: f64,
    /// 0-10
    pub time_window: f64,
    /// 0-3
    pub priority: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_context: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    pub total_score: f64,
    /// Maximum reachable `total_score` for the scorer that produced this
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Set when the model was unavailable and a fallback score was used
    #[serde(default)]
    pub ai_fallback: bool,
}

impl TaskSlotScore {
    /// Normalized score in `[0, 1]`, rounded to three decimals.
    pub fn confidence(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        let ratio = (self.total_score / self.max_score).clamp(0.0, 1.0);
        (ratio * 1000.0).round() / 1000.0
    }
}

/// A task paired with a slot it fits into.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSlotCandidate {
    pub task: TaskToAnchor,
    pub slot: AvailableSlot,
}

impl TaskSlotCandidate {
    pub fn new(task: TaskToAnchor, slot: AvailableSlot) -> Self {
        Self { task, slot }
    }
}

/// Rates task/slot compatibility.
///
/// Implementations must be infallible from the caller's point of view and
/// must return batch scores in candidate order.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Scorer identifier used in logs (e.g. "algorithmic", "hybrid").
    fn name(&self) -> &str;

    /// Maximum reachable total score.
    fn max_score(&self) -> f64;

    /// Score a single pair.
    async fn score(
        &self,
        task: &TaskToAnchor,
        slot: &AvailableSlot,
        context: &[CalendarEvent],
    ) -> TaskSlotScore;

    /// Score many pairs; the default scores them one at a time.
    async fn score_batch(
        &self,
        candidates: &[TaskSlotCandidate],
        context: &[CalendarEvent],
    ) -> Vec<TaskSlotScore> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scores.push(self.score(&candidate.task, &candidate.slot, context).await);
        }
        scores
    }
}
