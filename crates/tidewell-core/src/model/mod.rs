//! Language-model capability used by the AI scorer and the holistic planner.
//!
//! The engine talks to the model through [`AnchoringModel`] only. Responses
//! are deserialized into the typed schemas below and then range-checked; any
//! mismatch is a [`CapabilityError`] and is handled by the caller's fallback
//! policy.

mod chat;
mod prompt;

pub use chat::ChatCompletionModel;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::calendar::CalendarEvent;
use crate::error::CapabilityError;
use crate::scoring::AI_SUB_SCORE_MAX;
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// Reference to one (task, slot) pair inside a scoring request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRef {
    pub task_id: String,
    pub slot_id: String,
}

/// Batch of pairs the model should judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairScoringRequest {
    pub tasks: Vec<TaskToAnchor>,
    pub slots: Vec<AvailableSlot>,
    pub context: Vec<CalendarEvent>,
    pub pairs: Vec<PairRef>,
}

/// Model judgement for one pair; each sub-score is in `0..=11`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PairJudgement {
    pub task_id: String,
    pub slot_id: String,
    pub task_context: f64,
    pub dependency: f64,
    pub energy: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl PairJudgement {
    pub fn pair(&self) -> PairRef {
        PairRef {
            task_id: self.task_id.clone(),
            slot_id: self.slot_id.clone(),
        }
    }

    pub fn total(&self) -> f64 {
        self.task_context + self.dependency + self.energy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PairScoringResponse {
    pub scores: Vec<PairJudgement>,
}

impl PairScoringResponse {
    /// Check bounds and that every requested pair was judged.
    ///
    /// # Errors
    /// [`CapabilityError::OutOfRange`] for a sub-score outside `0..=11`,
    /// [`CapabilityError::MalformedResponse`] for missing pairs.
    pub fn validate(&self, requested: &[PairRef]) -> Result<(), CapabilityError> {
        for judgement in &self.scores {
            for (field, value) in [
                ("taskContext", judgement.task_context),
                ("dependency", judgement.dependency),
                ("energy", judgement.energy),
            ] {
                if !value.is_finite() || !(0.0..=AI_SUB_SCORE_MAX).contains(&value) {
                    return Err(CapabilityError::OutOfRange {
                        field: field.to_string(),
                        value,
                    });
                }
            }
        }

        let judged: HashSet<PairRef> = self.scores.iter().map(PairJudgement::pair).collect();
        if let Some(missing) = requested.iter().find(|p| !judged.contains(*p)) {
            return Err(CapabilityError::MalformedResponse(format!(
                "no score for task {} in slot {}",
                missing.task_id, missing.slot_id
            )));
        }
        Ok(())
    }
}

/// Everything the model needs to plan the whole day at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolisticRequest {
    pub tasks: Vec<TaskToAnchor>,
    pub slots: Vec<AvailableSlot>,
    pub context: Vec<CalendarEvent>,
}

/// One placement proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HolisticPlacement {
    pub task_id: String,
    pub start: NaiveDateTime,
    /// 0.0-1.0
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HolisticResponse {
    pub assignments: Vec<HolisticPlacement>,
}

/// External language-model capability.
#[async_trait]
pub trait AnchoringModel: Send + Sync {
    /// Model identifier used in logs.
    fn name(&self) -> &str;

    /// Judge task context, dependency flow and energy fit for a batch of pairs.
    async fn score_pairs(
        &self,
        request: &PairScoringRequest,
    ) -> Result<PairScoringResponse, CapabilityError>;

    /// Place all tasks into slots in one call.
    async fn holistic_assign(
        &self,
        request: &HolisticRequest,
    ) -> Result<HolisticResponse, CapabilityError>;
}

/// Bound a model call by `timeout`; expiry becomes [`CapabilityError::Timeout`].
///
/// # Errors
/// Propagates the call's own error, or returns a timeout error.
pub async fn call_with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}
