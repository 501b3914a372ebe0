//! Whole-day placement by the model in a single call.
//!
//! The model's plan is only accepted if it is a valid schedule. Anything else
//! falls back to the greedy [`Assigner`] with the algorithmic scorer, so an
//! invalid schedule never reaches the caller.

use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::{Assigner, AssignmentResult, TaskAssignment};
use crate::calendar::CalendarEvent;
use crate::coordinator::AnchoringMode;
use crate::error::CapabilityError;
use crate::model::{call_with_timeout, AnchoringModel, HolisticRequest, HolisticResponse};
use crate::scoring::AlgorithmicScorer;
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// Why a model plan was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HolisticRejection {
    #[error("model call failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("unknown task {0}")]
    UnknownTask(String),

    #[error("task {0} placed more than once")]
    DuplicateTask(String),

    #[error("task {task_id} at {start} does not fit inside any slot")]
    OutsideSlots {
        task_id: String,
        start: NaiveDateTime,
    },

    #[error("task {task_id} overlaps task {other_id}")]
    Overlap { task_id: String, other_id: String },

    #[error("confidence {value} for task {task_id} is outside 0-1")]
    ConfidenceOutOfRange { task_id: String, value: f64 },
}

/// Runs the holistic model call and validates its plan.
pub struct HolisticPlanner {
    model: Arc<dyn AnchoringModel>,
    timeout: std::time::Duration,
    assigner: Assigner,
    scorer: AlgorithmicScorer,
}

impl HolisticPlanner {
    pub fn new(model: Arc<dyn AnchoringModel>, timeout: std::time::Duration) -> Self {
        Self {
            model,
            timeout,
            assigner: Assigner::new(),
            scorer: AlgorithmicScorer::new(),
        }
    }

    /// Plan the day with the model, or greedily if the plan is unusable.
    pub async fn plan(
        &self,
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
        context: &[CalendarEvent],
    ) -> AssignmentResult {
        match self.try_plan(tasks, slots, context).await {
            Ok(result) => result,
            Err(rejection) => {
                tracing::warn!(
                    model = self.model.name(),
                    reason = %rejection,
                    "holistic plan rejected, falling back to greedy assignment"
                );
                self.assigner
                    .assign(tasks, slots, &self.scorer, context)
                    .await
                    .with_fallback_reason(format!("holistic plan rejected: {rejection}"))
            }
        }
    }

    /// Plan the day with the model, without fallback.
    ///
    /// # Errors
    /// A [`HolisticRejection`] for a failed call or an invalid plan.
    pub async fn try_plan(
        &self,
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
        context: &[CalendarEvent],
    ) -> Result<AssignmentResult, HolisticRejection> {
        let request = HolisticRequest {
            tasks: tasks.to_vec(),
            slots: slots.to_vec(),
            context: context.to_vec(),
        };
        let response =
            call_with_timeout(self.timeout, self.model.holistic_assign(&request)).await?;
        let assignments = self.validate(tasks, slots, response)?;
        tracing::debug!(placed = assignments.len(), "holistic plan accepted");
        Ok(AssignmentResult::from_assignments(
            tasks,
            assignments,
            AnchoringMode::Holistic,
        ))
    }

    /// Turn a model response into assignments, rejecting any invalid placement.
    fn validate(
        &self,
        tasks: &[TaskToAnchor],
        slots: &[AvailableSlot],
        response: HolisticResponse,
    ) -> Result<Vec<TaskAssignment>, HolisticRejection> {
        let by_id: HashMap<&str, &TaskToAnchor> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut accepted: Vec<TaskAssignment> = Vec::with_capacity(response.assignments.len());

        for placement in response.assignments {
            let task = by_id
                .get(placement.task_id.as_str())
                .copied()
                .ok_or_else(|| HolisticRejection::UnknownTask(placement.task_id.clone()))?;

            if accepted.iter().any(|a| a.task_id == task.id) {
                return Err(HolisticRejection::DuplicateTask(task.id.clone()));
            }
            if !placement.confidence.is_finite() || !(0.0..=1.0).contains(&placement.confidence) {
                return Err(HolisticRejection::ConfidenceOutOfRange {
                    task_id: task.id.clone(),
                    value: placement.confidence,
                });
            }

            let outside = || HolisticRejection::OutsideSlots {
                task_id: task.id.clone(),
                start: placement.start,
            };
            let end = Duration::try_minutes(task.duration_minutes)
                .and_then(|duration| placement.start.checked_add_signed(duration))
                .ok_or_else(outside)?;
            let slot = slots
                .iter()
                .find(|s| s.contains(placement.start, end))
                .ok_or_else(outside)?;

            let mut breakdown = self.scorer.evaluate(task, &positioned_at(slot, placement.start));
            if placement.reasoning.is_some() {
                breakdown.reasoning = placement.reasoning.clone();
            }

            let assignment =
                TaskAssignment::new(task, slot.id.clone(), placement.start, placement.confidence, breakdown);
            if let Some(other) = accepted.iter().find(|a| a.overlaps(&assignment)) {
                return Err(HolisticRejection::Overlap {
                    task_id: assignment.task_id,
                    other_id: other.task_id.clone(),
                });
            }
            accepted.push(assignment);
        }

        Ok(accepted)
    }
}

/// Copy of `slot` whose free region starts at `start`, so the algorithmic
/// breakdown describes the model's placement.
fn positioned_at(slot: &AvailableSlot, start: NaiveDateTime) -> AvailableSlot {
    let mut positioned = slot.clone();
    positioned.remaining_minutes = (slot.end - start).num_minutes();
    positioned
}
