//! Algorithmic plus model scoring (0-48 points).

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ai::AiScorer;
use super::algorithmic::AlgorithmicScorer;
use super::{Scorer, TaskSlotCandidate, TaskSlotScore, HYBRID_MAX_SCORE};
use crate::calendar::CalendarEvent;
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

/// Sums the algorithmic and model scores.
///
/// If any model chunk fails, every pair of the batch is scored with the
/// algorithmic total only. `max_score` stays at 48 so scores inside one
/// batch remain comparable; confidence drops accordingly.
///
/// Clones share the fallback flag.
#[derive(Clone)]
pub struct HybridScorer {
    algorithmic: AlgorithmicScorer,
    ai: AiScorer,
    fell_back: Arc<AtomicBool>,
}

impl HybridScorer {
    pub fn new(algorithmic: AlgorithmicScorer, ai: AiScorer) -> Self {
        Self {
            algorithmic,
            ai,
            fell_back: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether any model call of this scorer failed, whether or not the
    /// affected pairs ended up placed.
    pub fn fell_back(&self) -> bool {
        self.fell_back.load(Ordering::Relaxed)
    }

    fn record_fallback(&self) {
        self.fell_back.store(true, Ordering::Relaxed);
    }

    fn combine(base: TaskSlotScore, judged: TaskSlotScore) -> TaskSlotScore {
        let reasoning = match (base.reasoning, judged.reasoning) {
            (Some(a), Some(b)) => Some(format!("{b}; {a}")),
            (a, b) => b.or(a),
        };
        TaskSlotScore {
            task_context: judged.task_context,
            dependency: judged.dependency,
            energy: judged.energy,
            total_score: base.total_score + judged.total_score,
            max_score: HYBRID_MAX_SCORE,
            reasoning,
            ai_fallback: false,
            ..base
        }
    }

    fn algorithmic_only(base: TaskSlotScore) -> TaskSlotScore {
        TaskSlotScore {
            max_score: HYBRID_MAX_SCORE,
            ai_fallback: true,
            ..base
        }
    }
}

#[async_trait]
impl Scorer for HybridScorer {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn max_score(&self) -> f64 {
        HYBRID_MAX_SCORE
    }

    async fn score(
        &self,
        task: &TaskToAnchor,
        slot: &AvailableSlot,
        context: &[CalendarEvent],
    ) -> TaskSlotScore {
        let candidate = [TaskSlotCandidate::new(task.clone(), slot.clone())];
        let base = self.algorithmic.evaluate(task, slot);
        match self.ai.try_score_batch(&candidate, context).await {
            Ok(mut judged) if judged.len() == 1 => Self::combine(base, judged.remove(0)),
            _ => {
                self.record_fallback();
                Self::algorithmic_only(base)
            }
        }
    }

    async fn score_batch(
        &self,
        candidates: &[TaskSlotCandidate],
        context: &[CalendarEvent],
    ) -> Vec<TaskSlotScore> {
        let base = candidates
            .iter()
            .map(|c| self.algorithmic.evaluate(&c.task, &c.slot));

        match self.ai.try_score_batch(candidates, context).await {
            Ok(judged) => base
                .zip(judged)
                .map(|(base, judged)| Self::combine(base, judged))
                .collect(),
            Err(err) => {
                tracing::warn!(
                    pairs = candidates.len(),
                    error = %err,
                    "model scoring failed, hybrid falls back to algorithmic scores"
                );
                self.record_fallback();
                base.map(Self::algorithmic_only).collect()
            }
        }
    }
}
