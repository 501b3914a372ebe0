//! Model-judged scorer (0-33 points).

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{Scorer, TaskSlotCandidate, TaskSlotScore, AI_MAX_SCORE, AI_NEUTRAL_SCORE};
use crate::calendar::CalendarEvent;
use crate::error::CapabilityError;
use crate::model::{call_with_timeout, AnchoringModel, PairJudgement, PairRef, PairScoringRequest};
use crate::storage::AiConfig;
use crate::task::TaskToAnchor;
use crate::timeline::AvailableSlot;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BATCH_SIZE: usize = 8;
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Scores pairs by asking an [`AnchoringModel`] for task context, dependency
/// flow and energy judgements.
///
/// Candidates are sent in chunks of `batch_size`, at most `max_concurrency`
/// chunks at a time. Results come back in candidate order.
#[derive(Clone)]
pub struct AiScorer {
    model: Arc<dyn AnchoringModel>,
    timeout: Duration,
    batch_size: usize,
    max_concurrency: usize,
}

impl AiScorer {
    pub fn new(model: Arc<dyn AnchoringModel>) -> Self {
        Self {
            model,
            timeout: DEFAULT_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn from_config(model: Arc<dyn AnchoringModel>, config: &AiConfig) -> Self {
        Self::new(model)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_batch_size(config.batch_size)
            .with_max_concurrency(config.max_concurrency)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Score every candidate, failing as a whole if any chunk fails.
    ///
    /// # Errors
    /// The first [`CapabilityError`] raised by a chunk, in chunk order.
    pub async fn try_score_batch(
        &self,
        candidates: &[TaskSlotCandidate],
        context: &[CalendarEvent],
    ) -> Result<Vec<TaskSlotScore>, CapabilityError> {
        let pending: Vec<_> = candidates
            .chunks(self.batch_size)
            .map(|chunk| self.score_chunk(chunk, context))
            .collect();
        let chunks: Vec<Vec<TaskSlotScore>> = stream::iter(pending)
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    async fn score_chunk(
        &self,
        chunk: &[TaskSlotCandidate],
        context: &[CalendarEvent],
    ) -> Result<Vec<TaskSlotScore>, CapabilityError> {
        let request = build_request(chunk, context);
        let response =
            call_with_timeout(self.timeout, self.model.score_pairs(&request)).await?;
        response.validate(&request.pairs)?;

        let judged: HashMap<PairRef, PairJudgement> = response
            .scores
            .into_iter()
            .map(|judgement| (judgement.pair(), judgement))
            .collect();

        request
            .pairs
            .iter()
            .map(|pair| {
                judged
                    .get(pair)
                    .map(|judgement| judged_score(judgement))
                    .ok_or_else(|| {
                        CapabilityError::MalformedResponse(format!(
                            "no score for task {} in slot {}",
                            pair.task_id, pair.slot_id
                        ))
                    })
            })
            .collect()
    }
}

fn build_request(chunk: &[TaskSlotCandidate], context: &[CalendarEvent]) -> PairScoringRequest {
    let mut tasks: Vec<TaskToAnchor> = Vec::new();
    let mut slots: Vec<AvailableSlot> = Vec::new();
    let mut pairs = Vec::with_capacity(chunk.len());

    for candidate in chunk {
        if !tasks.iter().any(|t| t.id == candidate.task.id) {
            tasks.push(candidate.task.clone());
        }
        if !slots.iter().any(|s| s.id == candidate.slot.id) {
            slots.push(candidate.slot.clone());
        }
        pairs.push(PairRef {
            task_id: candidate.task.id.clone(),
            slot_id: candidate.slot.id.clone(),
        });
    }

    PairScoringRequest {
        tasks,
        slots,
        context: context.to_vec(),
        pairs,
    }
}

fn judged_score(judgement: &PairJudgement) -> TaskSlotScore {
    TaskSlotScore {
        task_id: judgement.task_id.clone(),
        slot_id: judgement.slot_id.clone(),
        duration_fit: 0.0,
        time_window: 0.0,
        priority: 0.0,
        task_context: Some(judgement.task_context),
        dependency: Some(judgement.dependency),
        energy: Some(judgement.energy),
        total_score: judgement.total(),
        max_score: AI_MAX_SCORE,
        reasoning: judgement.reasoning.clone(),
        ai_fallback: false,
    }
}

/// Score used for a pair the model could not judge.
pub(crate) fn neutral_score(task: &TaskToAnchor, slot: &AvailableSlot) -> TaskSlotScore {
    let sub = AI_NEUTRAL_SCORE / 3.0;
    TaskSlotScore {
        task_id: task.id.clone(),
        slot_id: slot.id.clone(),
        duration_fit: 0.0,
        time_window: 0.0,
        priority: 0.0,
        task_context: Some(sub),
        dependency: Some(sub),
        energy: Some(sub),
        total_score: AI_NEUTRAL_SCORE,
        max_score: AI_MAX_SCORE,
        reasoning: None,
        ai_fallback: true,
    }
}

#[async_trait]
impl Scorer for AiScorer {
    fn name(&self) -> &str {
        "ai"
    }

    fn max_score(&self) -> f64 {
        AI_MAX_SCORE
    }

    async fn score(
        &self,
        task: &TaskToAnchor,
        slot: &AvailableSlot,
        context: &[CalendarEvent],
    ) -> TaskSlotScore {
        let candidate = [TaskSlotCandidate::new(task.clone(), slot.clone())];
        self.score_batch(&candidate, context)
            .await
            .pop()
            .unwrap_or_else(|| neutral_score(task, slot))
    }

    /// Chunks that fail are scored neutrally; the rest keep their judgements.
    async fn score_batch(
        &self,
        candidates: &[TaskSlotCandidate],
        context: &[CalendarEvent],
    ) -> Vec<TaskSlotScore> {
        let pending: Vec<_> = candidates
            .chunks(self.batch_size)
            .map(|chunk| async move {
                match self.score_chunk(chunk, context).await {
                    Ok(scores) => scores,
                    Err(err) => {
                        tracing::warn!(
                            model = self.model.name(),
                            pairs = chunk.len(),
                            error = %err,
                            "model scoring failed, using neutral scores"
                        );
                        chunk
                            .iter()
                            .map(|c| neutral_score(&c.task, &c.slot))
                            .collect()
                    }
                }
            })
            .collect();
        let chunks: Vec<Vec<TaskSlotScore>> = stream::iter(pending)
            .buffered(self.max_concurrency)
            .collect()
            .await;
        chunks.into_iter().flatten().collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{HolisticRequest, HolisticResponse, PairScoringResponse};
    use crate::timeline::GapType;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    /// Model that scores each pair from a fixed function of its ids.
    pub(crate) struct ScriptedModel {
        pub calls: AtomicUsize,
        pub fail_on_call: Option<usize>,
        pub delay: Option<Duration>,
    }

    impl ScriptedModel {
        pub fn healthy() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: None,
                delay: None,
            }
        }

        pub fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::healthy()
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::healthy()
            }
        }

        /// Favors `slot-1` for every task.
        pub fn judgement_for(pair: &PairRef) -> PairJudgement {
            let value = if pair.slot_id == "slot-1" { 10.0 } else { 2.0 };
            PairJudgement {
                task_id: pair.task_id.clone(),
                slot_id: pair.slot_id.clone(),
                task_context: value,
                dependency: value,
                energy: value,
                reasoning: Some(format!("{} fits {}", pair.task_id, pair.slot_id)),
            }
        }
    }

    #[async_trait]
    impl AnchoringModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn score_pairs(
            &self,
            request: &PairScoringRequest,
        ) -> Result<PairScoringResponse, CapabilityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on_call == Some(call) {
                return Err(CapabilityError::Transport("connection reset".to_string()));
            }
            Ok(PairScoringResponse {
                scores: request.pairs.iter().map(Self::judgement_for).collect(),
            })
        }

        async fn holistic_assign(
            &self,
            _request: &HolisticRequest,
        ) -> Result<HolisticResponse, CapabilityError> {
            Err(CapabilityError::Unavailable("not scripted".to_string()))
        }
    }

    fn candidates(count: usize) -> Vec<TaskSlotCandidate> {
        let slot = AvailableSlot::new("slot-1", at(10, 0), at(12, 0), GapType::BetweenEvents);
        (0..count)
            .map(|i| {
                let task = TaskToAnchor::new(format!("t{i}"), "Stretch", at(9, 0), 10);
                TaskSlotCandidate::new(task, slot.clone())
            })
            .collect()
    }

    #[tokio::test]
    async fn batches_preserve_candidate_order() {
        let model = Arc::new(ScriptedModel::healthy());
        let scorer = AiScorer::new(model.clone()).with_batch_size(2);
        let input = candidates(5);

        let scores = scorer.score_batch(&input, &[]).await;
        let ids: Vec<&str> = scores.iter().map(|s| s.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);
        assert!(scores.iter().all(|s| s.total_score == 30.0 && !s.ai_fallback));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_chunk_is_scored_neutrally() {
        let scorer = AiScorer::new(Arc::new(ScriptedModel::failing_on(1))).with_batch_size(2);
        let scores = scorer.score_batch(&candidates(4), &[]).await;

        assert!(!scores[0].ai_fallback);
        assert!(scores[2].ai_fallback);
        assert_eq!(scores[2].total_score, AI_NEUTRAL_SCORE);
        assert_eq!(scores[3].task_context, Some(5.5));
    }

    #[tokio::test]
    async fn try_score_batch_fails_as_a_whole() {
        let scorer = AiScorer::new(Arc::new(ScriptedModel::failing_on(0))).with_batch_size(2);
        let result = scorer.try_score_batch(&candidates(4), &[]).await;
        assert!(matches!(result, Err(CapabilityError::Transport(_))));
    }

    #[tokio::test]
    async fn slow_model_times_out_to_neutral() {
        let scorer = AiScorer::new(Arc::new(ScriptedModel::slow(Duration::from_millis(300))))
            .with_timeout(Duration::from_millis(20));
        let candidate = &candidates(1)[0];
        let score = scorer.score(&candidate.task, &candidate.slot, &[]).await;
        assert!(score.ai_fallback);
        assert_eq!(score.total_score, AI_NEUTRAL_SCORE);
        assert_eq!(score.confidence(), 0.5);
    }
}
