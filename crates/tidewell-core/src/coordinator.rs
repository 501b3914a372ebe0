//! Orchestrates one anchoring run.
//!
//! The coordinator owns no state between runs. For each request it:
//! 1. validates the tasks,
//! 2. fetches the day's events,
//! 3. finds free slots in the configured day window,
//! 4. places tasks with the requested strategy.
//!
//! Dropping the returned future cancels in-flight model calls; a result is
//! only assembled after all scoring has finished.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::calendar::{CalendarEvent, CalendarProvider};
use crate::error::{CoreError, Result, ValidationError};
use crate::model::AnchoringModel;
use crate::scheduler::{Assigner, AssignmentResult, HolisticPlanner};
use crate::scoring::{AiScorer, AlgorithmicScorer, HybridScorer};
use crate::storage::{AiConfig, Config, DayConfig};
use crate::task::{validate_tasks, TaskSource, TaskToAnchor};
use crate::timeline::{AvailableSlot, GapFinder};

/// Placement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchoringMode {
    /// Greedy placement with the algorithmic scorer
    #[default]
    Algorithmic,
    /// Greedy placement with algorithmic plus model scores
    Hybrid,
    /// One model call plans the whole day
    Holistic,
}

impl AnchoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchoringMode::Algorithmic => "algorithmic",
            AnchoringMode::Hybrid => "hybrid",
            AnchoringMode::Holistic => "holistic",
        }
    }

    /// Whether this mode needs an [`AnchoringModel`].
    pub fn uses_model(&self) -> bool {
        !matches!(self, AnchoringMode::Algorithmic)
    }
}

impl fmt::Display for AnchoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchoringMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "algorithmic" => Ok(AnchoringMode::Algorithmic),
            "hybrid" => Ok(AnchoringMode::Hybrid),
            "holistic" => Ok(AnchoringMode::Holistic),
            other => Err(ValidationError::InvalidValue {
                field: "mode".to_string(),
                message: format!("expected algorithmic, hybrid or holistic, got '{other}'"),
            }),
        }
    }
}

/// Caller input for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRequest {
    pub user_id: String,
    pub tasks: Vec<TaskToAnchor>,
    pub target_date: NaiveDate,
    #[serde(default)]
    pub mode: AnchoringMode,
    /// Overrides the configured minimum gap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_gap_minutes: Option<i64>,
}

impl AnchorRequest {
    pub fn new(user_id: impl Into<String>, tasks: Vec<TaskToAnchor>, target_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            tasks,
            target_date,
            mode: AnchoringMode::default(),
            min_gap_minutes: None,
        }
    }

    pub fn with_mode(mut self, mode: AnchoringMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_min_gap(mut self, minutes: i64) -> Self {
        self.min_gap_minutes = Some(minutes);
        self
    }
}

/// Entry point of the engine.
pub struct AnchoringCoordinator {
    calendar: Arc<dyn CalendarProvider>,
    gap_finder: GapFinder,
    assigner: Assigner,
    scorer: AlgorithmicScorer,
    model: Option<Arc<dyn AnchoringModel>>,
    day: DayConfig,
    ai: AiConfig,
}

impl AnchoringCoordinator {
    /// Create a coordinator without a model; model modes degrade to
    /// algorithmic placement.
    pub fn new(calendar: Arc<dyn CalendarProvider>, day: DayConfig) -> Self {
        Self {
            calendar,
            gap_finder: GapFinder::new(),
            assigner: Assigner::new(),
            scorer: AlgorithmicScorer::new(),
            model: None,
            day,
            ai: AiConfig::default(),
        }
    }

    /// Create a coordinator from the full configuration.
    pub fn from_config(calendar: Arc<dyn CalendarProvider>, config: &Config) -> Self {
        Self::new(calendar, config.day.clone())
            .with_gap_finder(GapFinder::new().with_min_gap(config.anchoring.min_gap_minutes))
            .with_ai_config(config.ai.clone())
    }

    pub fn with_model(mut self, model: Arc<dyn AnchoringModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_gap_finder(mut self, gap_finder: GapFinder) -> Self {
        self.gap_finder = gap_finder;
        self
    }

    pub fn with_ai_config(mut self, ai: AiConfig) -> Self {
        self.ai = ai;
        self
    }

    pub fn with_assigner(mut self, assigner: Assigner) -> Self {
        self.assigner = assigner;
        self
    }

    /// Algorithmic scorer used on its own and as the base of hybrid scores.
    pub fn with_scorer(mut self, scorer: AlgorithmicScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Anchor the request's tasks into the user's free time.
    ///
    /// # Errors
    /// Returns [`CoreError::Validation`] for malformed tasks or events,
    /// [`CoreError::Config`] for an unusable day window, and propagates
    /// calendar provider errors. Model failures never surface here.
    pub async fn anchor(&self, request: &AnchorRequest) -> Result<AssignmentResult> {
        let span = tracing::info_span!(
            "anchor",
            run_id = %uuid::Uuid::new_v4(),
            user_id = %request.user_id,
            mode = %request.mode,
        );

        async {
            validate_tasks(&request.tasks)?;
            let events = self
                .calendar
                .fetch_events(&request.user_id, request.target_date)
                .await?;
            self.place(
                &request.tasks,
                &events,
                request.target_date,
                request.mode,
                request.min_gap_minutes,
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// Like [`anchor`](Self::anchor), loading tasks from `source` while the
    /// events are fetched.
    ///
    /// # Errors
    /// As [`anchor`](Self::anchor), plus task source errors.
    pub async fn anchor_from_source(
        &self,
        user_id: &str,
        date: NaiveDate,
        mode: AnchoringMode,
        source: &dyn TaskSource,
    ) -> Result<AssignmentResult> {
        let span = tracing::info_span!(
            "anchor",
            run_id = %uuid::Uuid::new_v4(),
            user_id = %user_id,
            mode = %mode,
        );

        async {
            let (events, tasks) = tokio::try_join!(
                self.calendar.fetch_events(user_id, date),
                source.load_tasks(user_id, date),
            )?;
            validate_tasks(&tasks)?;
            self.place(&tasks, &events, date, mode, None).await
        }
        .instrument(span)
        .await
    }

    /// Events and free slots for `date`.
    ///
    /// # Errors
    /// Propagates calendar errors and invalid events or day windows.
    pub async fn free_slots(
        &self,
        user_id: &str,
        date: NaiveDate,
        min_gap_minutes: Option<i64>,
    ) -> Result<(Vec<CalendarEvent>, Vec<AvailableSlot>)> {
        let events = self.calendar.fetch_events(user_id, date).await?;
        let slots = self.slots_for(&events, date, min_gap_minutes)?;
        Ok((events, slots))
    }

    fn slots_for(
        &self,
        events: &[CalendarEvent],
        date: NaiveDate,
        min_gap_minutes: Option<i64>,
    ) -> Result<Vec<AvailableSlot>> {
        let (day_start, day_end) = self.day.window_for(date)?;
        let sleep = self.day.sleep_window()?;
        let gap_finder = match min_gap_minutes {
            Some(minutes) if minutes <= 0 => {
                return Err(CoreError::Validation(ValidationError::InvalidValue {
                    field: "minGapMinutes".to_string(),
                    message: format!("must be positive, got {minutes}"),
                }))
            }
            Some(minutes) => self.gap_finder.with_min_gap(minutes),
            None => self.gap_finder,
        };
        Ok(gap_finder.find_gaps(events, day_start, day_end, Some(sleep))?)
    }

    async fn place(
        &self,
        tasks: &[TaskToAnchor],
        events: &[CalendarEvent],
        date: NaiveDate,
        mode: AnchoringMode,
        min_gap_minutes: Option<i64>,
    ) -> Result<AssignmentResult> {
        let slots = self.slots_for(events, date, min_gap_minutes)?;
        tracing::debug!(events = events.len(), slots = slots.len(), tasks = tasks.len(), "found free slots");

        let result = match (mode, &self.model) {
            (AnchoringMode::Algorithmic, _) => {
                self.assigner.assign(tasks, &slots, &self.scorer, events).await
            }
            (_, None) => {
                tracing::warn!(%mode, "no model configured, using algorithmic placement");
                self.assigner
                    .assign(tasks, &slots, &self.scorer, events)
                    .await
                    .with_fallback_reason(format!("{mode} mode requires a model; none configured"))
            }
            (AnchoringMode::Hybrid, Some(model)) => {
                let scorer = HybridScorer::new(
                    self.scorer,
                    AiScorer::from_config(Arc::clone(model), &self.ai),
                );
                let mut result = self.assigner.assign(tasks, &slots, &scorer, events).await;
                result.strategy = AnchoringMode::Hybrid;
                if scorer.fell_back() {
                    result.fallback_reason =
                        Some("model scoring failed; algorithmic scores used".to_string());
                }
                result
            }
            (AnchoringMode::Holistic, Some(model)) => {
                HolisticPlanner::new(Arc::clone(model), Duration::from_secs(self.ai.timeout_secs))
                    .plan(tasks, &slots, events)
                    .await
            }
        };

        tracing::info!(
            strategy = %result.strategy,
            anchored = result.tasks_anchored,
            unassigned = result.unassigned_tasks.len(),
            average_confidence = result.average_confidence,
            fallback = result.fallback_reason.is_some(),
            "anchoring finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::StaticCalendar;
    use crate::error::{CalendarError, CapabilityError};
    use crate::model::{
        HolisticPlacement, HolisticRequest, HolisticResponse, PairJudgement, PairScoringRequest,
        PairScoringResponse,
    };
    use crate::task::StaticTaskSource;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        date().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn standup_calendar() -> Arc<dyn CalendarProvider> {
        Arc::new(StaticCalendar::new(vec![CalendarEvent::new(
            "standup",
            "Standup",
            at(9, 0),
            at(10, 0),
        )]))
    }

    fn walk() -> TaskToAnchor {
        TaskToAnchor::new("walk", "Walk", at(9, 0), 30)
    }

    struct DownCalendar;

    #[async_trait]
    impl CalendarProvider for DownCalendar {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_events(&self, _user_id: &str, _date: NaiveDate) -> Result<Vec<CalendarEvent>> {
            Err(CalendarError::Unavailable {
                provider: "down".to_string(),
                message: "offline".to_string(),
            }
            .into())
        }
    }

    /// Model that either answers fixed values or hangs past any timeout.
    struct TestModel {
        hang: bool,
        fail: bool,
    }

    #[async_trait]
    impl AnchoringModel for TestModel {
        fn name(&self) -> &str {
            "test"
        }

        async fn score_pairs(
            &self,
            request: &PairScoringRequest,
        ) -> std::result::Result<PairScoringResponse, CapabilityError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(CapabilityError::Transport("refused".to_string()));
            }
            Ok(PairScoringResponse {
                scores: request
                    .pairs
                    .iter()
                    .map(|p| PairJudgement {
                        task_id: p.task_id.clone(),
                        slot_id: p.slot_id.clone(),
                        task_context: 11.0,
                        dependency: 11.0,
                        energy: 11.0,
                        reasoning: None,
                    })
                    .collect(),
            })
        }

        async fn holistic_assign(
            &self,
            request: &HolisticRequest,
        ) -> std::result::Result<HolisticResponse, CapabilityError> {
            if self.fail {
                return Err(CapabilityError::MalformedResponse("garbage".to_string()));
            }
            Ok(HolisticResponse {
                assignments: vec![HolisticPlacement {
                    task_id: request.tasks[0].id.clone(),
                    start: at(10, 30),
                    confidence: 0.9,
                    reasoning: None,
                }],
            })
        }
    }

    fn coordinator() -> AnchoringCoordinator {
        AnchoringCoordinator::new(standup_calendar(), DayConfig::default())
    }

    #[tokio::test]
    async fn algorithmic_walk_lands_after_standup() {
        let request = AnchorRequest::new("u1", vec![walk()], date());
        let result = coordinator().anchor(&request).await.unwrap();

        assert_eq!(result.strategy, AnchoringMode::Algorithmic);
        assert_eq!(result.assignments[0].anchored_start, at(10, 0));
        assert_eq!(result.assignments[0].anchored_end, at(10, 30));
        assert_eq!(result.assignments[0].time_adjustment_minutes, 60);
        assert_eq!(result.fallback_reason, None);
    }

    #[tokio::test]
    async fn model_modes_without_model_degrade() {
        for mode in [AnchoringMode::Hybrid, AnchoringMode::Holistic] {
            let request = AnchorRequest::new("u1", vec![walk()], date()).with_mode(mode);
            let result = coordinator().anchor(&request).await.unwrap();
            assert_eq!(result.strategy, AnchoringMode::Algorithmic);
            assert!(result.fallback_reason.is_some());
            assert_eq!(result.tasks_anchored, 1);
        }
    }

    #[tokio::test]
    async fn hybrid_with_model_sums_scores() {
        let coordinator =
            coordinator().with_model(Arc::new(TestModel { hang: false, fail: false }));
        let request = AnchorRequest::new("u1", vec![walk()], date()).with_mode(AnchoringMode::Hybrid);
        let result = coordinator.anchor(&request).await.unwrap();

        assert_eq!(result.strategy, AnchoringMode::Hybrid);
        let walk = &result.assignments[0];
        assert_eq!(walk.anchored_start, at(10, 0));
        assert_eq!(walk.scoring_breakdown.total_score, 43.0);
        assert_eq!(walk.scoring_breakdown.max_score, 48.0);
        assert_eq!(result.fallback_reason, None);
    }

    #[tokio::test]
    async fn failing_model_still_yields_valid_result() {
        let coordinator = coordinator().with_model(Arc::new(TestModel { hang: false, fail: true }));
        let tasks = vec![walk(), TaskToAnchor::new("tea", "Tea", at(15, 0), 15)];

        for mode in [AnchoringMode::Hybrid, AnchoringMode::Holistic] {
            let request = AnchorRequest::new("u1", tasks.clone(), date()).with_mode(mode);
            let result = coordinator.anchor(&request).await.unwrap();
            assert_eq!(result.tasks_anchored, 2);
            assert!(!result.has_overlaps());
            assert!(result.fallback_reason.is_some());
        }
    }

    #[tokio::test]
    async fn hybrid_fallback_is_reported_even_for_unplaced_tasks() {
        let coordinator = coordinator().with_model(Arc::new(TestModel { hang: false, fail: true }));
        let marathon = TaskToAnchor::new("marathon", "Marathon", at(6, 0), 13 * 60);
        let request = AnchorRequest::new("u1", vec![marathon.clone(), walk()], date())
            .with_mode(AnchoringMode::Hybrid);

        let result = coordinator.anchor(&request).await.unwrap();
        assert_eq!(result.strategy, AnchoringMode::Hybrid);
        assert_eq!(result.unassigned_tasks, vec!["marathon".to_string()]);
        assert!(result.fallback_reason.is_some());

        // With nothing to score the model is never asked, so nothing fell back.
        let request =
            AnchorRequest::new("u1", vec![marathon], date()).with_mode(AnchoringMode::Hybrid);
        let result = coordinator.anchor(&request).await.unwrap();
        assert_eq!(result.tasks_anchored, 0);
        assert_eq!(result.fallback_reason, None);
    }

    #[tokio::test]
    async fn injected_assigner_and_scorer_are_used() {
        let coordinator = coordinator()
            .with_assigner(Assigner::new())
            .with_scorer(AlgorithmicScorer::new());
        let request = AnchorRequest::new("u1", vec![walk()], date());
        let result = coordinator.anchor(&request).await.unwrap();
        assert_eq!(result.assignments[0].anchored_start, at(10, 0));
        assert_eq!(result.assignments[0].scoring_breakdown.max_score, 15.0);
    }

    #[tokio::test]
    async fn holistic_plan_is_used_when_valid() {
        let coordinator =
            coordinator().with_model(Arc::new(TestModel { hang: false, fail: false }));
        let request =
            AnchorRequest::new("u1", vec![walk()], date()).with_mode(AnchoringMode::Holistic);
        let result = coordinator.anchor(&request).await.unwrap();

        assert_eq!(result.strategy, AnchoringMode::Holistic);
        assert_eq!(result.assignments[0].anchored_start, at(10, 30));
        assert_eq!(result.assignments[0].confidence_score, 0.9);
    }

    #[tokio::test]
    async fn hung_model_times_out_to_algorithmic_scores() {
        let ai = AiConfig {
            timeout_secs: 1,
            ..AiConfig::default()
        };
        let coordinator = coordinator()
            .with_ai_config(ai)
            .with_model(Arc::new(TestModel { hang: true, fail: false }));
        let request = AnchorRequest::new("u1", vec![walk()], date()).with_mode(AnchoringMode::Hybrid);

        let result = coordinator.anchor(&request).await.unwrap();
        assert!(result.assignments[0].scoring_breakdown.ai_fallback);
        assert_eq!(result.assignments[0].scoring_breakdown.total_score, 10.0);
    }

    #[tokio::test]
    async fn dropping_the_future_cancels_the_run() {
        let coordinator = coordinator().with_model(Arc::new(TestModel { hang: true, fail: false }));
        let request = AnchorRequest::new("u1", vec![walk()], date()).with_mode(AnchoringMode::Hybrid);

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), coordinator.anchor(&request)).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let mut bad = walk();
        bad.duration_minutes = 0;
        let request = AnchorRequest::new("u1", vec![bad], date());
        assert!(matches!(
            coordinator().anchor(&request).await,
            Err(CoreError::Validation(_))
        ));

        let request = AnchorRequest::new("u1", vec![walk(), walk()], date());
        assert!(matches!(
            coordinator().anchor(&request).await,
            Err(CoreError::Validation(ValidationError::DuplicateId { .. }))
        ));

        let request = AnchorRequest::new("u1", vec![walk()], date()).with_min_gap(0);
        assert!(coordinator().anchor(&request).await.is_err());
    }

    #[tokio::test]
    async fn calendar_errors_propagate() {
        let coordinator = AnchoringCoordinator::new(Arc::new(DownCalendar), DayConfig::default());
        let request = AnchorRequest::new("u1", vec![walk()], date());
        assert!(matches!(
            coordinator.anchor(&request).await,
            Err(CoreError::Calendar(CalendarError::Unavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn anchor_from_source_loads_tasks() {
        let source = StaticTaskSource::new(vec![walk()]);
        let result = coordinator()
            .anchor_from_source("u1", date(), AnchoringMode::Algorithmic, &source)
            .await
            .unwrap();
        assert_eq!(result.total_tasks, 1);
        assert_eq!(result.assignments[0].slot_id, "slot-1");
    }

    #[tokio::test]
    async fn min_gap_override_drops_short_slots() {
        let (_, slots) = coordinator().free_slots("u1", date(), Some(200)).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, at(10, 0));
    }

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!("Hybrid".parse::<AnchoringMode>().unwrap(), AnchoringMode::Hybrid);
        assert!("optimal".parse::<AnchoringMode>().is_err());
        assert_eq!(AnchoringMode::Holistic.to_string(), "holistic");
        assert_eq!(
            serde_json::to_string(&AnchoringMode::Algorithmic).unwrap(),
            "\"algorithmic\""
        );
    }
}
