//! Integration tests for full anchoring runs.
//!
//! Drives the coordinator end to end: calendar provider, gap detection,
//! scoring, placement, and the fallback paths when the model misbehaves.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;

use tidewell_core::model::{
    HolisticPlacement, HolisticRequest, HolisticResponse, PairJudgement, PairScoringRequest,
    PairScoringResponse,
};
use tidewell_core::storage::DayConfig;
use tidewell_core::{
    AnchorRequest, AnchoringCoordinator, AnchoringMode, AnchoringModel, CalendarEvent,
    CapabilityError, FallbackCalendar, GeneratedCalendar, PriorityLevel, StaticCalendar,
    TaskToAnchor,
};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    date().and_hms_opt(hour, minute, 0).unwrap()
}

fn busy_day() -> Vec<CalendarEvent> {
    vec![
        CalendarEvent::new("standup", "Standup", at(9, 0), at(10, 0)),
        CalendarEvent::new("review", "Design review", at(11, 0), at(12, 30)),
        CalendarEvent::new("lunch", "Team lunch", at(12, 30), at(13, 30)),
        CalendarEvent::new("1on1", "1:1", at(15, 0), at(15, 30)),
    ]
}

fn wellness_tasks() -> Vec<TaskToAnchor> {
    vec![
        TaskToAnchor::new("walk", "Walk", at(9, 0), 30),
        TaskToAnchor::new("stretch", "Stretch", at(11, 0), 10).with_priority(PriorityLevel::High),
        TaskToAnchor::new("breathe", "Breathing", at(15, 0), 5),
        TaskToAnchor::new("hike", "Long hike", at(16, 0), 600).with_priority(PriorityLevel::Low),
    ]
}

fn coordinator(events: Vec<CalendarEvent>) -> AnchoringCoordinator {
    AnchoringCoordinator::new(Arc::new(StaticCalendar::new(events)), DayConfig::default())
}

/// Model returning garbage for every call.
struct BrokenModel;

#[async_trait]
impl AnchoringModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    async fn score_pairs(
        &self,
        _request: &PairScoringRequest,
    ) -> Result<PairScoringResponse, CapabilityError> {
        Err(CapabilityError::MalformedResponse("not json".to_string()))
    }

    async fn holistic_assign(
        &self,
        _request: &HolisticRequest,
    ) -> Result<HolisticResponse, CapabilityError> {
        Err(CapabilityError::Http {
            status: 500,
            body: "internal".to_string(),
        })
    }
}

/// Model whose holistic plan stacks every task at 10:00.
struct StackingModel;

#[async_trait]
impl AnchoringModel for StackingModel {
    fn name(&self) -> &str {
        "stacking"
    }

    async fn score_pairs(
        &self,
        request: &PairScoringRequest,
    ) -> Result<PairScoringResponse, CapabilityError> {
        Ok(PairScoringResponse {
            scores: request
                .pairs
                .iter()
                .map(|p| PairJudgement {
                    task_id: p.task_id.clone(),
                    slot_id: p.slot_id.clone(),
                    task_context: 5.0,
                    dependency: 5.0,
                    energy: 5.0,
                    reasoning: None,
                })
                .collect(),
        })
    }

    async fn holistic_assign(
        &self,
        request: &HolisticRequest,
    ) -> Result<HolisticResponse, CapabilityError> {
        Ok(HolisticResponse {
            assignments: request
                .tasks
                .iter()
                .map(|t| HolisticPlacement {
                    task_id: t.id.clone(),
                    start: at(10, 0),
                    confidence: 0.8,
                    reasoning: None,
                })
                .collect(),
        })
    }
}

#[tokio::test]
async fn test_standup_walk_example() {
    let events = vec![CalendarEvent::new("standup", "Standup", at(9, 0), at(10, 0))];
    let request = AnchorRequest::new("user-1", vec![TaskToAnchor::new("walk", "Walk", at(9, 0), 30)], date());

    let result = coordinator(events).anchor(&request).await.unwrap();

    assert_eq!(result.tasks_anchored, 1);
    let walk = &result.assignments[0];
    assert_eq!(walk.anchored_start, at(10, 0));
    assert_eq!(walk.anchored_end, at(10, 30));
    assert_eq!(walk.time_adjustment_minutes, 60);
    assert!(walk.confidence_score > 0.0 && walk.confidence_score <= 1.0);
}

#[tokio::test]
async fn test_oversized_task_is_reported_unassigned() {
    let result = coordinator(busy_day())
        .anchor(&AnchorRequest::new("user-1", wellness_tasks(), date()))
        .await
        .unwrap();

    assert_eq!(result.total_tasks, 4);
    assert_eq!(result.tasks_anchored, 3);
    assert_eq!(result.unassigned_tasks, vec!["hike".to_string()]);
    assert_eq!(
        result.tasks_rescheduled + result.tasks_kept_original,
        result.tasks_anchored
    );
}

#[tokio::test]
async fn test_assignments_avoid_events_and_each_other() {
    let events = busy_day();
    let result = coordinator(events.clone())
        .anchor(&AnchorRequest::new("user-1", wellness_tasks(), date()))
        .await
        .unwrap();

    assert!(!result.has_overlaps());
    for assignment in &result.assignments {
        for event in &events {
            assert!(
                !event.overlaps(assignment.anchored_start, assignment.anchored_end),
                "{} overlaps {}",
                assignment.task_id,
                event.id
            );
        }
        assert!(assignment.anchored_start >= at(6, 0));
        assert!(assignment.anchored_end <= at(22, 0));
    }
}

#[tokio::test]
async fn test_algorithmic_runs_are_deterministic() {
    let coordinator = coordinator(busy_day());
    let request = AnchorRequest::new("user-1", wellness_tasks(), date());

    let first = coordinator.anchor(&request).await.unwrap();
    let second = coordinator.anchor(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_broken_model_never_breaks_the_run() {
    let coordinator = coordinator(busy_day()).with_model(Arc::new(BrokenModel));

    for mode in [AnchoringMode::Hybrid, AnchoringMode::Holistic] {
        let request = AnchorRequest::new("user-1", wellness_tasks(), date()).with_mode(mode);
        let result = coordinator.anchor(&request).await.unwrap();

        assert_eq!(result.tasks_anchored, 3, "{mode}");
        assert!(!result.has_overlaps());
        assert!(result.fallback_reason.is_some());
    }
}

#[tokio::test]
async fn test_overlapping_holistic_plan_is_replaced() {
    let coordinator = coordinator(busy_day()).with_model(Arc::new(StackingModel));
    let request =
        AnchorRequest::new("user-1", wellness_tasks(), date()).with_mode(AnchoringMode::Holistic);

    let result = coordinator.anchor(&request).await.unwrap();
    assert_eq!(result.strategy, AnchoringMode::Algorithmic);
    assert!(!result.has_overlaps());
    assert_eq!(result.tasks_anchored, 3);
}

#[tokio::test]
async fn test_hybrid_scores_use_full_range() {
    let coordinator = coordinator(busy_day()).with_model(Arc::new(StackingModel));
    let request =
        AnchorRequest::new("user-1", wellness_tasks(), date()).with_mode(AnchoringMode::Hybrid);

    let result = coordinator.anchor(&request).await.unwrap();
    assert_eq!(result.strategy, AnchoringMode::Hybrid);
    for assignment in &result.assignments {
        let breakdown = &assignment.scoring_breakdown;
        assert_eq!(breakdown.max_score, 48.0);
        assert_eq!(breakdown.task_context, Some(5.0));
        assert!(!breakdown.ai_fallback);
    }
}

#[tokio::test]
async fn test_generated_calendar_day_is_usable() {
    let fallback = FallbackCalendar::new(
        Arc::new(StaticCalendar::new(Vec::new())),
        GeneratedCalendar::default(),
    );
    let coordinator = AnchoringCoordinator::new(Arc::new(GeneratedCalendar::default()), DayConfig::default());
    let request = AnchorRequest::new("user-7", wellness_tasks(), date());

    let first = coordinator.anchor(&request).await.unwrap();
    let second = coordinator.anchor(&request).await.unwrap();
    assert_eq!(first, second);
    assert!(!first.has_overlaps());

    // The primary answers (with no events), so nothing is generated.
    let open_day = AnchoringCoordinator::new(Arc::new(fallback), DayConfig::default())
        .anchor(&request)
        .await
        .unwrap();
    assert_eq!(open_day.assignments[0].slot_id, "slot-0");
}
