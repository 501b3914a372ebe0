//! # Tidewell Core Library
//!
//! Anchors flexible wellness tasks (walks, stretches, breaks) into the free
//! time around a user's fixed calendar events for one day.
//!
//! ## Architecture
//!
//! - **Timeline**: Free-slot detection between events, outside sleep
//! - **Scoring**: Task/slot compatibility, algorithmic and model-judged
//! - **Scheduler**: Greedy placement and the whole-day model planner
//! - **Coordinator**: One anchoring run from request to result
//! - **Storage**: TOML configuration and keyring-backed credentials
//!
//! ## Key Components
//!
//! - [`AnchoringCoordinator`]: Engine entry point
//! - [`GapFinder`]: Free-slot detection
//! - [`Scorer`]: Trait shared by the algorithmic, AI and hybrid scorers
//! - [`Assigner`]: Deterministic greedy placement
//! - [`AnchoringModel`]: Language-model capability

pub mod calendar;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod scoring;
pub mod storage;
pub mod task;
pub mod timeline;

pub use calendar::{CalendarEvent, CalendarProvider, FallbackCalendar, GeneratedCalendar, StaticCalendar};
pub use coordinator::{AnchorRequest, AnchoringCoordinator, AnchoringMode};
pub use error::{CalendarError, CapabilityError, ConfigError, CoreError, Result, ValidationError};
pub use model::{AnchoringModel, ChatCompletionModel};
pub use scheduler::{Assigner, AssignmentResult, HolisticPlanner, TaskAssignment};
pub use scoring::{AiScorer, AlgorithmicScorer, HybridScorer, Scorer, TaskSlotScore};
pub use storage::Config;
pub use task::{PriorityLevel, StaticTaskSource, TaskSource, TaskToAnchor, MAX_TASK_DURATION_MINUTES};
pub use timeline::{AvailableSlot, GapFinder, SleepWindow};
