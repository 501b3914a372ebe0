//! Free-time detection for a single day.
//!
//! This module provides:
//! - Merging of overlapping calendar events into occupied intervals
//! - Gap detection before, between and after events
//! - Sleep-window exclusion and slot capacity tracking

mod gap;

pub use gap::{find_gaps, AvailableSlot, GapFinder, GapSize, GapType, SleepWindow};
