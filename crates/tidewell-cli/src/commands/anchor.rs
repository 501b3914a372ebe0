use chrono::NaiveDate;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tidewell_core::{
    AnchorRequest, AnchoringCoordinator, AnchoringMode, CalendarProvider, ChatCompletionModel,
    GeneratedCalendar, StaticCalendar, TaskToAnchor,
};

#[derive(Args)]
pub struct AnchorArgs {
    /// JSON file holding the tasks to anchor
    #[arg(long)]
    tasks: PathBuf,
    /// JSON file holding the day's calendar events (a generated day if omitted)
    #[arg(long)]
    events: Option<PathBuf>,
    /// Target date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,
    /// algorithmic, hybrid or holistic (config default if omitted)
    #[arg(long)]
    mode: Option<AnchoringMode>,
    /// Minimum gap in minutes (config default if omitted)
    #[arg(long)]
    min_gap: Option<i64>,
    #[arg(long, default_value = "local")]
    user: String,
}

/// Calendar from an events file, or a deterministic generated day.
pub fn calendar_for(
    events: Option<&Path>,
) -> Result<Arc<dyn CalendarProvider>, Box<dyn std::error::Error>> {
    Ok(match events {
        Some(path) => Arc::new(StaticCalendar::from_json_file(path)?),
        None => Arc::new(GeneratedCalendar::default()),
    })
}

pub fn run(args: AnchorArgs, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let content = std::fs::read_to_string(&args.tasks)?;
    let tasks: Vec<TaskToAnchor> = serde_json::from_str(&content)?;
    let mode = args.mode.unwrap_or(config.anchoring.default_mode);

    let mut coordinator = AnchoringCoordinator::from_config(calendar_for(args.events.as_deref())?, &config);
    if mode.uses_model() {
        match ChatCompletionModel::from_config(&config.ai) {
            Ok(model) => coordinator = coordinator.with_model(Arc::new(model)),
            Err(e) => tracing::warn!(error = %e, "model unavailable"),
        }
    }

    let mut request = AnchorRequest::new(args.user, tasks, args.date).with_mode(mode);
    if let Some(minutes) = args.min_gap {
        request = request.with_min_gap(minutes);
    }

    let result = super::runtime()?.block_on(coordinator.anchor(&request))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
