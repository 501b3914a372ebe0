use chrono::NaiveDate;
use clap::Args;
use std::path::{Path, PathBuf};

use tidewell_core::AnchoringCoordinator;

use super::anchor::calendar_for;

#[derive(Args)]
pub struct GapsArgs {
    /// JSON file holding the day's calendar events (a generated day if omitted)
    #[arg(long)]
    events: Option<PathBuf>,
    /// Target date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,
    /// Minimum gap in minutes (config default if omitted)
    #[arg(long)]
    min_gap: Option<i64>,
    #[arg(long, default_value = "local")]
    user: String,
}

pub fn run(args: GapsArgs, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let coordinator = AnchoringCoordinator::from_config(calendar_for(args.events.as_deref())?, &config);

    let (_, slots) = super::runtime()?.block_on(coordinator.free_slots(
        &args.user,
        args.date,
        args.min_gap,
    ))?;
    println!("{}", serde_json::to_string_pretty(&slots)?);
    Ok(())
}
