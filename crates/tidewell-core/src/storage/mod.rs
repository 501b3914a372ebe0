mod config;
mod credentials;

pub use config::{AiConfig, AnchoringSettings, Config, DayConfig};
pub use credentials::{ApiKeyStore, KeySource};

use std::path::PathBuf;

/// Returns `~/.config/tidewell[-dev]/` based on TIDEWELL_ENV.
///
/// Set TIDEWELL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TIDEWELL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tidewell-dev")
    } else {
        base_dir.join("tidewell")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
