pub mod anchor;
pub mod auth;
pub mod config;
pub mod gaps;

use std::path::Path;
use tidewell_core::Config;

/// Load the config from `path` if given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    })
}

/// Build a multi-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
