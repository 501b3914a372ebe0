use clap::Subcommand;
use std::path::Path;
use tidewell_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "day.day_start", "ai.timeout_secs")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

fn load(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) if !path.exists() => Ok(Config::default()),
        _ => super::load_config(path),
    }
}

fn save(config: &Config, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    Ok(())
}

pub fn run(action: ConfigAction, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = load(config_path)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = load(config_path)?;
            config.set_value(&key, &value)?;
            save(&config, config_path)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = load(config_path)?;
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        ConfigAction::Reset => {
            save(&Config::default(), config_path)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
