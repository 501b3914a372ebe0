use clap::Subcommand;
use std::path::Path;
use tidewell_core::storage::ApiKeyStore;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the model API key in the OS keyring
    SetKey {
        /// API key
        #[arg(long)]
        key: String,
    },
    /// Remove the model API key from the OS keyring
    ClearKey,
    /// Show where the model API key would be read from
    Status,
}

pub fn run(action: AuthAction, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let store = ApiKeyStore::new();
    match action {
        AuthAction::SetKey { key } => {
            store.store(&key)?;
            println!("model API key stored");
        }
        AuthAction::ClearKey => {
            if store.clear()? {
                println!("model API key removed");
            } else {
                println!("no model API key stored");
            }
        }
        AuthAction::Status => {
            let config = super::load_config(config_path)?;
            let source = match store.resolve(&config.ai.api_key_env) {
                Ok(Some((_, source))) => source.to_string(),
                Ok(None) => "not configured".to_string(),
                Err(e) => e.to_string(),
            };
            println!("model: {} at {}", config.ai.model, config.ai.base_url);
            println!("API key: {source}");
        }
    }
    Ok(())
}
