use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "tidewell-cli", version, about = "Tidewell CLI")]
struct Cli {
    /// Config file to use instead of ~/.config/tidewell/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anchor tasks into the free time of a day
    Anchor(commands::anchor::AnchorArgs),
    /// Show the free slots of a day
    Gaps(commands::gaps::GapsArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Model API key management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

/// Logs go to stderr so stdout stays parseable JSON.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Anchor(args) => commands::anchor::run(args, config_path),
        Commands::Gaps(args) => commands::gaps::run(args, config_path),
        Commands::Config { action } => commands::config::run(action, config_path),
        Commands::Auth { action } => commands::auth::run(action, config_path),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
