#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use anyhow::Result;
use autoreply::{daemon, onboard, Config, ModeCommands};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

/// `autoreply` - keep a Discord channel talking while you are away.
#[derive(Parser, Debug)]
#[command(name = "autoreply")]
#[command(version)]
#[command(about = "Auto-reply and broadcast bot for a Discord channel.", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run mode; prompts interactively when omitted
    #[command(subcommand)]
    command: Option<ModeCommands>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; real env vars still apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    if let Err(e) = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
    {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }

    let mut config = Config::load(cli.config.as_deref()).await?;

    let mode = match cli.command {
        Some(mode) => {
            mode.apply_to(&mut config);
            onboard::complete_missing(&mode, &mut config)?;
            mode
        }
        None => onboard::run_mode_wizard(&mut config)?,
    };
    config.validate()?;

    let cancel = CancellationToken::new();
    daemon::spawn_shutdown_listener(cancel.clone());

    daemon::run(config, &mode, cancel).await
}
