//! `translatable` command line.
//!
//! - `publish`: write a commented default `translatable.toml`
//! - `check`: load configuration and print the effective locale policy

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use translatable::config::{Published, Settings, publish};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration file.
    Publish {
        /// Destination file.
        #[arg(long, default_value = "translatable.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Validate configuration from a file, or from the environment when no
    /// file is given.
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    match Args::parse().command {
        Command::Publish { path, force } => match publish(&path, force)? {
            Published::Written => info!(path = %path.display(), "configuration published"),
            Published::Overwritten => {
                info!(path = %path.display(), "configuration overwritten");
            }
            Published::Skipped => {
                warn!(path = %path.display(), "file exists, pass --force to overwrite");
            }
        },
        Command::Check { config } => {
            let settings = match &config {
                Some(path) => Settings::load(path)?,
                None => Settings::from_env().context("failed to load configuration")?,
            };
            let registry = settings
                .registry()
                .context("invalid locale configuration")?;
            let fallback = settings.translatable.resolve_fallback(&registry)?;
            let policy = &settings.translatable;

            println!("supported locales: {}", registry.supported_locales().join(", "));
            println!("default locale:    {}", registry.default_locale());
            println!(
                "fallback locale:   {fallback} ({})",
                if policy.use_fallback_locale { "on" } else { "off" }
            );
            println!("fill with empty:   {}", policy.fill_with_empty);
            println!("atomic upserts:    {}", policy.atomic_upserts);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
