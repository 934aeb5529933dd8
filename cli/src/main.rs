//! Stock Staging - command line front end
//!
//! Stages weighings, package counts and converted readings per product and
//! prints the amount to hand to the inventory API.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

mod cli;
mod commands;
mod config;
mod error;
mod store;

use cli::Cli;
use config::Config;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockstage=info,shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    config.validate()?;

    tracing::debug!(
        environment = %config.environment,
        directory = %config.storage.directory,
        "configuration loaded"
    );

    let cli = Cli::parse();
    let output = commands::run(&config, cli, chrono::Utc::now())?;
    println!("{}", output);

    Ok(())
}
