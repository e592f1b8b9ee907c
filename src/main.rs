mod config;
mod core;
mod google;
mod shared;

use std::process::ExitCode;

use clap::Parser;
use crate::core::agenda::Agenda;
use crate::core::credentials::CredentialProvider;
use crate::core::event::RealClock;
use tracing::Level;
use tracing_subscriber::EnvFilter;

const APP_VERSION: &str = concat!(
    env!("CARGO_PKG_NAME"),
    " version ",
    env!("CARGO_PKG_VERSION"),
    " (rev:",
    env!("GIT_HASH"),
    ")"
);

#[derive(Debug, Parser)]
#[command(
    name = "calday",
    about = "Prints what is ongoing and what is coming up in the next day across all of your Google calendars.",
    long_about = "Prints what is ongoing and what is coming up in the next day across all of your Google calendars.\n\n\
        Environment:\n  \
        CALDAY_CREDENTIALS_FILE   OAuth client secret JSON (default: credentials.json)\n  \
        CALDAY_TOKEN_FILE         cached token (default: token.json)\n  \
        CALDAY_FETCH_CONCURRENCY  calendars fetched at once (default: 4)\n  \
        RUST_LOG                  log filter (default: warn)",
    disable_version_flag = true
)]
pub struct Cli {
    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        return ExitCode::SUCCESS;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(report) => {
            print!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<String> {
    let config = config::init()?;

    let provider = CredentialProvider::from_config(&config)?;
    let calendar_client = provider.obtain_client().await?;

    let agenda = Agenda::new(calendar_client, RealClock, config.fetch_concurrency);
    agenda.today().await
}
