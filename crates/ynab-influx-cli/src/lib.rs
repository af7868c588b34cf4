mod config;
mod diff;
mod influx;
mod ynab;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use tracing::info;
use ynab_influx::sync::{self, SyncOptions};

use config::Config;
use influx::InfluxClient;
use ynab::YnabClient;

#[derive(Parser)]
#[command(
    name = "ynab-influx",
    about = "Mirror a YNAB budget into InfluxDB time series"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Config file path. Defaults to config.json in the working directory or next to the executable.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete stale transactions and write accounts, categories and new transactions (default)
    Sync,
    /// Show what a sync would delete and write, without changing stored data
    Diff,
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ynab_influx=info,ynab_influx_cli=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => {
            let (path, config) = Config::find_and_load()?;
            info!("Using config {}", path.display());
            config
        }
    };

    let budget_api = YnabClient::new(&config.ynab_api_url, &config.ynab_api_key);
    let mut store = InfluxClient::new(&config);
    let options = SyncOptions {
        detect_changes: config.detect_changes,
    };

    match args.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let report =
                sync::sync(&budget_api, &mut store, &config.ynab_budget_id, &options).await?;
            info!(
                "Sync finished: {} account, {} category, {} new and {} changed transaction points written, {} transactions deleted",
                report.accounts, report.categories, report.new, report.changed, report.deleted
            );
        }
        Commands::Diff => {
            let plan = sync::plan(&budget_api, &mut store, &config.ynab_budget_id, &options).await?;
            diff::show_plan(&plan);
        }
    }

    Ok(())
}
