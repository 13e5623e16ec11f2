use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use road_asset_sync::{
    config::{DATABASE_URL_ENV, Secrets, load_config_path},
    db::migrate,
    partition::{load_partitions_path, load_partitions_str},
    providers::build_engine,
    sync::{LogNotifier, run_partitions},
};
use shared_utils::env::get_secret_env_var;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Road asset synchronization")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Synchronize one or more partitions.
    Run(RunCmd),
    /// Apply the bundled schema migrations to DATABASE_URL.
    Migrate,
}

#[derive(Args)]
struct RunCmd {
    #[arg(long, value_name = "FILE")]
    config: PathBuf,
    /// Partition payload as JSON, a single object or an array.
    #[arg(long, value_name = "JSON", conflicts_with = "partitions_file")]
    partition: Option<String>,
    #[arg(long, value_name = "FILE")]
    partitions_file: Option<PathBuf>,
    /// Overrides `run.max_partitions_in_flight`.
    #[arg(long)]
    max_in_flight: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run(cmd) => run(cmd).await,
        Cmd::Migrate => {
            let url = get_secret_env_var(DATABASE_URL_ENV)?;
            migrate::run_pending(url).await?;
            Ok(())
        }
    }
}

async fn run(cmd: RunCmd) -> Result<()> {
    let cfg = load_config_path(&cmd.config)?;
    let partitions = match (&cmd.partition, &cmd.partitions_file) {
        (Some(json), None) => load_partitions_str(json)?,
        (None, Some(path)) => load_partitions_path(path)?,
        _ => bail!("pass exactly one of --partition or --partitions-file"),
    };
    let secrets = Secrets::from_env()?;
    let engine = build_engine(&cfg, &secrets)?;

    let max_in_flight = cmd.max_in_flight.unwrap_or(cfg.run.max_partitions_in_flight);
    let outcomes = run_partitions(&engine, partitions, max_in_flight, &LogNotifier).await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for report in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
        info!(%report, "partition report");
    }
    if failed > 0 {
        bail!("{failed} of {} partitions failed", outcomes.len());
    }
    Ok(())
}
