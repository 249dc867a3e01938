use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use vidframe_api::setup;
use vidframe_core::ServiceRole;
use vidframe_db::PgVideoRepository;
use vidframe_services::RetentionSweeper;

/// Retention sweeper: deletes expired videos and every object they own
#[derive(Parser)]
#[command(name = "vidframe-sweeper", version, about)]
struct Cli {
    /// Log what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Keep running and sweep every N seconds instead of once
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = setup::load_config(ServiceRole::Sweeper)?;

    let pool = setup::database::setup_database(&config).await?;
    let storage = setup::storage::setup_storage(&config).await?;

    let sweeper = RetentionSweeper::new(
        Arc::new(PgVideoRepository::new(pool)),
        storage,
        cli.dry_run,
        tracing::info_span!("retention_sweeper"),
    );

    match cli.interval_secs {
        Some(secs) => {
            tracing::info!(interval_secs = secs, dry_run = cli.dry_run, "Sweeper running on a timer");
            Arc::new(sweeper)
                .start(Duration::from_secs(secs), vidframe_infra::shutdown_token())
                .await
                .context("Sweeper task panicked")?;
        }
        None => {
            sweeper.sweep().await.context("Retention sweep failed")?;
        }
    }

    Ok(())
}
