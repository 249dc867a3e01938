use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use vidframe_api::setup;
use vidframe_core::constants::PROCESSING_QUEUE;
use vidframe_core::ServiceRole;
use vidframe_db::PgVideoRepository;
use vidframe_processing::{FfmpegFrameExtractor, FrameExtractionWorker, WorkerConfig};

/// Frame extraction worker: consumes video.processing.queue
#[derive(Parser)]
#[command(name = "vidframe-worker", version, about)]
struct Cli {
    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = setup::load_config(ServiceRole::Worker)?;
    if cli.check_config {
        return Ok(());
    }

    let pool = setup::database::setup_database(&config).await?;
    let storage = setup::storage::setup_storage(&config).await?;
    let queue = setup::queue::setup_queue(&config, &pool, true).await?;

    let extractor = Arc::new(FfmpegFrameExtractor::new(
        config.ffmpeg_path(),
        Duration::from_secs(config.ffmpeg_timeout_secs()),
    ));
    let worker = FrameExtractionWorker::new(
        Arc::new(PgVideoRepository::new(pool)),
        storage,
        queue.clone(),
        extractor,
        WorkerConfig {
            lease: chrono::Duration::seconds(config.worker_lease_secs()),
            build_archive: config.worker_build_archive(),
        },
        tracing::info_span!("frame_worker"),
    );

    tracing::info!(
        ffmpeg_path = %config.ffmpeg_path(),
        lease_secs = config.worker_lease_secs(),
        build_archive = config.worker_build_archive(),
        "Frame worker starting"
    );

    setup::queue::run_consumer(
        &config,
        queue,
        PROCESSING_QUEUE,
        Arc::new(worker),
        tracing::info_span!("consumer", queue = PROCESSING_QUEUE),
    )
    .await;

    Ok(())
}
