use clap::Parser;
use std::sync::Arc;
use vidframe_api::setup;
use vidframe_core::constants::NOTIFICATION_QUEUE;
use vidframe_core::ServiceRole;
use vidframe_db::{PgNotificationRepository, PgUserDirectory, PgVideoRepository};
use vidframe_services::{CompletionNotifier, SmtpMailer};

/// Completion notifier: consumes video.notification.queue and emails owners
#[derive(Parser)]
#[command(name = "vidframe-notifier", version, about)]
struct Cli {
    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = setup::load_config(ServiceRole::Notifier)?;
    if cli.check_config {
        return Ok(());
    }

    let pool = setup::database::setup_database(&config).await?;
    let queue = setup::queue::setup_queue(&config, &pool, true).await?;
    let mailer = SmtpMailer::from_config(&config)?;

    let notifier = CompletionNotifier::new(
        Arc::new(PgVideoRepository::new(pool.clone())),
        Arc::new(PgNotificationRepository::new(pool.clone())),
        Arc::new(PgUserDirectory::new(pool)),
        Arc::new(mailer),
        tracing::info_span!("notifier"),
    );

    setup::queue::run_consumer(
        &config,
        queue,
        NOTIFICATION_QUEUE,
        Arc::new(notifier),
        tracing::info_span!("consumer", queue = NOTIFICATION_QUEUE),
    )
    .await;

    Ok(())
}
