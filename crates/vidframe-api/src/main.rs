use clap::Parser;
use vidframe_api::setup;
use vidframe_core::ServiceRole;

/// HTTP gateway: uploads, status, listing and archive downloads
#[derive(Parser)]
#[command(name = "vidframe-api", version, about)]
struct Cli {
    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = setup::load_config(ServiceRole::Gateway)?;
    if cli.check_config {
        return Ok(());
    }

    let (_state, router) = setup::initialize_gateway(&config).await?;
    setup::server::start_server(&config, router).await?;

    Ok(())
}
