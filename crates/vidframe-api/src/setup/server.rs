//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use vidframe_core::Config;

pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_video_mb = config.max_video_size_bytes() / 1024 / 1024,
        video_extensions = %config.video_allowed_extensions().join(","),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(vidframe_infra::shutdown_signal())
        .await?;

    Ok(())
}
