//! Notification delivery server binary entrypoint.

use std::net::SocketAddr;

use tower_http::trace::TraceLayer;

use notify_common::config::AppConfig;
use notify_common::telemetry::init_telemetry;

use notify_server::routes::create_router;
use notify_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let _telemetry = init_telemetry(
        "notification-server",
        "notify_server=debug,tower_http=debug",
        &config,
    )?;

    tracing::info!("Starting notification delivery server...");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));

    // Build router
    let app = create_router(AppState::new(config)).layer(TraceLayer::new_for_http());

    // Start server
    tracing::info!("Delivery server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal, stopping gracefully...");
            }
        })
        .await?;

    tracing::info!("Notification delivery server stopped.");
    Ok(())
}
