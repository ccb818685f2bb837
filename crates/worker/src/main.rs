//! Notification worker binary entrypoint.

use tokio_util::sync::CancellationToken;

use notify_common::amqp;
use notify_common::config::AppConfig;
use notify_common::error::AppError;
use notify_common::telemetry::init_telemetry;
use notify_worker::client::DeliveryClient;
use notify_worker::consumer::NotificationConsumer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let _telemetry = init_telemetry(
        "notification-worker",
        "notify_worker=info,notify_common=info",
        &config,
    )?;

    tracing::info!("Notification worker starting...");

    let client = DeliveryClient::new(config.delivery_base_url.clone())?;

    // Connect to the broker and make sure the queue exists
    let connection = amqp::connect(&config.amqp_url).await?;
    let channel = connection
        .create_channel()
        .await
        .map_err(AppError::connection)?;
    amqp::declare_queue(&channel, &config.queue_name).await?;

    // Stop on Ctrl+C
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal, stopping gracefully..."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    let consumer = NotificationConsumer::new(client);
    let result = consumer.run(&channel, &config.queue_name, cancel).await;

    if let Err(e) = connection.close(200, "Bye").await {
        tracing::warn!(error = %e, "Failed to close AMQP connection");
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "Consumer exited with error");
        return Err(e.into());
    }

    tracing::info!("Notification worker stopped.");
    Ok(())
}
