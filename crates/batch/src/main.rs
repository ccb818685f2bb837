//! Notification batch producer binary entrypoint.

use tokio_util::sync::CancellationToken;

use notify_batch::producer::BatchProducer;
use notify_common::amqp;
use notify_common::config::AppConfig;
use notify_common::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let _telemetry = init_telemetry(
        "notification-batch",
        "notify_batch=info,notify_common=info",
        &config,
    )?;

    tracing::info!("Notification batch producer starting...");

    // Connect to the broker
    let connection = amqp::connect(&config.amqp_url).await?;

    let producer = BatchProducer::new(connection, config.queue_name.clone())
        .with_tick(config.producer_tick())
        .with_max_fan_out(config.producer_max_fan_out)
        .with_publish_timeout(config.publish_timeout());

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

    tracing::info!("Sending messages. To exit press CTRL+C");
    producer.run(cancel).await;
    producer.shutdown().await;

    tracing::info!("Notification batch producer stopped.");
    Ok(())
}
