use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Queue};

use crate::error::AppError;

/// Open the process-wide AMQP connection.
///
/// The connection is safe to share between tasks. Channels are not, so every
/// concurrent user opens its own with [`Connection::create_channel`].
pub async fn connect(amqp_url: &str) -> Result<Connection, AppError> {
    let connection = Connection::connect(amqp_url, ConnectionProperties::default())
        .await
        .map_err(AppError::connection)?;

    tracing::info!("Connected to AMQP broker");
    Ok(connection)
}

/// Declare the notification queue: non-durable, non-exclusive, not
/// auto-deleted and without extra arguments. Idempotent.
pub async fn declare_queue(channel: &Channel, queue_name: &str) -> Result<Queue, AppError> {
    channel
        .queue_declare(
            queue_name,
            QueueDeclareOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(AppError::publish)
}
