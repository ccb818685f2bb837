//! Queue consumer loop.
//!
//! Messages are auto-acknowledged on receipt, so delivery is at-most-once: a
//! message whose handling fails, or that is in flight when the process dies,
//! is not redelivered.

use lapin::Channel;
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use opentelemetry::global;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use notify_common::carrier::HeaderExtractor;
use notify_common::error::AppError;
use notify_common::types::NotificationMessage;

use crate::client::DeliveryClient;

const CONSUMER_TAG: &str = "notification-worker";

/// Sequential consumer: one message is fully handled before the next is read.
pub struct NotificationConsumer {
    client: DeliveryClient,
}

impl NotificationConsumer {
    pub fn new(client: DeliveryClient) -> Self {
        Self { client }
    }

    /// Handle one delivery: continue the trace found in `headers`, decode
    /// `body` and forward it to the delivery server.
    ///
    /// Without a usable trace context in the headers the `consume` span
    /// starts a new trace.
    pub async fn handle_delivery(
        &self,
        headers: Option<&FieldTable>,
        body: &[u8],
    ) -> Result<NotificationMessage, AppError> {
        let empty = FieldTable::default();
        let headers = headers.unwrap_or(&empty);
        let parent = global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor(headers))
        });

        let span = tracing::info_span!(
            "consume",
            otel.kind = "consumer",
            notification.kind = tracing::field::Empty,
        );
        span.set_parent(parent);

        async {
            let message = NotificationMessage::decode(body)?;
            tracing::Span::current().record("notification.kind", message.kind.as_str());
            tracing::info!(
                kind = %message.kind,
                recipient = %message.recipient,
                "Received notification"
            );

            self.client.send(&message).await?;
            Ok::<_, AppError>(message)
        }
        .instrument(span)
        .await
    }

    /// Consume `queue_name` on `channel` until `cancel` fires or the delivery
    /// stream breaks.
    ///
    /// A message that fails to decode or deliver is logged and dropped. A
    /// broken stream ends the loop with an error.
    pub async fn run(
        &self,
        channel: &Channel,
        queue_name: &str,
        cancel: CancellationToken,
    ) -> Result<(), AppError> {
        let mut deliveries = channel
            .basic_consume(
                queue_name,
                CONSUMER_TAG,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(AppError::connection)?;

        tracing::info!(queue = %queue_name, "Waiting for messages");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Consumer stopping");
                    return Ok(());
                }
                delivery = deliveries.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            let headers = delivery.properties.headers().as_ref();
                            if let Err(e) = self.handle_delivery(headers, &delivery.data).await {
                                tracing::error!(error = %e, "Failed to handle notification");
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Delivery stream failed");
                            return Err(AppError::connection(e));
                        }
                        None => {
                            tracing::info!("Delivery stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
