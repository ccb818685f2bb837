//! Batch producer: publishes randomized notification jobs on a fixed tick.
//!
//! Every tick draws a fan-out count `n` in `[0, max_fan_out)` and runs `n`
//! publish attempts concurrently. Each attempt:
//! 1. Opens its own channel on the shared connection
//! 2. Declares the notification queue
//! 3. Encodes a random [`NotificationMessage`]
//! 4. Injects the `produce` span's trace context into the message headers
//! 5. Publishes to the default exchange, routed by queue name
//!
//! The tick waits for all of its attempts before sleeping again.

use std::sync::Arc;
use std::time::Duration;

use lapin::options::BasicPublishOptions;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection};
use opentelemetry::{Context, global};
use rand::Rng;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use notify_common::amqp;
use notify_common::carrier::HeaderInjector;
use notify_common::error::AppError;
use notify_common::types::NotificationMessage;

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const DEFAULT_MAX_FAN_OUT: usize = 3;
const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a single tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub published: usize,
    pub failed: usize,
}

/// Timer-driven producer sharing one AMQP connection across attempts.
pub struct BatchProducer {
    connection: Arc<Connection>,
    queue_name: String,
    tick: Duration,
    max_fan_out: usize,
    publish_timeout: Duration,
}

impl BatchProducer {
    pub fn new(connection: Connection, queue_name: String) -> Self {
        Self {
            connection: Arc::new(connection),
            queue_name,
            tick: DEFAULT_TICK,
            max_fan_out: DEFAULT_MAX_FAN_OUT,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Exclusive upper bound of attempts per tick.
    pub fn with_max_fan_out(mut self, max_fan_out: usize) -> Self {
        self.max_fan_out = max_fan_out;
        self
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Run the tick loop until `cancel` fires.
    ///
    /// Cancellation is only observed while waiting for the next tick. A tick
    /// that has started runs all of its attempts to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            queue = %self.queue_name,
            tick_ms = self.tick.as_millis() as u64,
            max_fan_out = self.max_fan_out,
            "Batch producer started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Batch producer stopping");
                    break;
                }
                _ = tokio::time::sleep(self.tick) => {}
            }

            let attempts = draw_fan_out(&mut rand::thread_rng(), self.max_fan_out);
            let summary = self.run_tick(attempts).await;
            tracing::debug!(
                attempts,
                published = summary.published,
                failed = summary.failed,
                "Tick finished"
            );
        }
    }

    /// Run `attempts` concurrent publishes and wait for all of them.
    ///
    /// A failed attempt is logged and counted; it never affects its siblings
    /// or later ticks.
    pub async fn run_tick(&self, attempts: usize) -> TickSummary {
        let mut tasks = JoinSet::new();
        for _ in 0..attempts {
            let connection = Arc::clone(&self.connection);
            let queue_name = self.queue_name.clone();
            let timeout = self.publish_timeout;
            tasks.spawn(async move { publish_one(&connection, &queue_name, timeout).await });
        }

        let mut summary = TickSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => summary.published += 1,
                Ok(Err(e)) => {
                    summary.failed += 1;
                    tracing::error!(error = %e, "Publish attempt failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(error = %e, "Publish task aborted");
                }
            }
        }
        summary
    }

    /// Close the shared connection.
    pub async fn shutdown(&self) {
        if let Err(e) = self.connection.close(200, "Bye").await {
            tracing::warn!(error = %e, "Failed to close AMQP connection");
        }
    }
}

/// Number of publish attempts for one tick, uniform in `[0, max_fan_out)`.
pub fn draw_fan_out(rng: &mut impl Rng, max_fan_out: usize) -> usize {
    rng.gen_range(0..max_fan_out.max(1))
}

/// Encode `message` and build its header table with `cx` injected through
/// the global propagator.
pub fn prepare_publish(
    message: &NotificationMessage,
    cx: &Context,
) -> Result<(Vec<u8>, FieldTable), AppError> {
    let body = message.encode()?;

    let mut headers = FieldTable::default();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut HeaderInjector(&mut headers));
    });

    Ok((body, headers))
}

/// One publish attempt on a dedicated channel, inside a fresh root span
/// named `produce` and bounded by `timeout`.
pub async fn publish_one(
    connection: &Connection,
    queue_name: &str,
    timeout: Duration,
) -> Result<(), AppError> {
    let span = tracing::info_span!(
        parent: None,
        "produce",
        otel.kind = "producer",
        messaging.destination.name = %queue_name,
        notification.kind = tracing::field::Empty,
    );

    let attempt = async {
        let channel = connection
            .create_channel()
            .await
            .map_err(AppError::connection)?;
        amqp::declare_queue(&channel, queue_name).await?;

        let message = NotificationMessage::new_random();
        let current = tracing::Span::current();
        current.record("notification.kind", message.kind.as_str());
        let (body, headers) = prepare_publish(&message, &current.context())?;

        channel
            .basic_publish(
                "",
                queue_name,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type("application/octet-stream".into())
                    .with_headers(headers),
            )
            .await
            .map_err(AppError::publish)?
            .await
            .map_err(AppError::publish)?;

        if let Err(e) = channel.close(200, "OK").await {
            tracing::debug!(error = %e, "Failed to close channel");
        }

        tracing::info!(kind = %message.kind, "Message has been sent");
        Ok::<(), AppError>(())
    };

    tokio::time::timeout(timeout, attempt.instrument(span))
        .await
        .map_err(|_| AppError::Timeout(timeout.as_secs()))?
}
