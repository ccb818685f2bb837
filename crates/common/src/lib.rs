//! Shared building blocks for the notification pipeline: the queued message
//! format, the AMQP header carrier used for trace propagation, configuration,
//! errors and telemetry bootstrap.

pub mod amqp;
pub mod carrier;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;
