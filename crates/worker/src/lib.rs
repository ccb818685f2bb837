//! Notification worker: consumes jobs from the queue and forwards each one to
//! the delivery server, continuing the producer's trace.

pub mod client;
pub mod consumer;
