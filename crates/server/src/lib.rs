//! Stub delivery server. Pretends to send emails and push notifications with a
//! fixed latency and a configurable failure rate.

pub mod routes;
pub mod state;
