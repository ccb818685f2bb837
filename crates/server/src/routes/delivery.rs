//! Simulated delivery endpoints.
//!
//! `GET /email` and `GET /push` sleep for a fixed latency, then answer 200 or,
//! with probability `delivery_failure_rate`, 500. The caller's trace context is
//! read from the request headers so the handler span joins its trace.

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use rand::Rng;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::state::AppState;

const EMAIL_LATENCY: Duration = Duration::from_millis(50);
const PUSH_LATENCY: Duration = Duration::from_millis(150);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/email", get(send_email))
        .route("/push", get(send_push))
}

/// Reads propagation fields from incoming HTTP request headers.
struct HttpHeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HttpHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// GET /email — Pretend to send an email.
async fn send_email(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    simulate_send("send-email", EMAIL_LATENCY, &state, &headers).await
}

/// GET /push — Pretend to send a push notification.
async fn send_push(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    simulate_send("send-push", PUSH_LATENCY, &state, &headers).await
}

async fn simulate_send(
    name: &'static str,
    latency: Duration,
    state: &AppState,
    headers: &HeaderMap,
) -> StatusCode {
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HttpHeaderExtractor(headers))
    });

    let span = tracing::info_span!(
        "send",
        otel.name = name,
        otel.kind = "server",
        http.response.status_code = tracing::field::Empty,
        otel.status_code = tracing::field::Empty,
    );
    span.set_parent(parent);

    async {
        tokio::time::sleep(latency).await;

        let status = if should_fail(state.config.delivery_failure_rate) {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };

        let current = tracing::Span::current();
        current.record("http.response.status_code", status.as_u16());
        if status.is_server_error() {
            current.record("otel.status_code", "ERROR");
            tracing::warn!(endpoint = name, "Simulated delivery failure");
        } else {
            tracing::debug!(endpoint = name, "Simulated delivery succeeded");
        }
        status
    }
    .instrument(span)
    .await
}

fn should_fail(failure_rate: f64) -> bool {
    rand::thread_rng().gen_bool(failure_rate.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_rate_extremes() {
        assert!((0..1000).all(|_| !should_fail(0.0)));
        assert!((0..1000).all(|_| should_fail(1.0)));
    }

    #[test]
    fn test_extractor_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", "00-abc-def-01".parse().unwrap());

        let extractor = HttpHeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(extractor.get("tracestate"), None);
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }
}
