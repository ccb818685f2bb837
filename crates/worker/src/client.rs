//! HTTP client for the delivery server.

use opentelemetry::global;
use opentelemetry::propagation::Injector;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use notify_common::error::AppError;
use notify_common::types::{NotificationKind, NotificationMessage};

const PATH_EMAIL: &str = "email";
const PATH_PUSH: &str = "push";

/// Writes propagation fields into outgoing HTTP request headers.
struct HttpHeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HttpHeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                self.0.insert(name, value);
            }
            _ => tracing::debug!(key, "Skipping propagation field that is not a valid header"),
        }
    }
}

/// Route on the delivery server for a notification kind.
pub fn route_for(kind: &NotificationKind) -> Result<&'static str, AppError> {
    match kind {
        NotificationKind::Email => Ok(PATH_EMAIL),
        NotificationKind::Push => Ok(PATH_PUSH),
        NotificationKind::Other(name) => Err(AppError::UnsupportedType(name.clone())),
    }
}

/// Delivery server client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeliveryClient {
    /// `base_url` must end with a slash; routes are appended to it.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Issue `GET <base_url><route>` for `message`, carrying the current trace
    /// context in the request headers.
    ///
    /// The response body is drained and discarded. The status code is returned
    /// but never turned into an error: a 5xx only marks the `deliver` span as
    /// failed. Network failures surface as [`AppError::Transport`].
    pub async fn send(&self, message: &NotificationMessage) -> Result<StatusCode, AppError> {
        let route = route_for(&message.kind)?;
        let url = format!("{}{}", self.base_url, route);

        let span = tracing::info_span!(
            "deliver",
            otel.kind = "client",
            http.request.method = "GET",
            url.full = %url,
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        );

        async {
            let current = tracing::Span::current();

            let mut headers = HeaderMap::new();
            let cx = current.context();
            global::get_text_map_propagator(|propagator| {
                propagator.inject_context(&cx, &mut HttpHeaderInjector(&mut headers));
            });

            let response = self.http.get(&url).headers(headers).send().await?;
            let status = response.status();
            current.record("http.response.status_code", status.as_u16());
            if status.is_server_error() {
                current.record("otel.status_code", "ERROR");
                tracing::warn!(status = status.as_u16(), route, "Delivery server reported a failure");
            }

            response.bytes().await?;
            Ok::<_, AppError>(status)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_mapping() {
        assert_eq!(route_for(&NotificationKind::Email).unwrap(), "email");
        assert_eq!(route_for(&NotificationKind::Push).unwrap(), "push");
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let err = route_for(&NotificationKind::Other("sms".to_string())).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedType(ref kind) if kind == "sms"));
    }

    #[test]
    fn test_injector_skips_invalid_header_names() {
        let mut headers = HeaderMap::new();
        let mut injector = HttpHeaderInjector(&mut headers);
        injector.set("traceparent", "00-abc-def-01".to_string());
        injector.set("bad header", "value".to_string());

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["traceparent"], "00-abc-def-01");
    }
}
