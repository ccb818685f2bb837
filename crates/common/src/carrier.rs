//! Trace-context carriers over AMQP message headers.
//!
//! OpenTelemetry propagators read and write string fields through the
//! [`Injector`] and [`Extractor`] traits. These adapters expose an AMQP
//! [`FieldTable`] through those traits so a trace context can cross the queue
//! inside the message headers.
//!
//! Both adapters borrow the table. The table itself belongs to the message
//! being published or the delivery being handled.
//!
//! ```ignore
//! use opentelemetry::global;
//! use notify_common::carrier::{HeaderExtractor, HeaderInjector};
//!
//! let mut headers = FieldTable::default();
//! global::get_text_map_propagator(|propagator| {
//!     propagator.inject_context(&cx, &mut HeaderInjector(&mut headers));
//! });
//!
//! let parent_cx = global::get_text_map_propagator(|propagator| {
//!     propagator.extract(&HeaderExtractor(&headers))
//! });
//! ```

use lapin::types::{AMQPValue, FieldTable, ShortString};
use opentelemetry::propagation::{Extractor, Injector};

/// Write side of the carrier, used when publishing.
pub struct HeaderInjector<'a>(pub &'a mut FieldTable);

impl Injector for HeaderInjector<'_> {
    /// Insert or overwrite `key` with a long-string value.
    fn set(&mut self, key: &str, value: String) {
        self.0
            .insert(ShortString::from(key), AMQPValue::LongString(value.into()));
    }
}

/// Read side of the carrier, used when consuming.
pub struct HeaderExtractor<'a>(pub &'a FieldTable);

impl HeaderExtractor<'_> {
    fn lookup(&self, key: &str) -> Option<&AMQPValue> {
        self.0
            .inner()
            .iter()
            .find(|(name, _)| name.as_str() == key)
            .map(|(_, value)| value)
    }

    /// The value stored under `key` rendered as a string, or an empty string
    /// when the header is absent.
    pub fn get_string(&self, key: &str) -> String {
        self.lookup(key).map(value_to_string).unwrap_or_default()
    }
}

impl Extractor for HeaderExtractor<'_> {
    /// String-valued header under `key`. Non-string values are invisible to
    /// the propagator; use [`HeaderExtractor::get_string`] to read them.
    fn get(&self, key: &str) -> Option<&str> {
        match self.lookup(key)? {
            AMQPValue::LongString(value) => std::str::from_utf8(value.as_bytes()).ok(),
            AMQPValue::ShortString(value) => Some(value.as_str()),
            _ => None,
        }
    }

    fn keys(&self) -> Vec<&str> {
        self.0.inner().keys().map(ShortString::as_str).collect()
    }
}

fn value_to_string(value: &AMQPValue) -> String {
    match value {
        AMQPValue::LongString(v) => String::from_utf8_lossy(v.as_bytes()).into_owned(),
        AMQPValue::ShortString(v) => v.as_str().to_string(),
        AMQPValue::Boolean(v) => v.to_string(),
        AMQPValue::ShortShortInt(v) => v.to_string(),
        AMQPValue::ShortShortUInt(v) => v.to_string(),
        AMQPValue::ShortInt(v) => v.to_string(),
        AMQPValue::ShortUInt(v) => v.to_string(),
        AMQPValue::LongInt(v) => v.to_string(),
        AMQPValue::LongUInt(v) => v.to_string(),
        AMQPValue::LongLongInt(v) => v.to_string(),
        AMQPValue::Float(v) => v.to_string(),
        AMQPValue::Double(v) => v.to_string(),
        AMQPValue::Timestamp(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use opentelemetry::propagation::TextMapPropagator;
    use opentelemetry::trace::{TraceContextExt, Tracer, TracerProvider as _};
    use opentelemetry::Context;
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use opentelemetry_sdk::trace::TracerProvider;

    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut headers = FieldTable::default();
        HeaderInjector(&mut headers).set("k", "v".to_string());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("k"), Some("v"));
        assert_eq!(extractor.get_string("k"), "v");
    }

    #[test]
    fn test_set_overwrites_existing_key() {
        let mut headers = FieldTable::default();
        let mut injector = HeaderInjector(&mut headers);
        injector.set("traceparent", "first".to_string());
        injector.set("traceparent", "second".to_string());

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("traceparent"), Some("second"));
        assert_eq!(extractor.keys().len(), 1);
    }

    #[test]
    fn test_missing_key_reads_as_empty() {
        let headers = FieldTable::default();
        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get("absent"), None);
        assert_eq!(extractor.get_string("absent"), "");
        assert!(extractor.keys().is_empty());
    }

    #[test]
    fn test_keys_lists_exactly_the_stored_names() {
        let mut headers = FieldTable::default();
        let mut injector = HeaderInjector(&mut headers);
        for i in 0..5 {
            injector.set(&format!("key-{i}"), format!("value-{i}"));
        }

        let extractor = HeaderExtractor(&headers);
        let keys = extractor.keys();
        assert_eq!(keys.len(), 5);
        assert!(keys.iter().all(|k| !k.is_empty()));
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(keys.contains(&"key-3"));
    }

    #[test]
    fn test_non_string_values_are_coerced() {
        let mut headers = FieldTable::default();
        headers.insert("retries".into(), AMQPValue::LongInt(3));
        headers.insert("flag".into(), AMQPValue::Boolean(true));

        let extractor = HeaderExtractor(&headers);
        assert_eq!(extractor.get_string("retries"), "3");
        assert_eq!(extractor.get_string("flag"), "true");
        assert_eq!(extractor.get("retries"), None);
    }

    #[test]
    fn test_trace_id_survives_inject_and_extract() {
        let provider = TracerProvider::builder().build();
        let tracer = provider.tracer("carrier-test");
        let span = tracer.start("produce");
        let cx = Context::current_with_span(span);
        let trace_id = cx.span().span_context().trace_id();

        let propagator = TraceContextPropagator::new();
        let mut headers = FieldTable::default();
        propagator.inject_context(&cx, &mut HeaderInjector(&mut headers));

        let extractor = HeaderExtractor(&headers);
        assert!(extractor.keys().contains(&"traceparent"));

        let extracted = propagator.extract(&extractor);
        let remote = extracted.span().span_context().clone();
        assert!(remote.is_valid());
        assert!(remote.is_remote());
        assert_eq!(remote.trace_id(), trace_id);
    }

    #[test]
    fn test_extract_without_context_yields_invalid_span() {
        let headers = FieldTable::default();
        let extracted = TraceContextPropagator::new().extract(&HeaderExtractor(&headers));
        assert!(!extracted.span().span_context().is_valid());
    }
}
