//! Exception fan-out: one correlated event per exception in the graph.

use std::sync::Arc;

use serde::Serialize;
use tracing_log_extended::host::MemoryHost;
use tracing_log_extended::{Exception, Level, PropertyMap, StructuredLogger, Value};

fn logger() -> (StructuredLogger, Arc<MemoryHost>) {
    let host = Arc::new(MemoryHost::new());
    (StructuredLogger::new("payments", host.clone()), host)
}

fn messages(events: &[PropertyMap]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.get("ExceptionMessage").map(Value::render).unwrap_or_default())
        .collect()
}

fn index_count(event: &PropertyMap) -> (Value, Value) {
    (
        event.get("ExceptionIndex").cloned().unwrap_or(Value::Null),
        event.get("ExceptionCount").cloned().unwrap_or(Value::Null),
    )
}

#[derive(Serialize)]
struct RequestInfo {
    request_id: &'static str,
    #[serde(rename = "Key1")]
    key1: &'static str,
}

#[test]
fn linear_chain_emits_one_event_per_exception() {
    let (logger, host) = logger();
    let chain = Exception::new("app::Outer", "outer")
        .with_inner(Exception::new("app::Inner1", "inner1").with_inner(Exception::new("app::Inner2", "inner2")));

    logger.log_extended::<()>(Level::Error, "charge failed", None, Some(Arc::new(chain)));

    let events = host.events();
    assert_eq!(events.len(), 3);
    assert_eq!(messages(&events), ["outer", "inner1", "inner2"]);

    let tag = events[0].get("ExceptionTag").cloned().expect("tag");
    for (i, event) in events.iter().enumerate() {
        assert_eq!(
            index_count(event),
            (Value::UInt(i as u64 + 1), Value::UInt(3))
        );
        assert_eq!(event.get("ExceptionTag"), Some(&tag));
        assert_eq!(event.get("Message"), Some(&Value::from("charge failed")));
    }
}

#[test]
fn nested_aggregates_expand_to_their_members() {
    let (logger, host) = logger();
    let tree = Exception::aggregate(
        "parallel work failed",
        vec![
            Exception::new("app::A", "a"),
            Exception::aggregate("nested", vec![Exception::new("app::B", "b"), Exception::new("app::C", "c")]),
        ],
    );

    logger.error("batch failed", Some(Arc::new(tree)));

    let events = host.events();
    assert_eq!(events.len(), 4);
    assert_eq!(messages(&events), ["parallel work failed", "a", "b", "c"]);
    let pairs: Vec<_> = events.iter().map(index_count).collect();
    assert_eq!(
        pairs,
        (1..=4u64)
            .map(|i| (Value::UInt(i), Value::UInt(4)))
            .collect::<Vec<_>>()
    );
    assert_eq!(
        events[0].get("ExceptionType"),
        Some(&Value::from("AggregateException"))
    );
}

#[test]
fn tags_differ_between_logging_calls() {
    let (logger, host) = logger();
    let chain = || Arc::new(Exception::new("E", "outer").with_inner(Exception::new("E", "inner")));

    logger.error("first", Some(chain()));
    logger.error("second", Some(chain()));

    let events = host.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].get("ExceptionTag"), events[1].get("ExceptionTag"));
    assert_ne!(events[0].get("ExceptionTag"), events[2].get("ExceptionTag"));
}

#[test]
fn every_sibling_event_carries_the_same_properties() {
    let (logger, host) = logger();
    let chain = Exception::new("app::Outer", "outer")
        .with_data("Key1", "outer data")
        .with_inner(Exception::new("app::Inner", "inner").with_data("Key1", "inner data"));

    logger.log_extended(
        Level::Error,
        "failed",
        Some(&RequestInfo {
            request_id: "r-1",
            key1: "v1",
        }),
        Some(Arc::new(chain)),
    );

    let events = host.events();
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(event.get("request_id"), Some(&Value::from("r-1")));
        assert_eq!(event.get("Key1"), Some(&Value::from("v1")));
    }
    assert_eq!(events[0].get("ex_Key1"), Some(&Value::from("outer data")));
    assert_eq!(events[1].get("ex_Key1"), Some(&Value::from("inner data")));
}

#[test]
fn a_bad_property_does_not_stop_the_batch() {
    struct Unrenderable;
    impl Serialize for Unrenderable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot render"))
        }
    }

    #[derive(Serialize)]
    struct Props {
        good: u32,
        bad: Unrenderable,
    }

    let (logger, host) = logger();
    let chain = Exception::new("E", "outer").with_inner(Exception::new("E", "inner"));
    logger.log_extended(
        Level::Error,
        "failed",
        Some(&Props {
            good: 1,
            bad: Unrenderable,
        }),
        Some(Arc::new(chain)),
    );

    let events = host.events();
    assert_eq!(events.len(), 2);
    for event in &events {
        assert_eq!(event.get("good"), Some(&Value::Int(1)));
        let bad = event.get("bad").map(Value::render).unwrap_or_default();
        assert!(bad.starts_with("Render failed: "), "{bad}");
    }
}

#[test]
fn rust_errors_log_their_source_chain() {
    #[derive(Debug, thiserror::Error)]
    #[error("settings unreadable")]
    struct SettingsError {
        #[source]
        source: std::io::Error,
    }

    let error = SettingsError {
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "settings.toml missing"),
    };

    let (logger, host) = logger();
    logger.error("startup failed", Some(Arc::new(Exception::from_error(&error))));

    let events = host.events();
    assert_eq!(events.len(), 2);
    assert_eq!(messages(&events), ["settings unreadable", "settings.toml missing"]);
    assert_eq!(events[0].get("ExceptionType"), Some(&Value::from("SettingsError")));
}
