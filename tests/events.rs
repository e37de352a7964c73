//! Event maps as seen by an encoder: key order, collision aliasing,
//! message templates and JSON output.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing_log_extended::host::MemoryHost;
use tracing_log_extended::layer::EventMapLayer;
use tracing_log_extended::map::{DATA_PREFIX, EXCEPTION_DATA_PREFIX};
use tracing_log_extended::mapper::EventMapper;
use tracing_log_extended::stack::{StackFrame, StackTrace};
use tracing_log_extended::{
    build_event_map, Exception, Level, LogEvent, PropertyMap, StructuredLogger, Value,
};

#[derive(Serialize)]
struct Checkout {
    cart_id: u64,
    total: f64,
    coupon: Option<&'static str>,
    #[serde(rename = "Message")]
    note: &'static str,
}

#[test]
fn properties_never_overwrite_standard_fields() {
    let host = Arc::new(MemoryHost::new());
    let logger = StructuredLogger::new("shop", host.clone());

    logger.log_extended(
        Level::Info,
        "checkout",
        Some(&Checkout {
            cart_id: 7,
            total: 12.5,
            coupon: None,
            note: "from the user",
        }),
        None,
    );

    let event = &host.events()[0];
    assert_eq!(event.get("Message"), Some(&Value::from("checkout")));
    assert_eq!(event.get("data_Message"), Some(&Value::from("from the user")));
    assert_eq!(event.get("cart_id"), Some(&Value::Int(7)));
    assert_eq!(event.get("total"), Some(&Value::Float(12.5)));
    assert_eq!(event.get("coupon"), Some(&Value::Null));
}

#[test]
fn user_and_exception_data_with_the_same_key() {
    let exception = Exception::new("app::LookupError", "missing").with_data("Key1", "from exception");
    let event = LogEvent::new(Level::Error, "shop", "lookup failed")
        .with_property("Key1", "from user")
        .with_exception(Arc::new(exception));

    let map = build_event_map(&event);
    assert_eq!(map.get("Key1"), Some(&Value::from("from user")));
    assert_eq!(map.get("ex_Key1"), Some(&Value::from("from exception")));
}

#[test]
fn third_insert_of_a_key_is_dropped() {
    let mut map = PropertyMap::new();
    assert_eq!(map.insert("X", 1, DATA_PREFIX), Some("X"));
    assert_eq!(map.insert("X", 2, DATA_PREFIX), Some("data_X"));
    assert_eq!(map.insert("X", 3, DATA_PREFIX), None);

    assert_eq!(map.len(), 2);
    assert_eq!(map.get("X"), Some(&Value::Int(1)));
    assert_eq!(map.get("data_X"), Some(&Value::Int(2)));
}

#[test]
fn dotted_keys_are_flattened() {
    let mut map = PropertyMap::new();
    map.insert("http.request.method", "GET", EXCEPTION_DATA_PREFIX);
    assert_eq!(map.get("http_request_method"), Some(&Value::from("GET")));
}

#[test]
fn mapper_attributes_follow_the_standard_fields() {
    let mapper = EventMapper::new()
        .with_attribute("Application", "shop")
        .with_attribute("Level", "shadowed");
    let map = mapper.build(&LogEvent::new(Level::Warn, "shop", "slow"));

    let keys: Vec<_> = map.keys().collect();
    assert_eq!(
        keys,
        ["TimeStamp", "Level", "LoggerName", "Message", "Application", "attributes_Level"]
    );
    assert_eq!(map.get("Level"), Some(&Value::from("Warn")));
}

#[test]
fn template_parameters_through_the_logger() {
    let host = Arc::new(MemoryHost::new());
    let logger = StructuredLogger::new("shop", host.clone());

    let event = LogEvent::new(Level::Info, "shop", "order {OrderId} shipped to {1}")
        .with_parameters([Value::from(42), Value::from("Oslo")]);
    logger.log_event(event, None::<&()>);

    let event = &host.events()[0];
    assert_eq!(event.get("Message"), Some(&Value::from("order 42 shipped to Oslo")));
    assert_eq!(
        event.get("MessageTemplate"),
        Some(&Value::from("order {OrderId} shipped to {1}"))
    );
    assert!(!event.contains_key("Parameters"));
}

#[test]
fn unreferenced_parameters_are_listed() {
    let event = LogEvent::new(Level::Debug, "shop", "no holes").with_parameters([
        Value::from("a"),
        Value::Null,
        Value::from("b"),
    ]);
    let map = build_event_map(&event);
    assert_eq!(map.get("Message"), Some(&Value::from("no holes")));
    assert_eq!(map.get("Parameters"), Some(&Value::from("a,,b")));
}

#[test]
fn json_output_is_a_flat_object() {
    let frames = vec![
        StackFrame::new("shop::cart::Cart", "total").with_location("/src/cart.rs", 88),
        StackFrame::new("shop::api", "checkout").with_line(12),
    ];
    let exception = Exception::new("shop::PriceError", "negative total")
        .with_stack_trace(StackTrace::new(frames))
        .with_data("cart.items", 3);
    let mut nested = BTreeMap::new();
    nested.insert("region", vec!["eu", "us"]);

    let event = LogEvent::new(Level::Fatal, "shop", "pricing broke")
        .with_exception(Arc::new(exception))
        .with_property("lookup", serde_json::to_string(&nested).unwrap_or_default())
        .with_call_site("src/api.rs:12");

    let json = build_event_map(&event).to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let object = parsed.as_object().unwrap();

    assert!(object.values().all(|v| !v.is_object() && !v.is_array()));
    assert_eq!(object["Level"], "Fatal");
    assert_eq!(object["ExceptionType"], "PriceError");
    assert_eq!(object["cart_items"], 3);
    assert_eq!(object["CallSite"], "src/api.rs:12");
    assert!(object["ExceptionStackTrace"]
        .as_str()
        .unwrap()
        .contains("in /src/cart.rs:line 88"));
    assert_eq!(object["ExceptionFingerprint"].as_str().unwrap().len(), 40);
}

#[test]
fn tracing_events_share_the_mapping() {
    use tracing_subscriber::layer::SubscriberExt;

    let host = Arc::new(MemoryHost::new());
    let subscriber = tracing_subscriber::Registry::default().with(EventMapLayer::new(host.clone()));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "shop::api", Message = "field", retries = 3, "gave up");
    });

    let event = &host.events()[0];
    assert_eq!(event.get("LoggerName"), Some(&Value::from("shop::api")));
    assert_eq!(event.get("Level"), Some(&Value::from("Error")));
    assert_eq!(event.get("Message"), Some(&Value::from("gave up")));
    assert_eq!(event.get("data_Message"), Some(&Value::from("field")));
    assert_eq!(event.get("retries"), Some(&Value::Int(3)));
}
