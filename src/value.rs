use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// A scalar property value carried by a [`PropertyMap`](crate::map::PropertyMap).
///
/// Events are flat: anything that is not a scalar (sequences, nested records)
/// is carried as its JSON text in [`Value::Str`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Instant with its offset. `DateTime<Utc>` converts with a zero offset.
    Timestamp(DateTime<FixedOffset>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical string form, see [`format_value`].
    pub fn render(&self) -> String {
        format_value(self)
    }

    /// Convert a `serde_json` value. Compound values keep their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            other => Value::Str(other.to_string()),
        }
    }
}

/// Render a scalar to its canonical string.
///
/// - `Null` renders as the empty string.
/// - Timestamps use round-trip ISO-8601 with nanosecond precision; a zero
///   offset is always written as `Z`, never `+00:00`.
/// - Booleans render as `True` / `False`.
/// - Numbers use locale-independent formatting; non-finite floats render as
///   `NaN`, `Infinity` and `-Infinity`.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => s.clone(),
        Value::Timestamp(ts) => format_timestamp(ts),
    }
}

/// Round-trip ISO-8601 rendering of an instant.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        f.to_string()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(f) => serializer.serialize_str(&format_float(*f)),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_value(self))
    }
}

macro_rules! value_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

value_from!(Int as i64: i8, i16, i32, i64, isize);
value_from!(UInt as u64: u8, u16, u32, u64, usize);
value_from!(Float as f64: f32, f64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Local>> for Value {
    fn from(v: DateTime<Local>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn null_renders_empty() {
        assert_eq!(format_value(&Value::Null), "");
    }

    #[test]
    fn utc_renders_with_z() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let rendered = format_value(&Value::from(ts));
        assert_eq!(rendered, "2024-03-05T14:07:09.000000000Z");
    }

    #[test]
    fn zero_offset_is_canonicalized_to_z() {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .unwrap();
        let rendered = format_value(&Value::from(ts));
        assert!(rendered.ends_with('Z'));
        assert!(!rendered.contains("+00:00"));
    }

    #[test]
    fn non_zero_offset_keeps_offset() {
        let ts = FixedOffset::west_opt(5 * 3600 + 30 * 60)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .unwrap();
        assert_eq!(
            format_value(&Value::from(ts)),
            "2024-03-05T14:07:09.000000000-05:30"
        );
    }

    #[test]
    fn sub_second_precision_is_kept() {
        let ts = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(
            format_value(&Value::from(ts)),
            "2024-01-01T00:00:00.123456789Z"
        );
    }

    #[test]
    fn scalars_use_host_conventions() {
        assert_eq!(format_value(&Value::from(true)), "True");
        assert_eq!(format_value(&Value::from(false)), "False");
        assert_eq!(format_value(&Value::from(42u8)), "42");
        assert_eq!(format_value(&Value::from(-7i32)), "-7");
        assert_eq!(format_value(&Value::from(1.5f64)), "1.5");
        assert_eq!(format_value(&Value::from(f64::INFINITY)), "Infinity");
        assert_eq!(format_value(&Value::from(None::<i32>)), "");
    }

    #[test]
    fn compound_json_keeps_text() {
        let v = Value::from_json(serde_json::json!({"a": [1, 2]}));
        assert_eq!(v, Value::Str(r#"{"a":[1,2]}"#.to_string()));
    }

    use chrono::Timelike;

    proptest::proptest! {
        #[test]
        fn rendering_is_deterministic(secs in 0i64..4_000_000_000, offset in -50_000i32..50_000) {
            let tz = FixedOffset::east_opt(offset).unwrap();
            let ts = tz.timestamp_opt(secs, 0).unwrap();
            let v = Value::from(ts);
            proptest::prop_assert_eq!(format_value(&v), format_value(&v));
            if offset == 0 {
                proptest::prop_assert!(format_value(&v).ends_with('Z'));
            }
        }
    }
}
