//! Flattening of user-supplied "extra properties" objects.
//!
//! Any `serde::Serialize` value is accepted. String-keyed maps pass through
//! entry by entry; records (structs, struct variants, and newtypes or
//! options wrapping them) yield one entry per serialized field. Everything
//! else flattens to nothing.
//!
//! The field plan of a struct type (ordered field names, with their shared
//! key strings) is discovered on first use and cached per `TypeId`, so later
//! instances of the same type skip discovery and reuse the interned keys.
//! Only types that always serialize as the same struct get a plan; enums,
//! options and maps change shape from value to value and are rediscovered
//! on every call.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::ser::{self, Impossible, Serialize};

use crate::value::Value;

/// Flattened entries in serialization order. Keys are raw (not normalized).
pub type FlatProperties = Vec<(Arc<str>, Value)>;

#[derive(Debug)]
enum ShapePlan {
    Record(Vec<PlannedField>),
    /// A struct without serialized fields.
    Empty,
}

#[derive(Debug, Clone)]
struct PlannedField {
    name: &'static str,
    key: Arc<str>,
}

static PLANS: Lazy<RwLock<HashMap<TypeId, Arc<ShapePlan>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Flatten `instance` into ordered `(key, raw value)` entries.
///
/// `None` yields an empty result. A field whose value fails to serialize is
/// kept with a `Render failed: ...` placeholder; a value whose shape cannot
/// be flattened at all yields an empty result. Never panics.
pub fn flatten<T>(instance: Option<&T>) -> FlatProperties
where
    T: Serialize + ?Sized + 'static,
{
    let Some(instance) = instance else {
        return Vec::new();
    };

    let type_id = TypeId::of::<T>();
    let cached = PLANS.read().get(&type_id).cloned();

    match cached {
        Some(plan) => match plan.as_ref() {
            ShapePlan::Empty => Vec::new(),
            ShapePlan::Record(fields) => collect(instance, Some(fields))
                .map(|c| c.entries)
                .unwrap_or_default(),
        },
        None => {
            tracing::debug!(
                shape = std::any::type_name::<T>(),
                "discovering property plan"
            );
            match collect(instance, None) {
                Ok(collected) => {
                    if let Some(plan) = collected.plan {
                        // Losing a race here only means the plan was computed twice.
                        PLANS
                            .write()
                            .entry(type_id)
                            .or_insert_with(|| Arc::new(plan));
                    }
                    collected.entries
                }
                Err(FlattenError::Unsupported(kind)) => {
                    tracing::debug!(
                        shape = std::any::type_name::<T>(),
                        kind,
                        "value has no named members"
                    );
                    Vec::new()
                }
                Err(FlattenError::Custom(msg)) => {
                    tracing::debug!(
                        shape = std::any::type_name::<T>(),
                        error = %msg,
                        "failed to flatten properties"
                    );
                    Vec::new()
                }
            }
        }
    }
}

/// Whether a field plan is already cached for `T`.
pub fn is_plan_cached<T: ?Sized + 'static>() -> bool {
    PLANS.read().contains_key(&TypeId::of::<T>())
}

/// Diagnostic placeholder for a value that could not be rendered.
pub fn render_failure(kind: &str, message: &str) -> String {
    format!("Render failed: {kind} {message}")
}

/// Serialize a single field value into a raw [`Value`].
fn render_raw<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(json) => Value::from_json(json),
        Err(e) => {
            let kind = format!("{:?}", e.classify());
            Value::Str(render_failure(&kind, &e.to_string()))
        }
    }
}

fn collect<T: Serialize + ?Sized>(
    instance: &T,
    plan: Option<&[PlannedField]>,
) -> Result<Collected, FlattenError> {
    instance.serialize(ShapeSerializer { plan, fixed: true })
}

struct Collected {
    /// Plan to cache; `None` when a plan was replayed or the shape depends
    /// on the value.
    plan: Option<ShapePlan>,
    entries: FlatProperties,
}

#[derive(thiserror::Error, Debug)]
enum FlattenError {
    #[error("unsupported shape: {0}")]
    Unsupported(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl ser::Error for FlattenError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        FlattenError::Custom(msg.to_string())
    }
}

/// Top-level serializer: accepts maps and records, rejects everything else.
struct ShapeSerializer<'p> {
    plan: Option<&'p [PlannedField]>,
    /// Every instance of the type takes the path taken so far.
    fixed: bool,
}

impl<'p> ShapeSerializer<'p> {
    fn value_dependent(self) -> Self {
        Self {
            plan: None,
            fixed: false,
        }
    }
}

macro_rules! unsupported_scalar {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<Collected, FlattenError> {
                Err(FlattenError::Unsupported("scalar"))
            }
        )*
    };
}

impl<'p> ser::Serializer for ShapeSerializer<'p> {
    type Ok = Collected;
    type Error = FlattenError;
    type SerializeSeq = Impossible<Collected, FlattenError>;
    type SerializeTuple = Impossible<Collected, FlattenError>;
    type SerializeTupleStruct = Impossible<Collected, FlattenError>;
    type SerializeTupleVariant = Impossible<Collected, FlattenError>;
    type SerializeMap = MapCollector;
    type SerializeStruct = RecordCollector<'p>;
    type SerializeStructVariant = RecordCollector<'p>;

    unsupported_scalar!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    );

    fn serialize_none(self) -> Result<Collected, FlattenError> {
        // An absent optional says nothing about the shape behind it.
        Ok(Collected {
            plan: None,
            entries: Vec::new(),
        })
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Collected, FlattenError> {
        value.serialize(self.value_dependent())
    }

    fn serialize_unit(self) -> Result<Collected, FlattenError> {
        Err(FlattenError::Unsupported("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Collected, FlattenError> {
        Err(FlattenError::Unsupported("unit struct"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<Collected, FlattenError> {
        Err(FlattenError::Unsupported("unit variant"))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Collected, FlattenError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Collected, FlattenError> {
        value.serialize(self.value_dependent())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, FlattenError> {
        Err(FlattenError::Unsupported("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, FlattenError> {
        Err(FlattenError::Unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, FlattenError> {
        Err(FlattenError::Unsupported("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, FlattenError> {
        Err(FlattenError::Unsupported("tuple variant"))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapCollector, FlattenError> {
        Ok(MapCollector {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<RecordCollector<'p>, FlattenError> {
        Ok(RecordCollector::new(self.plan, self.fixed, len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<RecordCollector<'p>, FlattenError> {
        Ok(RecordCollector::new(None, false, len))
    }
}

struct MapCollector {
    entries: FlatProperties,
    pending_key: Option<Arc<str>>,
}

impl ser::SerializeMap for MapCollector {
    type Ok = Collected;
    type Error = FlattenError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), FlattenError> {
        let key = match render_raw(key) {
            Value::Str(s) => s,
            other => other.render(),
        };
        self.pending_key = Some(Arc::from(key));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), FlattenError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| FlattenError::Custom("map value without key".to_string()))?;
        self.entries.push((key, render_raw(value)));
        Ok(())
    }

    fn end(self) -> Result<Collected, FlattenError> {
        Ok(Collected {
            plan: None,
            entries: self.entries,
        })
    }
}

struct RecordCollector<'p> {
    plan: Option<&'p [PlannedField]>,
    cacheable: bool,
    discovered: Vec<PlannedField>,
    entries: FlatProperties,
    position: usize,
}

impl<'p> RecordCollector<'p> {
    fn new(plan: Option<&'p [PlannedField]>, cacheable: bool, len: usize) -> Self {
        Self {
            plan,
            cacheable,
            discovered: Vec::with_capacity(if plan.is_some() { 0 } else { len }),
            entries: Vec::with_capacity(len),
            position: 0,
        }
    }

    fn key_for(&mut self, name: &'static str) -> Arc<str> {
        match self.plan {
            Some(plan) => {
                // Fields normally arrive in plan order; skipped fields shift it.
                let found = plan
                    .get(self.position)
                    .filter(|f| f.name == name)
                    .map(|f| (self.position, f))
                    .or_else(|| plan.iter().enumerate().find(|(_, f)| f.name == name));
                match found {
                    Some((index, field)) => {
                        self.position = index + 1;
                        Arc::clone(&field.key)
                    }
                    None => Arc::from(name),
                }
            }
            None => {
                let key: Arc<str> = Arc::from(name);
                if self.cacheable {
                    self.discovered.push(PlannedField {
                        name,
                        key: Arc::clone(&key),
                    });
                }
                key
            }
        }
    }

    fn field<T: Serialize + ?Sized>(&mut self, name: &'static str, value: &T) {
        let key = self.key_for(name);
        self.entries.push((key, render_raw(value)));
    }

    fn finish(self) -> Collected {
        let plan = match self.plan {
            Some(_) => None,
            None if !self.cacheable => None,
            None if self.discovered.is_empty() => Some(ShapePlan::Empty),
            None => Some(ShapePlan::Record(self.discovered)),
        };
        Collected {
            plan,
            entries: self.entries,
        }
    }
}

impl<'p> ser::SerializeStruct for RecordCollector<'p> {
    type Ok = Collected;
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.field(key, value);
        Ok(())
    }

    fn end(self) -> Result<Collected, FlattenError> {
        Ok(self.finish())
    }
}

impl<'p> ser::SerializeStructVariant for RecordCollector<'p> {
    type Ok = Collected;
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), FlattenError> {
        self.field(key, value);
        Ok(())
    }

    fn end(self) -> Result<Collected, FlattenError> {
        Ok(self.finish())
    }
}
