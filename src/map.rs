use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::value::Value;

/// Collision prefix for properties harvested from the event's property bag.
pub const DATA_PREFIX: &str = "data_";
/// Collision prefix for annotations attached to an exception.
pub const EXCEPTION_DATA_PREFIX: &str = "ex_";
/// Collision prefix for attributes declared by a layout.
pub const ATTRIBUTES_PREFIX: &str = "attributes_";
/// Collision prefix for properties declared by a layout.
pub const PROPERTIES_PREFIX: &str = "properties_";
/// Collision prefix for properties a scope inherits from its parent.
pub const NESTED_PREFIX: &str = "nested_";

/// Ordered, collision-safe property map.
///
/// A key is never overwritten once set. A second writer for the same key is
/// stored under `<prefix><key>`; if that alias is taken as well the value is
/// dropped. Dots in keys are rewritten to `_` before any lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: IndexMap<String, Value>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, falling back to `prefix + key` on collision.
    ///
    /// Returns the key the value was stored under, or `None` if it was
    /// dropped (blank key, or both the key and its alias were taken).
    pub fn insert(
        &mut self,
        key: &str,
        value: impl Into<Value>,
        prefix_on_collision: &str,
    ) -> Option<&str> {
        let key = normalize_key(key);
        if key.trim().is_empty() {
            return None;
        }

        let slot = if !self.entries.contains_key(&key) {
            key
        } else {
            let prefixed = normalize_key(&format!("{prefix_on_collision}{key}"));
            if self.entries.contains_key(&prefixed) {
                return None;
            }
            prefixed
        };

        let (index, _) = self.entries.insert_full(slot, value.into());
        self.entries.get_index(index).map(|(k, _)| k.as_str())
    }

    /// Insert every entry of `other`, in order, with the same collision prefix.
    pub fn extend_from(&mut self, other: &PropertyMap, prefix_on_collision: &str) {
        for (key, value) in other.iter() {
            self.insert(key, value.clone(), prefix_on_collision);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Render the map as a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn normalize_key(key: &str) -> String {
    key.replace('.', "_")
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter())
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_writer_wins_second_gets_alias_third_is_dropped() {
        let mut map = PropertyMap::new();
        assert_eq!(map.insert("Key", "one", DATA_PREFIX), Some("Key"));
        assert_eq!(map.insert("Key", "two", DATA_PREFIX), Some("data_Key"));
        assert_eq!(map.insert("Key", "three", DATA_PREFIX), None);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("Key"), Some(&Value::from("one")));
        assert_eq!(map.get("data_Key"), Some(&Value::from("two")));
    }

    #[test]
    fn dots_are_rewritten() {
        let mut map = PropertyMap::new();
        map.insert("http.status", 200, DATA_PREFIX);
        assert!(map.contains_key("http_status"));
        assert!(!map.contains_key("http.status"));
    }

    #[test]
    fn dotted_key_collides_with_underscored_key() {
        let mut map = PropertyMap::new();
        map.insert("a_b", 1, DATA_PREFIX);
        map.insert("a.b", 2, DATA_PREFIX);
        assert_eq!(map.get("data_a_b"), Some(&Value::Int(2)));
    }

    #[test]
    fn blank_keys_are_ignored() {
        let mut map = PropertyMap::new();
        assert_eq!(map.insert("", 1, DATA_PREFIX), None);
        assert_eq!(map.insert("   ", 1, DATA_PREFIX), None);
        assert!(map.is_empty());
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut map = PropertyMap::new();
        map.insert("b", 1, DATA_PREFIX);
        map.insert("a", 2, DATA_PREFIX);
        map.insert("b", 3, DATA_PREFIX);
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, ["b", "a", "data_b"]);
        assert_eq!(map.to_json().unwrap(), r#"{"b":1,"a":2,"data_b":3}"#);
    }

    proptest::proptest! {
        #[test]
        fn never_more_than_two_entries_per_key(key in "[A-Za-z]{1,8}", n in 1usize..10) {
            let mut map = PropertyMap::new();
            for i in 0..n {
                map.insert(&key, i as u64, EXCEPTION_DATA_PREFIX);
            }
            proptest::prop_assert_eq!(map.len(), n.min(2));
            proptest::prop_assert_eq!(map.get(&key), Some(&Value::UInt(0)));
        }
    }
}
