//! Operations on the JSON trees backing the store layers
//!
//! Keys inside a tree are always lowercase; dotted keys address nested tables.

use serde_json::{Map, Value};

/// Split a dotted key into lowercase path segments
pub fn split_key(key: &str) -> Vec<String> {
    key.to_lowercase()
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Recursively lowercase every table key of `value`
pub fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), lowercase_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Deep merge `src` into `dst`
///
/// Tables are merged key by key; any other value in `src`, arrays included,
/// replaces the value at the same path in `dst`.
pub fn deep_merge(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                dst.insert(key, value);
            }
        }
    }
}

/// Find the value at `path`
pub fn search<'a>(map: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = map.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(child) => search(child, rest),
        _ => None,
    }
}

/// Outcome of looking a path up in one layer
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Value),
    /// A non-table value sits on a prefix of the path
    Shadowed,
    Missing,
}

/// Look `path` up in `map`; `null` counts as missing
pub fn lookup(map: &Map<String, Value>, path: &[String]) -> Lookup {
    let mut current = map;
    for (depth, segment) in path.iter().enumerate() {
        match current.get(segment) {
            None | Some(Value::Null) => return Lookup::Missing,
            Some(value) if depth + 1 == path.len() => return Lookup::Found(value.clone()),
            Some(Value::Object(child)) => current = child,
            Some(_) => return Lookup::Shadowed,
        }
    }
    Lookup::Missing
}

/// Insert `value` at `path`, creating intermediate tables
///
/// A non-table value found on the way is replaced by a table.
pub fn insert(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(child) = entry else {
            return;
        };
        current = child;
    }
    current.insert(last.clone(), value);
}

/// Build a tree holding `value` at `path`
pub fn nest(path: &[String], value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    insert(&mut map, path, value);
    map
}
