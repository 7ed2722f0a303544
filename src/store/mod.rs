//! Layered key/value store
//!
//! The store keeps one tree per kind of source and resolves a key by looking
//! at the layers in precedence order (highest first):
//!
//! 1. explicit [`Store::set`] calls
//! 2. flags given on the command line
//! 3. bound environment variables (non-empty)
//! 4. the configuration tier: mode overlay, then remote providers, then the
//!    base file and configuration streams
//! 5. [`Store::set_default`] values
//! 6. defaults of flags that were not given
//!
//! Keys are case-insensitive and dotted paths address nested tables
//! (`amiauth.baseurl`). A layer holding a non-table value at a prefix of a
//! path hides every lower layer for that path.

pub mod decode;
pub mod tree;

use std::collections::BTreeMap;
use std::io::Read;

use serde_json::{Map, Value};

use crate::config::error::ConfigError;
use crate::config::format::ConfigFormat;
use tree::Lookup;

/// Value of a flag as seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagValue {
    /// Value given on the command line
    pub value: Option<String>,
    /// Value used when the flag was not given
    pub default: String,
}

impl FlagValue {
    /// True when the flag was given on the command line
    pub fn changed(&self) -> bool {
        self.value.is_some()
    }
}

/// Hierarchical configuration store
#[derive(Debug, Clone, Default)]
pub struct Store {
    overrides: Map<String, Value>,
    flags: BTreeMap<String, FlagValue>,
    env: BTreeMap<String, String>,
    overlay: Map<String, Value>,
    remote: Map<String, Value>,
    config: Map<String, Value>,
    defaults: Map<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value with the highest precedence
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let path = tree::split_key(key);
        tree::insert(&mut self.overrides, &path, tree::lowercase_keys(value.into()));
    }

    /// Set a value with the lowest precedence among explicit sources
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        let path = tree::split_key(key);
        tree::insert(&mut self.defaults, &path, tree::lowercase_keys(value.into()));
    }

    /// Bind the environment variable `name` under the key `name`
    ///
    /// The variable name is used verbatim; the key is case-insensitive. The
    /// variable is read every time the key is resolved.
    pub fn bind_env(&mut self, name: &str) {
        self.env.insert(name.to_lowercase(), name.to_string());
    }

    /// Bind a parsed flag under the key `name`
    pub fn bind_flag(&mut self, name: &str, flag: FlagValue) {
        self.flags.insert(name.to_lowercase(), flag);
    }

    /// Replace the top-level keys present in `reader` in the file layer
    pub fn read_config<R: Read>(&mut self, mut reader: R, format: ConfigFormat) -> Result<(), ConfigError> {
        let content = read_to_string(&mut reader, format)?;
        let parsed = format.parse(&content, "stream")?;
        self.replace_config(parsed);
        Ok(())
    }

    /// Deep merge `reader` into the file layer
    pub fn merge_config<R: Read>(&mut self, mut reader: R, format: ConfigFormat) -> Result<(), ConfigError> {
        let content = read_to_string(&mut reader, format)?;
        let parsed = format.parse(&content, "stream")?;
        self.merge_config_map(parsed);
        Ok(())
    }

    /// Replace the top-level keys of `map` in the file layer
    fn replace_config(&mut self, map: Map<String, Value>) {
        for (key, value) in map {
            self.config.insert(key, value);
        }
    }

    /// Deep merge `map` into the file layer
    fn merge_config_map(&mut self, map: Map<String, Value>) {
        tree::deep_merge(&mut self.config, map);
    }

    /// Make `map` the whole file layer, dropping what an earlier base file
    /// or stream put there
    pub fn load_base_config(&mut self, map: Map<String, Value>) {
        self.config = map;
    }

    /// Deep merge a remote provider document into the remote layer
    pub fn merge_remote_map(&mut self, map: Map<String, Value>) {
        tree::deep_merge(&mut self.remote, map);
    }

    /// Make `map` the mode overlay layer
    pub fn load_overlay(&mut self, map: Map<String, Value>) {
        self.overlay = map;
    }

    /// Resolve `key`
    ///
    /// Tables are returned merged across every layer. Explicit JSON `null`
    /// counts as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = tree::split_key(key);
        if path.is_empty() {
            return None;
        }
        let found = self.find(&path)?;
        if found.is_object() {
            return tree::search(&self.all_settings(), &path).cloned();
        }
        Some(found)
    }

    fn find(&self, path: &[String]) -> Option<Value> {
        let layers: [&dyn Fn() -> Lookup; 8] = [
            &|| tree::lookup(&self.overrides, path),
            &|| lookup_flat(path, |key| self.flags.get(key).and_then(|f| f.value.clone())),
            &|| lookup_flat(path, |key| self.env.get(key).and_then(|name| env_value(name))),
            &|| tree::lookup(&self.overlay, path),
            &|| tree::lookup(&self.remote, path),
            &|| tree::lookup(&self.config, path),
            &|| tree::lookup(&self.defaults, path),
            &|| lookup_flat(path, |key| self.flags.get(key).map(|f| f.default.clone())),
        ];

        for layer in layers {
            match layer() {
                Lookup::Found(value) => return Some(value),
                Lookup::Shadowed => return None,
                Lookup::Missing => {}
            }
        }
        None
    }

    /// True when `key` resolves to a value, empty strings included
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other @ (Value::Array(_) | Value::Object(_))) => other.to_string(),
            Some(Value::Null) | None => String::new(),
        }
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or_default(),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or_default(),
            Some(Value::Bool(b)) => i64::from(b),
            _ => 0,
        }
    }

    pub fn get_float64(&self, key: &str) -> f64 {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            Some(Value::Bool(b)) => f64::from(u8::from(b)),
            _ => 0.0,
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "t" | "true" | "y" | "yes" | "on"
            ),
            _ => false,
        }
    }

    /// Every resolved setting merged into one tree
    pub fn all_settings(&self) -> Map<String, Value> {
        let mut merged = Map::new();

        for (key, flag) in &self.flags {
            if !flag.changed() {
                tree::deep_merge(
                    &mut merged,
                    tree::nest(&tree::split_key(key), Value::String(flag.default.clone())),
                );
            }
        }
        tree::deep_merge(&mut merged, strip_nulls(self.defaults.clone()));
        tree::deep_merge(&mut merged, strip_nulls(self.config.clone()));
        tree::deep_merge(&mut merged, strip_nulls(self.remote.clone()));
        tree::deep_merge(&mut merged, strip_nulls(self.overlay.clone()));
        for (key, name) in &self.env {
            if let Some(value) = env_value(name) {
                tree::deep_merge(&mut merged, tree::nest(&tree::split_key(key), Value::String(value)));
            }
        }
        for (key, flag) in &self.flags {
            if let Some(value) = &flag.value {
                tree::deep_merge(
                    &mut merged,
                    tree::nest(&tree::split_key(key), Value::String(value.clone())),
                );
            }
        }
        tree::deep_merge(&mut merged, strip_nulls(self.overrides.clone()));

        merged
    }
}

fn read_to_string<R: Read>(reader: &mut R, format: ConfigFormat) -> Result<String, ConfigError> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| ConfigError::parse("stream", format.as_str(), e))?;
    Ok(content)
}

/// Look `path` up in a layer keyed by flat dotted names
fn lookup_flat(path: &[String], value_of: impl Fn(&str) -> Option<String>) -> Lookup {
    for end in 1..=path.len() {
        if let Some(value) = value_of(&path[..end].join(".")) {
            return if end == path.len() {
                Lookup::Found(Value::String(value))
            } else {
                Lookup::Shadowed
            };
        }
    }
    Lookup::Missing
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn strip_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::Object(child) => (k, Value::Object(strip_nulls(child))),
            other => (k, other),
        })
        .collect()
}
