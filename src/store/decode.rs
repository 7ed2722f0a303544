//! Decoding store (sub)trees into typed records
//!
//! Decoding goes through serde. Keys in the store are lowercase, so a field
//! matches a key when its lowercase name is equal to the key; use
//! `#[serde(rename = "...")]` or `#[serde(alias = "...")]` for other spellings.
//! Missing fields are reported by serde. The exact variants also report keys
//! that no field consumed, as dotted paths.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::error::ConfigError;
use crate::store::{Store, tree};

impl Store {
    /// Decode every setting into `T`
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode("", Value::Object(self.all_settings()))
    }

    /// Decode the subtree rooted at `key` into `T`
    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        decode(key, self.subtree(key))
    }

    /// Decode every setting into `T`, failing on keys `T` does not declare
    pub fn unmarshal_exact<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        decode_exact("", Value::Object(self.all_settings()))
    }

    /// Decode the subtree rooted at `key` into `T`, failing on keys `T` does not declare
    pub fn unmarshal_key_exact<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        decode_exact(key, self.subtree(key))
    }

    fn subtree(&self, key: &str) -> Value {
        let path = tree::split_key(key);
        tree::search(&self.all_settings(), &path)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn decode<T: DeserializeOwned>(key: &str, source: Value) -> Result<T, ConfigError> {
    serde_json::from_value(source).map_err(|e| ConfigError::decode(key, e))
}

fn decode_exact<T: DeserializeOwned>(key: &str, source: Value) -> Result<T, ConfigError> {
    let mut unknown = Vec::new();
    let decoded: T = serde_ignored::deserialize(source, |path| unknown.push(path.to_string()))
        .map_err(|e| ConfigError::decode(key, e))?;

    if !unknown.is_empty() {
        unknown.sort();
        return Err(ConfigError::UnknownFields {
            key: key.to_string(),
            fields: unknown,
        });
    }
    Ok(decoded)
}
