//! Configuration file formats
//!
//! Parsing is delegated to the `config` crate; this module only maps the
//! declared type tag to a [`FileFormat`] and turns the parsed document into a
//! JSON tree with lowercase keys.

use std::str::FromStr;

use config::{Config, File, FileFormat};
use serde_json::{Map, Value};

use crate::config::error::ConfigError;
use crate::store::tree;

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
    Ini,
}

impl ConfigFormat {
    fn file_format(self) -> FileFormat {
        match self {
            ConfigFormat::Json => FileFormat::Json,
            ConfigFormat::Toml => FileFormat::Toml,
            ConfigFormat::Yaml => FileFormat::Yaml,
            ConfigFormat::Ini => FileFormat::Ini,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Ini => "ini",
        }
    }

    /// Parse `content` into a tree with lowercase keys
    ///
    /// `origin` names the content (file path, provider) in error messages.
    pub fn parse(self, content: &str, origin: &str) -> Result<Map<String, Value>, ConfigError> {
        let parsed: Value = Config::builder()
            .add_source(File::from_str(content, self.file_format()))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::parse(origin, self.as_str(), e))?;

        match tree::lowercase_keys(parsed) {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(ConfigError::parse(
                origin.to_string(),
                self.as_str().to_string(),
                format!("expected a table at the top level, got {}", other),
            )),
        }
    }

    /// Same as [`ConfigFormat::parse`] for raw bytes
    pub fn parse_bytes(self, content: &[u8], origin: &str) -> Result<Map<String, Value>, ConfigError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| ConfigError::parse(origin, self.as_str(), e))?;
        self.parse(text, origin)
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "ini" => Ok(ConfigFormat::Ini),
            _ => Err(ConfigError::UnsupportedConfigType(s.to_string())),
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
        assert_eq!("YAML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!("toml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
        assert!(matches!(
            "properties".parse::<ConfigFormat>(),
            Err(ConfigError::UnsupportedConfigType(_))
        ));
    }

    #[test]
    fn test_parse_json_lowercases_keys() {
        let map = ConfigFormat::Json
            .parse(r#"{"App": {"baseUrl": "http://tapp.me", "val": {"t1": 3}}}"#, "inline")
            .unwrap();
        assert_eq!(
            Value::Object(map),
            json!({"app": {"baseurl": "http://tapp.me", "val": {"t1": 3}}})
        );
    }

    #[test]
    fn test_parse_toml() {
        let map = ConfigFormat::Toml
            .parse("[server]\nhost = \"0.0.0.0\"\nport = 8080\n", "inline")
            .unwrap();
        assert_eq!(map["server"]["host"], json!("0.0.0.0"));
        assert_eq!(map["server"]["port"], json!(8080));
    }

    #[test]
    fn test_parse_yaml_keeps_arrays() {
        let map = ConfigFormat::Yaml
            .parse("batter:\n  - Regular\n  - Chocolate\n", "inline")
            .unwrap();
        assert_eq!(map["batter"], json!(["Regular", "Chocolate"]));
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = ConfigFormat::Json
            .parse("{ \"id\": ", "resx/appbuggy.json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("resx/appbuggy.json"));
    }
}
