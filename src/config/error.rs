//! Configuration error types

use thiserror::Error;

/// Configuration error types
///
/// Every variant returned from the resolution pipeline is fatal for the caller.
/// Fail-soft conditions (remote providers, optional mode overlays) are logged
/// and never surface as an `Err`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base configuration file declared but not found in any search directory
    #[error("Configuration file {file} not found in [{searched}]")]
    ConfigurationMissing {
        /// File name with extension, e.g. `app.json`
        file: String,
        /// Comma separated list of searched directories
        searched: String,
    },

    /// Base configuration file exists but cannot be read
    #[error("Cannot read configuration file {path}: {source}")]
    ConfigurationUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration content
    #[error("Failed to parse {origin} as {config_type}: {message}")]
    Parse {
        origin: String,
        config_type: String,
        message: String,
    },

    /// Configuration type has no parser
    #[error("Unsupported configuration type '{0}'. Valid types are: json, toml, yaml, yml, ini")]
    UnsupportedConfigType(String),

    /// No mode could be derived from the store, the test context or the default
    #[error("Mode is not set: no '{key}' value, no test context and no default mode")]
    ModeUndeterminable { key: String },

    /// Mode cannot name an overlay file in the search directories
    #[error("Invalid mode '{mode}': a mode must not contain path separators")]
    InvalidMode { mode: String },

    /// Mode overlay file missing or corrupt
    #[error("Fatal error reading mode file {file} for mode '{mode}': {reason}")]
    ModeOverlayFailure {
        file: String,
        mode: String,
        reason: String,
    },

    /// Required property asserted by the caller is absent
    #[error("Required property {0} is not found")]
    RequiredKeyAbsent(String),

    /// Command line flags could not be parsed
    #[error(transparent)]
    FlagParse(#[from] clap::Error),

    /// The flag registry of this session has already parsed its arguments
    #[error("Flags have already been parsed for this session")]
    FlagsAlreadyParsed,

    /// A (sub)tree could not be decoded into the requested type
    #[error("Failed to decode '{key}': {message}")]
    Decode { key: String, message: String },

    /// Exact decoding found keys with no corresponding field
    #[error("Unknown fields under '{key}': {}", fields.join(", "))]
    UnknownFields { key: String, fields: Vec<String> },
}

impl ConfigError {
    /// Create a new configuration missing error
    pub fn missing<S: Into<String>>(file: S, searched: S) -> Self {
        ConfigError::ConfigurationMissing {
            file: file.into(),
            searched: searched.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(origin: S, config_type: S, message: impl ToString) -> Self {
        ConfigError::Parse {
            origin: origin.into(),
            config_type: config_type.into(),
            message: message.to_string(),
        }
    }

    /// Create a new mode overlay failure
    pub fn overlay<S: Into<String>>(file: S, mode: S, reason: impl ToString) -> Self {
        ConfigError::ModeOverlayFailure {
            file: file.into(),
            mode: mode.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(key: S, message: impl ToString) -> Self {
        ConfigError::Decode {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_message_names_file_and_dirs() {
        let err = ConfigError::missing("app.json", "./resx, /etc/app");
        let msg = err.to_string();
        assert!(msg.contains("app.json"));
        assert!(msg.contains("./resx, /etc/app"));
    }

    #[test]
    fn test_overlay_message_names_mode() {
        let err = ConfigError::overlay("resx/dev.app.json", "dev", "No such file");
        let msg = err.to_string();
        assert!(msg.contains("resx/dev.app.json"));
        assert!(msg.contains("'dev'"));
    }

    #[test]
    fn test_unknown_fields_are_listed() {
        let err = ConfigError::UnknownFields {
            key: "amiauth".to_string(),
            fields: vec!["eee".to_string(), "plus".to_string()],
        };
        assert_eq!(err.to_string(), "Unknown fields under 'amiauth': eee, plus");
    }
}
