//! Declaration of the configuration sources of a resolution session

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Defaults
// ============================================================================

/// Default configuration file type
pub const DEFAULT_CONFIG_TYPE: &str = "json";

/// Default configuration file name, without extension
pub const DEFAULT_CONFIG_NAME: &str = "app";

/// Default configuration directory (current directory)
pub const DEFAULT_CONFIG_DIR: &str = "";

/// Default mode when nothing else decides it
pub const DEFAULT_CONFIG_MODE: &str = "prod";

/// Default mode used when running under a test harness
pub const DEFAULT_TEST_MODE_TAG: &str = "test";

// ============================================================================
// Flag tags
// ============================================================================

/// `--config-name "xxx"`
pub const CONFIG_NAME_TAG: &str = "config-name";

/// `--config-dir "xxx"`
pub const CONFIG_DIR_TAG: &str = "config-dir";

/// `--mode "xxx"`, also the store key holding the resolved mode
pub const MODE_TAG: &str = "mode";

/// `--config-type "xxx"`
pub const CONFIG_TYPE_TAG: &str = "config-type";

/// A command line flag bound into the store under its own name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Flag name used on the command line, `--<name>`
    pub name: String,
    /// Value used when the flag is not given
    pub default: String,
    /// Usage string shown in the help
    pub usage: String,
}

impl Flag {
    pub fn new(name: impl Into<String>, default: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            usage: usage.into(),
        }
    }
}

/// Remote key/value provider descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProvider {
    /// Provider kind: `consul` or `etcd`
    pub name: String,
    /// `http://ip:port` for etcd, `ip:port` for consul
    pub url: String,
    /// Path of the configuration document in the provider
    pub path: String,
    /// PEM file used as trust root; enables the encrypted transport
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

impl RemoteProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            path: path.into(),
            key_file: None,
        }
    }

    /// Use the encrypted transport with the given key file
    pub fn with_key_file(mut self, key_file: impl Into<PathBuf>) -> Self {
        self.key_file = Some(key_file.into());
        self
    }

    pub fn is_secure(&self) -> bool {
        self.key_file.is_some()
    }
}

/// Declared configuration sources
///
/// Pure data. [`ConfigSpec::normalize`] fills every empty field that has a
/// documented default; nothing else in this type performs I/O.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSpec {
    /// File type: json, toml, yaml, yml or ini
    pub config_type: String,
    /// File name without extension
    pub config_name: String,
    /// Directories searched in order for the base and overlay files
    pub config_paths: Vec<PathBuf>,
    /// Environment variables bound verbatim
    pub env_vars: Vec<String>,
    /// Flags registered and bound into the store
    pub flags: Vec<Flag>,
    /// Remote providers, read in order
    pub providers: Vec<RemoteProvider>,
    /// Mode used under a test harness
    pub test_mode_tag: String,
    /// Mode used otherwise
    pub default_config_mode: String,
}

impl ConfigSpec {
    /// An empty, normalized spec
    pub fn new() -> Self {
        Self::default().normalize()
    }

    /// Spec for a classic application: `HOME` and `PWD` from the environment,
    /// mode and file location from flags.
    pub fn default_spec() -> Self {
        Self {
            env_vars: vec!["HOME".to_string(), "PWD".to_string()],
            flags: vec![
                Flag::new(MODE_TAG, "", "Execution mode: 'dev' or 'prod' or 'test'"),
                Flag::new(CONFIG_DIR_TAG, "", "Configuration directory"),
                Flag::new(CONFIG_NAME_TAG, DEFAULT_CONFIG_NAME, "Configuration name without extension"),
                Flag::new(CONFIG_TYPE_TAG, DEFAULT_CONFIG_TYPE, "Configuration type, e.g.: json, yaml,..."),
            ],
            ..Default::default()
        }
        .normalize()
    }

    /// Fill empty fields with their defaults. Idempotent.
    pub fn normalize(mut self) -> Self {
        fill(&mut self.config_type, DEFAULT_CONFIG_TYPE);
        fill(&mut self.config_name, DEFAULT_CONFIG_NAME);
        fill(&mut self.test_mode_tag, DEFAULT_TEST_MODE_TAG);
        fill(&mut self.default_config_mode, DEFAULT_CONFIG_MODE);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_paths.push(path.into());
        self
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_vars.push(name.into());
        self
    }

    pub fn with_provider(mut self, provider: RemoteProvider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_default_mode(mut self, mode: impl Into<String>) -> Self {
        self.default_config_mode = mode.into();
        self
    }
}

fn fill(field: &mut String, default: &str) {
    if field.is_empty() {
        *field = default.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_is_normalized() {
        let spec = ConfigSpec::new();
        assert_eq!(spec.config_type, "json");
        assert_eq!(spec.config_name, "app");
        assert_eq!(spec.test_mode_tag, "test");
        assert_eq!(spec.default_config_mode, "prod");
        assert!(spec.config_paths.is_empty());
        assert!(spec.flags.is_empty());
    }

    #[test]
    fn test_normalize_keeps_explicit_values() {
        let spec = ConfigSpec {
            config_type: "yaml".to_string(),
            default_config_mode: "dev".to_string(),
            ..Default::default()
        }
        .normalize();
        assert_eq!(spec.config_type, "yaml");
        assert_eq!(spec.default_config_mode, "dev");
        assert_eq!(spec.config_name, "app");
    }

    #[test]
    fn test_default_spec_flags() {
        let spec = ConfigSpec::default_spec();
        let names: Vec<&str> = spec.flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![MODE_TAG, CONFIG_DIR_TAG, CONFIG_NAME_TAG, CONFIG_TYPE_TAG]);
        assert_eq!(spec.env_vars, vec!["HOME", "PWD"]);
        assert_eq!(spec.flags[2].default, "app");
    }

    #[test]
    fn test_remote_provider_secure() {
        let plain = RemoteProvider::new("consul", "localhost:8500", "config/app");
        assert!(!plain.is_secure());
        let secure = plain.with_key_file("/etc/app/ca.pem");
        assert!(secure.is_secure());
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            config_type in "[a-z]{0,5}",
            config_name in "[a-z]{0,5}",
            test_mode_tag in "[a-z]{0,5}",
            default_config_mode in "[a-z]{0,5}",
        ) {
            let spec = ConfigSpec {
                config_type,
                config_name,
                test_mode_tag,
                default_config_mode,
                ..Default::default()
            };
            let once = spec.normalize();
            prop_assert!(!once.config_type.is_empty());
            prop_assert!(!once.config_name.is_empty());
            prop_assert!(!once.test_mode_tag.is_empty());
            prop_assert!(!once.default_config_mode.is_empty());
            prop_assert_eq!(once.clone().normalize(), once);
        }
    }
}
