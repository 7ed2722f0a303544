//! Mode resolution and mode overlay merging
//!
//! A resolution pass goes through three states:
//!
//! ```text
//! Unresolved --(mode found)--> ModeDetermined --(overlay merged)--> Merged
//! ```
//!
//! `ModeDetermined` is also a terminal state when the overlay cannot be read
//! and the resolver runs with the soft failure policy.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::error::ConfigError;
use crate::config::format::ConfigFormat;
use crate::config::spec::{ConfigSpec, MODE_TAG};
use crate::loader::file::{display_dirs, file_name, read_first};
use crate::store::Store;

/// Terminal state of a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    /// Mode known, overlay not applied
    ModeDetermined,
    /// Mode known and overlay merged
    Merged,
}

/// Result of a resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeResolution {
    /// Mode in effect, also written to the store under `mode`
    pub mode: String,
    pub state: ModeState,
    /// Overlay file merged into the store
    pub overlay: Option<PathBuf>,
}

impl ModeResolution {
    pub fn is_merged(&self) -> bool {
        self.state == ModeState::Merged
    }
}

/// Resolves the active mode and merges its overlay file
#[derive(Debug, Clone)]
pub struct ModeResolver<'a> {
    spec: &'a ConfigSpec,
    is_test_context: bool,
    panic_on_mode_load: bool,
}

impl<'a> ModeResolver<'a> {
    /// `panic_on_mode_load` makes an unreadable overlay fatal; otherwise it is
    /// logged and the base configuration is kept.
    pub fn new(spec: &'a ConfigSpec, panic_on_mode_load: bool) -> Self {
        Self {
            spec,
            is_test_context: false,
            panic_on_mode_load,
        }
    }

    /// Declare whether the process runs under a test harness
    pub fn with_test_context(mut self, is_test_context: bool) -> Self {
        self.is_test_context = is_test_context;
        self
    }

    /// Determine the mode and write it back to the store
    pub fn determine_mode(&self, store: &mut Store) -> Result<String, ConfigError> {
        let mut mode = store.get_string(MODE_TAG);
        if mode.is_empty() {
            mode = if self.is_test_context {
                self.spec.test_mode_tag.clone()
            } else {
                self.spec.default_config_mode.clone()
            };
        }
        if mode.is_empty() {
            return Err(ConfigError::ModeUndeterminable {
                key: MODE_TAG.to_string(),
            });
        }

        if mode.chars().any(std::path::is_separator) {
            return Err(ConfigError::InvalidMode { mode });
        }

        store.set(MODE_TAG, mode.clone());
        Ok(mode)
    }

    /// Run a full pass: determine the mode, then merge `mode.name.type`
    ///
    /// The overlay is searched along `config_paths`, or in the
    /// current directory when none is declared. Whether the base file was
    /// loaded is not checked.
    pub fn resolve(&self, store: &mut Store) -> Result<ModeResolution, ConfigError> {
        let mode = self.determine_mode(store)?;
        info!(mode = %mode, test_context = self.is_test_context, "Resolved configuration mode");

        let overlay_name = file_name(
            &format!("{}.{}", mode, self.spec.config_name),
            &self.spec.config_type,
        );
        let dirs = if self.spec.config_paths.is_empty() {
            vec![PathBuf::new()]
        } else {
            self.spec.config_paths.clone()
        };

        match self.merge_overlay(store, &overlay_name, &dirs) {
            Ok(path) => {
                info!(mode = %mode, path = %path.display(), "Merged mode configuration");
                Ok(ModeResolution {
                    mode,
                    state: ModeState::Merged,
                    overlay: Some(path),
                })
            }
            Err(reason) => {
                let err = ConfigError::overlay(
                    format!("{} in [{}]", overlay_name, display_dirs(&dirs)),
                    mode.clone(),
                    reason,
                );
                if self.panic_on_mode_load {
                    return Err(err);
                }
                warn!(mode = %mode, error = %err, "Error reading mode file, keeping base configuration");
                Ok(ModeResolution {
                    mode,
                    state: ModeState::ModeDetermined,
                    overlay: None,
                })
            }
        }
    }

    fn merge_overlay(
        &self,
        store: &mut Store,
        overlay_name: &str,
        dirs: &[PathBuf],
    ) -> Result<PathBuf, ConfigError> {
        let format: ConfigFormat = self.spec.config_type.parse()?;
        let found = read_first(overlay_name, dirs)?.ok_or_else(|| {
            ConfigError::missing(overlay_name.to_string(), display_dirs(dirs))
        })?;
        let parsed = format.parse_bytes(&found.content, &found.path.display().to_string())?;
        store.load_overlay(parsed);
        Ok(found.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::file::load_base;
    use std::fs;
    use tempfile::TempDir;

    fn setup_config_dir(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).expect("Failed to write config file");
        }
        temp_dir
    }

    fn spec_for(dir: &TempDir) -> ConfigSpec {
        ConfigSpec::new().with_config_path(dir.path())
    }

    #[test]
    fn test_default_mode_without_test_context() {
        let spec = ConfigSpec::new();
        let mut store = Store::new();
        let mode = ModeResolver::new(&spec, false).determine_mode(&mut store).unwrap();
        assert_eq!(mode, "prod");
        assert_eq!(store.get_string(MODE_TAG), "prod");
    }

    #[test]
    fn test_test_context_wins_over_default_mode() {
        let spec = ConfigSpec::new().with_default_mode("dev");
        let mut store = Store::new();
        let mode = ModeResolver::new(&spec, false)
            .with_test_context(true)
            .determine_mode(&mut store)
            .unwrap();
        assert_eq!(mode, "test");
    }

    #[test]
    fn test_store_mode_wins() {
        let spec = ConfigSpec::new();
        let mut store = Store::new();
        store.set(MODE_TAG, "staging");
        let mode = ModeResolver::new(&spec, false)
            .with_test_context(true)
            .determine_mode(&mut store)
            .unwrap();
        assert_eq!(mode, "staging");
    }

    #[test]
    fn test_empty_mode_is_fatal() {
        let spec = ConfigSpec {
            default_config_mode: String::new(),
            ..ConfigSpec::new()
        };
        let mut store = Store::new();
        assert!(matches!(
            ModeResolver::new(&spec, false).resolve(&mut store),
            Err(ConfigError::ModeUndeterminable { .. })
        ));
    }

    #[test]
    fn test_mode_with_path_separator_is_rejected() {
        let dir = setup_config_dir(&[("app.json", r#"{"app": {"url": "http://base"}}"#)]);
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("x.app.json"), r#"{"app": {"url": "http://sub"}}"#).unwrap();
        let spec = spec_for(&dir);

        for mode in ["sub/x", "../x"] {
            let mut store = Store::new();
            store.set(MODE_TAG, mode);
            // Rejected even with the soft failure policy
            let err = ModeResolver::new(&spec, false).resolve(&mut store).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidMode { mode: ref m } if m == mode));
            assert!(!store.is_set("app.url"));
        }
    }

    #[test]
    fn test_overlay_merged_on_base() {
        let dir = setup_config_dir(&[
            ("app.json", r#"{"app": {"url": "http://base", "name": "base"}}"#),
            ("test.app.json", r#"{"app": {"url": "http://test"}}"#),
        ]);
        let spec = spec_for(&dir).with_default_mode("test");
        let mut store = Store::new();
        load_base(&mut store, &spec.config_name, &spec.config_type, &spec.config_paths).unwrap();

        let resolution = ModeResolver::new(&spec, true).resolve(&mut store).unwrap();

        assert_eq!(resolution.mode, "test");
        assert!(resolution.is_merged());
        assert_eq!(resolution.overlay, Some(dir.path().join("test.app.json")));
        assert_eq!(store.get_string("app.url"), "http://test");
        assert_eq!(store.get_string("app.name"), "base");
    }

    #[test]
    fn test_missing_overlay_soft() {
        let dir = setup_config_dir(&[("app.json", r#"{"app": {"url": "http://base"}}"#)]);
        let spec = spec_for(&dir).with_default_mode("testNotExistMode");
        let mut store = Store::new();
        load_base(&mut store, &spec.config_name, &spec.config_type, &spec.config_paths).unwrap();

        let resolution = ModeResolver::new(&spec, false).resolve(&mut store).unwrap();

        assert_eq!(resolution.state, ModeState::ModeDetermined);
        assert_eq!(resolution.mode, "testNotExistMode");
        assert!(resolution.overlay.is_none());
        assert_eq!(store.get_string("app.url"), "http://base");
    }

    #[test]
    fn test_missing_overlay_fatal() {
        let dir = setup_config_dir(&[("app.json", r#"{"app": {"url": "http://base"}}"#)]);
        let spec = spec_for(&dir).with_default_mode("testNotExistMode");
        let mut store = Store::new();

        let err = ModeResolver::new(&spec, true).resolve(&mut store).unwrap_err();
        match err {
            ConfigError::ModeOverlayFailure { file, mode, .. } => {
                assert!(file.contains("testNotExistMode.app.json"));
                assert_eq!(mode, "testNotExistMode");
            }
            other => panic!("Expected ModeOverlayFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_overlay_follows_policy() {
        let dir = setup_config_dir(&[
            ("app.json", r#"{"app": {"url": "http://base"}}"#),
            ("dev.app.json", r#"{"app": "#),
        ]);
        let spec = spec_for(&dir).with_default_mode("dev");

        let mut store = Store::new();
        assert!(ModeResolver::new(&spec, true).resolve(&mut store).is_err());

        let mut store = Store::new();
        load_base(&mut store, &spec.config_name, &spec.config_type, &spec.config_paths).unwrap();
        let resolution = ModeResolver::new(&spec, false).resolve(&mut store).unwrap();
        assert_eq!(resolution.state, ModeState::ModeDetermined);
        assert_eq!(store.get_string("app.url"), "http://base");
    }

    #[test]
    fn test_overlay_without_base() {
        let dir = setup_config_dir(&[("prod.app.json", r#"{"only": "overlay"}"#)]);
        let spec = spec_for(&dir);
        let mut store = Store::new();
        let resolution = ModeResolver::new(&spec, true).resolve(&mut store).unwrap();
        assert!(resolution.is_merged());
        assert_eq!(store.get_string("only"), "overlay");
    }

    #[test]
    fn test_overlay_arrays_replaced() {
        let dir = setup_config_dir(&[
            ("app.json", r#"{"hosts": ["a", "b", "c"]}"#),
            ("prod.app.json", r#"{"hosts": ["z"]}"#),
        ]);
        let spec = spec_for(&dir);
        let mut store = Store::new();
        load_base(&mut store, &spec.config_name, &spec.config_type, &spec.config_paths).unwrap();
        ModeResolver::new(&spec, true).resolve(&mut store).unwrap();
        assert_eq!(store.get("hosts"), Some(serde_json::json!(["z"])));
    }
}
