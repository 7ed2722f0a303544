//! Resolution session and property access
//!
//! [`Properties`] owns the store of one resolution session together with the
//! spec and the flag registry it was built from. Building a session runs the
//! binder, the base file loader and the remote loader; the mode overlay is
//! applied on demand with [`Properties::load_mode_properties`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::error::ConfigError;
use crate::config::format::ConfigFormat;
use crate::config::spec::{
    CONFIG_DIR_TAG, CONFIG_NAME_TAG, CONFIG_TYPE_TAG, ConfigSpec, DEFAULT_CONFIG_DIR,
    DEFAULT_CONFIG_NAME, DEFAULT_CONFIG_TYPE, RemoteProvider,
};
use crate::flags::FlagRegistry;
use crate::loader::{
    HttpFetcher, ModeResolution, ModeResolver, RemoteFetcher, RemoteReport, bind_sources,
    load_base, load_remote,
};
use crate::store::Store;

/// Location a base file was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
struct BaseLocation {
    name: String,
    config_type: String,
    paths: Vec<PathBuf>,
}

/// Builder for [`Properties`]
pub struct PropertiesBuilder {
    spec: ConfigSpec,
    args: Option<Vec<OsString>>,
    is_test_context: bool,
    fetcher: Option<Box<dyn RemoteFetcher>>,
}

impl PropertiesBuilder {
    pub fn new(spec: ConfigSpec) -> Self {
        Self {
            spec,
            args: None,
            is_test_context: false,
            fetcher: None,
        }
    }

    /// Arguments parsed for the declared flags, program name first
    ///
    /// Defaults to the process arguments.
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Declare whether the session runs under a test harness
    pub fn test_context(mut self, is_test_context: bool) -> Self {
        self.is_test_context = is_test_context;
        self
    }

    /// Transport used for remote providers, [`HttpFetcher`] by default
    pub fn fetcher(mut self, fetcher: impl RemoteFetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Bind sources, load the base file and the remote providers
    ///
    /// # Errors
    ///
    /// Returns an error if the flags cannot be parsed or the base file is
    /// declared but cannot be found, read or parsed. Remote failures are only
    /// logged.
    ///
    /// # Panics
    ///
    /// Panics when the `ConfigSpec` declares the same flag twice.
    pub fn build(self) -> Result<Properties, ConfigError> {
        let spec = self.spec.normalize();
        let mut store = Store::new();
        let mut flags = FlagRegistry::new(env!("CARGO_PKG_NAME")).with_version(crate::clap_long_version());

        let args = self
            .args
            .unwrap_or_else(|| std::env::args_os().collect());
        bind_sources(&mut store, &mut flags, &spec, args)?;

        let base = load_base(&mut store, &spec.config_name, &spec.config_type, &spec.config_paths)?
            .map(|_| BaseLocation {
                name: spec.config_name.clone(),
                config_type: spec.config_type.clone(),
                paths: spec.config_paths.clone(),
            });

        let remote = if spec.providers.is_empty() {
            RemoteReport::default()
        } else {
            let format: ConfigFormat = spec.config_type.parse()?;
            match &self.fetcher {
                Some(fetcher) => load_remote(&mut store, &spec.providers, format, fetcher.as_ref()),
                None => load_remote(&mut store, &spec.providers, format, &HttpFetcher::new()),
            }
        };

        Ok(Properties {
            store,
            spec,
            flags,
            is_test_context: self.is_test_context,
            base,
            remote,
        })
    }
}

/// Resolved configuration of one session
pub struct Properties {
    store: Store,
    spec: ConfigSpec,
    flags: FlagRegistry,
    is_test_context: bool,
    base: Option<BaseLocation>,
    remote: RemoteReport,
}

impl Properties {
    pub fn builder(spec: ConfigSpec) -> PropertiesBuilder {
        PropertiesBuilder::new(spec)
    }

    /// Build a session from `spec` using the process arguments
    pub fn new(spec: ConfigSpec) -> Result<Self, ConfigError> {
        Self::builder(spec).build()
    }

    /// Session without flags, `config-dir`, `config-name` and `config-type`
    /// set to their defaults
    pub fn simple() -> Result<Self, ConfigError> {
        let mut props = Self::builder(ConfigSpec::new()).args(Vec::<OsString>::new()).build()?;
        props.set(CONFIG_DIR_TAG, DEFAULT_CONFIG_DIR);
        props.set(CONFIG_NAME_TAG, DEFAULT_CONFIG_NAME);
        props.set(CONFIG_TYPE_TAG, DEFAULT_CONFIG_TYPE);
        Ok(props)
    }

    /// Session from [`ConfigSpec::default_spec`] parsing `args`
    pub fn default_mode<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::builder(ConfigSpec::default_spec()).args(args).build()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Load the base file and merge the mode overlay on top of it
    ///
    /// The base location is read from the store (`config-name`,
    /// `config-dir`, `config-type`, usually bound to flags), falling back to
    /// the `ConfigSpec`. The base file is loaded unless the same file was already
    /// loaded when the session was built; a failure there is fatal. The
    /// overlay follows `panic_on_mode_load`.
    pub fn load_mode_properties(&mut self, panic_on_mode_load: bool) -> Result<ModeResolution, ConfigError> {
        let location = self.effective_location();

        if self.base.as_ref() != Some(&location) {
            load_base(&mut self.store, &location.name, &location.config_type, &location.paths)?;
            self.base = Some(location.clone());
        } else {
            debug!(name = %location.name, "Base configuration already loaded");
        }

        let spec = ConfigSpec {
            config_name: location.name,
            config_type: location.config_type,
            config_paths: location.paths,
            ..self.spec.clone()
        };
        ModeResolver::new(&spec, panic_on_mode_load)
            .with_test_context(self.is_test_context)
            .resolve(&mut self.store)
    }

    fn effective_location(&self) -> BaseLocation {
        let dir = self.store.get_string(CONFIG_DIR_TAG);
        let paths = if !dir.is_empty() {
            vec![PathBuf::from(dir)]
        } else if !self.spec.config_paths.is_empty() {
            self.spec.config_paths.clone()
        } else {
            vec![PathBuf::from(DEFAULT_CONFIG_DIR)]
        };

        BaseLocation {
            name: self.get_string_or_default(CONFIG_NAME_TAG, &self.spec.config_name),
            config_type: self.get_string_or_default(CONFIG_TYPE_TAG, &self.spec.config_type),
            paths,
        }
    }

    /// Load the provider described by `remote.name`, `remote.url`,
    /// `remote.path` and optionally `remote.key`
    ///
    /// Does nothing unless name, url and path are all set. Read failures are
    /// logged and reported, never returned.
    pub fn try_load_remote_properties(&mut self, fetcher: &dyn RemoteFetcher) -> Result<RemoteReport, ConfigError> {
        let name = self.get_string("remote.name");
        let url = self.get_string("remote.url");
        let path = self.get_string("remote.path");
        let key = self.get_string("remote.key");

        if name.is_empty() || url.is_empty() || path.is_empty() {
            debug!("No remote provider configured");
            return Ok(RemoteReport::default());
        }

        let mut provider = RemoteProvider::new(name, url, path);
        if !key.is_empty() {
            provider = provider.with_key_file(key);
        }

        let format: ConfigFormat = self.get_string_or_default(CONFIG_TYPE_TAG, &self.spec.config_type).parse()?;
        let report = load_remote(&mut self.store, std::slice::from_ref(&provider), format, fetcher);
        self.remote.loaded.extend(report.loaded.iter().cloned());
        self.remote.failed.extend(report.failed.iter().cloned());
        Ok(report)
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Value of `key`, or [`ConfigError::RequiredKeyAbsent`]
    ///
    /// Present falsy values (`""`, `0`, `false`) are returned as is.
    pub fn get_or_fail(&self, key: &str) -> Result<Value, ConfigError> {
        self.store
            .get(key)
            .ok_or_else(|| ConfigError::RequiredKeyAbsent(key.to_string()))
    }

    /// String value of `key`, or `fallback` when that string is empty
    ///
    /// An absent key and a key set to `""` both yield `fallback`.
    pub fn get_string_or_default(&self, key: &str, fallback: &str) -> String {
        let value = self.store.get_string(key);
        if value.is_empty() {
            fallback.to_string()
        } else {
            value
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.store.get_string(key)
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.store.get_int(key)
    }

    pub fn get_float64(&self, key: &str) -> f64 {
        self.store.get_float64(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.store.get_bool(key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.store.is_set(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.store.set(key, value);
    }

    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        self.store.set_default(key, value);
    }

    pub fn all_settings(&self) -> Map<String, Value> {
        self.store.all_settings()
    }

    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        self.store.unmarshal()
    }

    pub fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.store.unmarshal_key(key)
    }

    pub fn unmarshal_exact<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        self.store.unmarshal_exact()
    }

    pub fn unmarshal_key_exact<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        self.store.unmarshal_key_exact(key)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn spec(&self) -> &ConfigSpec {
        &self.spec
    }

    pub fn flags(&self) -> &FlagRegistry {
        &self.flags
    }

    /// Remote providers loaded or skipped so far
    pub fn remote_report(&self) -> &RemoteReport {
        &self.remote
    }
}

/// Default session with the mode overlay applied
///
/// `default_dir` is used when `--config-dir` is not given. A missing base file
/// or overlay is fatal.
pub fn load_default_mode_properties<I, T>(default_dir: impl AsRef<Path>, args: I) -> Result<Properties, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut props = Properties::default_mode(args)?;
    props.set_default(CONFIG_DIR_TAG, default_dir.as_ref().display().to_string());
    props.load_mode_properties(true)?;
    Ok(props)
}
