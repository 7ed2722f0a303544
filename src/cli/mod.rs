//! CLI module for props-rs
//!
//! Resolves the configuration of the current directory (or `--config-dir`)
//! the way an application would, then prints it:
//!
//! ```text
//! props-rs --mode dev --config-dir ./conf
//! props-rs --print app.url
//! props-rs --mode staging --optional-mode true
//! ```
//!
//! The resolved mode goes to stderr, the requested value (or every setting)
//! to stdout as pretty JSON.

use std::ffi::OsString;

use anyhow::Context;
use tracing::info;

use crate::config::error::ConfigError;
use crate::config::spec::{ConfigSpec, Flag};
use crate::loader::{HttpFetcher, ModeResolution, RemoteFetcher};
use crate::logger::{LoggerConfig, bootstrap_subscriber, init_logger};
use crate::properties::Properties;

/// Key printed instead of every setting
pub const PRINT_TAG: &str = "print";
/// Keep the base configuration when the mode file cannot be read
pub const OPTIONAL_MODE_TAG: &str = "optional-mode";

/// Default spec plus the flags of the tool
pub fn cli_spec() -> ConfigSpec {
    ConfigSpec::default_spec()
        .with_flag(Flag::new(PRINT_TAG, "", "Key to print, every setting when empty"))
        .with_flag(Flag::new(
            OPTIONAL_MODE_TAG,
            "false",
            "Keep the base configuration when the mode file cannot be read",
        ))
}

/// Build the session and apply the mode overlay and the `remote.*` provider
pub fn resolve<I, T>(args: I) -> Result<(Properties, ModeResolution), ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    resolve_with(args, &HttpFetcher::new())
}

/// [`resolve`] reading the `remote.*` provider through `fetcher`
///
/// The provider may be declared by the mode file. Its values land in the
/// remote layer, below the mode overlay.
pub fn resolve_with<I, T>(args: I, fetcher: &dyn RemoteFetcher) -> Result<(Properties, ModeResolution), ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut props = Properties::builder(cli_spec()).args(args).build()?;
    let panic_on_mode_load = !props.get_bool(OPTIONAL_MODE_TAG);
    let resolution = props.load_mode_properties(panic_on_mode_load)?;
    props.try_load_remote_properties(fetcher)?;
    Ok((props, resolution))
}

/// Pretty JSON of `key`, or of every setting when `key` is empty
pub fn render(props: &Properties, key: &str) -> Result<String, ConfigError> {
    let value = if key.is_empty() {
        serde_json::Value::Object(props.all_settings())
    } else {
        props.get_or_fail(key)?
    };
    serde_json::to_string_pretty(&value).map_err(|e| ConfigError::decode(key, e))
}

/// Entry point of the binary
pub fn run<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    // Resolution logs go to stderr until the configured logger is installed
    let resolved = tracing::subscriber::with_default(bootstrap_subscriber(), || resolve(args));
    let (props, resolution) = match resolved {
        Ok(resolved) => resolved,
        // --help, --version and usage errors
        Err(ConfigError::FlagParse(e)) => e.exit(),
        Err(e) => return Err(e).context("Failed to resolve configuration"),
    };

    let logger_config = LoggerConfig::from_properties(&props)?;
    init_logger(logger_config).context("Failed to initialize logger")?;
    info!(
        version = crate::pkg_version(),
        mode = %resolution.mode,
        merged = resolution.is_merged(),
        "Configuration resolved"
    );

    eprintln!("mode: {}", resolution.mode);
    println!("{}", render(&props, &props.get_string(PRINT_TAG))?);
    Ok(())
}
