//! props-rs Library
//!
//! Layered, mode-aware configuration resolution. A [`Properties`] session
//! merges explicit overrides, command-line flags, environment variables,
//! configuration files, remote key/value providers and defaults into one
//! queryable store, then overlays the file of the active mode
//! (`prod.app.json` on top of `app.json`).

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod flags;
pub mod loader;
pub mod logger;
pub mod properties;
pub mod store;

pub use crate::config::{ConfigError, ConfigFormat, ConfigSpec, Flag, RemoteProvider};
pub use properties::{Properties, PropertiesBuilder, load_default_mode_properties};
pub use store::Store;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
