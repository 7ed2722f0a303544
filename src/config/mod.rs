//! Configuration declaration module for props-rs
//!
//! This module holds what a resolution session is asked to do:
//! - [`ConfigSpec`]: declared files, flags, environment variables, providers and modes
//! - [`ConfigFormat`]: supported file formats (JSON, TOML, YAML, INI)
//! - [`ConfigError`]: every fatal resolution error
//!
//! # Configuration Priority (lowest to highest)
//! 1. Defaults of flags that were not given
//! 2. Explicit defaults
//! 3. Base file, remote providers, mode overlay (later stages win)
//! 4. Bound environment variables
//! 5. Flags given on the command line
//! 6. Explicit `set` calls

pub mod error;
pub mod format;
pub mod spec;

// Re-export public types
pub use error::ConfigError;
pub use format::ConfigFormat;
pub use spec::{ConfigSpec, Flag, RemoteProvider};
