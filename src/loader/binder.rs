//! Binding of flags and environment variables into the store

use std::ffi::OsString;

use tracing::debug;

use crate::config::error::ConfigError;
use crate::config::spec::ConfigSpec;
use crate::flags::FlagRegistry;
use crate::store::Store;

/// Register the declared flags, parse `args` once and bind flags and
/// environment variables into `store`
///
/// Runs before any file is read. The parse step is skipped when no flag is
/// declared so a session without flags never touches the argument list.
///
/// # Panics
///
/// Panics when the `ConfigSpec` declares the same flag twice.
pub fn bind_sources<I, T>(
    store: &mut Store,
    registry: &mut FlagRegistry,
    spec: &ConfigSpec,
    args: I,
) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    if !spec.flags.is_empty() {
        for flag in &spec.flags {
            registry.register_string(&flag.name, &flag.default, &flag.usage);
        }
        registry.parse_from(args)?;

        for flag in &spec.flags {
            if let Some(value) = registry.lookup(&flag.name) {
                debug!(flag = %flag.name, given = value.changed(), "Bound flag");
                store.bind_flag(&flag.name, value);
            }
        }
    }

    for name in &spec.env_vars {
        debug!(env = %name, "Bound environment variable");
        store.bind_env(name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::format::ConfigFormat;
    use crate::config::spec::Flag;

    fn spec() -> ConfigSpec {
        ConfigSpec::new()
            .with_flag(Flag::new("mode", "prod", "Execution mode: 'dev' or 'prod'"))
            .with_env_var("HOME")
    }

    #[test]
    fn test_flag_default_then_file_override() {
        let mut store = Store::new();
        let mut registry = FlagRegistry::new("props-rs");
        bind_sources(&mut store, &mut registry, &spec(), ["props-rs"]).unwrap();
        assert_eq!(store.get_string("mode"), "prod");

        store
            .read_config(r#"{"mode": "dev"}"#.as_bytes(), ConfigFormat::Json)
            .unwrap();
        assert_eq!(store.get_string("mode"), "dev");
    }

    #[test]
    fn test_given_flag_survives_file_read() {
        let mut store = Store::new();
        let mut registry = FlagRegistry::new("props-rs");
        bind_sources(&mut store, &mut registry, &spec(), ["props-rs", "--mode", "test"]).unwrap();

        store
            .read_config(r#"{"mode": "dev"}"#.as_bytes(), ConfigFormat::Json)
            .unwrap();
        assert_eq!(store.get_string("mode"), "test");
    }

    #[test]
    fn test_env_bound_verbatim() {
        let mut store = Store::new();
        let mut registry = FlagRegistry::new("props-rs");
        bind_sources(&mut store, &mut registry, &spec(), ["props-rs"]).unwrap();
        assert_eq!(
            store.get_string("HOME"),
            std::env::var("HOME").unwrap_or_default()
        );
    }

    #[test]
    fn test_no_flags_skips_parsing() {
        let mut store = Store::new();
        let mut registry = FlagRegistry::new("props-rs");
        let spec = ConfigSpec::new();
        bind_sources(&mut store, &mut registry, &spec, ["props-rs", "--anything"]).unwrap();
        assert!(!registry.is_parsed());
    }

    #[test]
    #[should_panic(expected = "flag redefined")]
    fn test_duplicate_flag_panics() {
        let mut store = Store::new();
        let mut registry = FlagRegistry::new("props-rs");
        let spec = spec().with_flag(Flag::new("mode", "dev", "twice"));
        let _ = bind_sources(&mut store, &mut registry, &spec, ["props-rs"]);
    }
}
