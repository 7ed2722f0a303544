//! Per-session command line flag registry
//!
//! Flags are declared at runtime from a [`ConfigSpec`](crate::config::ConfigSpec),
//! so the registry builds a `clap::Command` incrementally instead of using the
//! derive API. Each registry parses its arguments at most once.

use std::ffi::OsString;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::config::error::ConfigError;
use crate::store::FlagValue;

/// Registry of string flags backed by clap
#[derive(Debug, Clone)]
pub struct FlagRegistry {
    command: Command,
    defaults: Vec<(String, String)>,
    matches: Option<ArgMatches>,
}

impl FlagRegistry {
    /// Create an empty registry for the program `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            command: Command::new(name.into()),
            defaults: Vec::new(),
            matches: None,
        }
    }

    /// Set the text shown by `--version`
    pub fn with_version(mut self, version: &'static str) -> Self {
        self.command = self.command.version(version);
        self
    }

    /// Register `--<name> <value>`
    ///
    /// # Panics
    ///
    /// Panics when `name` is already registered: declaring a flag twice is a
    /// programming error.
    pub fn register_string(&mut self, name: &str, default: &str, usage: &str) {
        if self.is_registered(name) {
            panic!("flag redefined: {name}");
        }
        let command = std::mem::replace(&mut self.command, Command::new(""));
        self.command = command.arg(
            Arg::new(name.to_string())
                .long(name.to_string())
                .value_name("VALUE")
                .help(usage.to_string())
                .action(ArgAction::Set),
        );
        self.defaults.push((name.to_string(), default.to_string()));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.defaults.iter().any(|(n, _)| n == name)
    }

    pub fn is_parsed(&self) -> bool {
        self.matches.is_some()
    }

    /// Parse `args`, the first item being the program name
    ///
    /// Returns [`ConfigError::FlagsAlreadyParsed`] on a second call. Unknown
    /// flags, `--help` and `--version` come back as [`ConfigError::FlagParse`];
    /// callers decide whether to exit.
    pub fn parse_from<I, T>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        if self.is_parsed() {
            return Err(ConfigError::FlagsAlreadyParsed);
        }
        let matches = self.command.try_get_matches_from_mut(args)?;
        self.matches = Some(matches);
        Ok(())
    }

    /// Look up a registered flag
    ///
    /// Before parsing, every flag reports its default only.
    pub fn lookup(&self, name: &str) -> Option<FlagValue> {
        let (_, default) = self.defaults.iter().find(|(n, _)| n == name)?;
        let value = self.matches.as_ref().and_then(|m| {
            match m.value_source(name) {
                Some(ValueSource::CommandLine) => m.get_one::<String>(name).cloned(),
                _ => None,
            }
        });
        Some(FlagValue {
            value,
            default: default.clone(),
        })
    }
}
