//! Base configuration file loading

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::error::ConfigError;
use crate::config::format::ConfigFormat;
use crate::store::Store;

/// A configuration file found on disk
#[derive(Debug)]
pub struct FoundFile {
    pub path: PathBuf,
    pub content: Vec<u8>,
}

/// Read the first `dir/file_name` that exists, trying `dirs` in order
///
/// A missing candidate moves on to the next directory; any other I/O error
/// stops the search.
pub fn read_first(file_name: &str, dirs: &[PathBuf]) -> Result<Option<FoundFile>, ConfigError> {
    for dir in dirs {
        let path = dir.join(file_name);
        match std::fs::read(&path) {
            Ok(content) => return Ok(Some(FoundFile { path, content })),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Configuration candidate not found");
            }
            Err(e) => {
                return Err(ConfigError::ConfigurationUnreadable {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        }
    }
    Ok(None)
}

/// `name.type`
pub fn file_name(name: &str, config_type: &str) -> String {
    format!("{name}.{config_type}")
}

/// Comma separated directory list for error messages
pub fn display_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| display_dir(d))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_dir(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        ".".to_string()
    } else {
        dir.display().to_string()
    }
}

/// Load the base configuration file `name.type` into `store`
///
/// No-op when `paths` is empty. Otherwise the first readable candidate wins
/// and replaces the top-level keys it declares; a file found nowhere, an
/// unreadable file or a parse error is fatal. The format comes from
/// `config_type`, the extension is never inspected.
pub fn load_base(
    store: &mut Store,
    name: &str,
    config_type: &str,
    paths: &[PathBuf],
) -> Result<Option<PathBuf>, ConfigError> {
    if paths.is_empty() {
        debug!(name, config_type, "No configuration path declared, skipping base file");
        return Ok(None);
    }

    let format: ConfigFormat = config_type.parse()?;
    let file = file_name(name, config_type);

    let found = read_first(&file, paths)?
        .ok_or_else(|| ConfigError::missing(file.clone(), display_dirs(paths)))?;

    let origin = found.path.display().to_string();
    let parsed = format.parse_bytes(&found.content, &origin)?;
    store.load_base_config(parsed);

    info!(path = %origin, config_type, "Loaded configuration file");
    Ok(Some(found.path))
}
