//! Environment overrides and `.env` file support.

use std::{collections::HashMap, fs, path::Path};

use tracing::debug;

use crate::error::Result;

/// Keys recognised as overrides, in the order they are documented.
pub const OVERRIDE_KEYS: &[&str] = &[
    "GHMPKG_SOURCE_ORGANIZATION",
    "GHMPKG_TARGET_ORGANIZATION",
    "GHMPKG_SOURCE_TOKEN",
    "GHMPKG_TARGET_TOKEN",
    "GHMPKG_SOURCE_HOSTNAME",
    "GHMPKG_TARGET_HOSTNAME",
    "GHMPKG_PACKAGE_TYPES",
    "GHMPKG_WORK_DIR",
    "GHMPKG_RETRY_MAX",
    "GHMPKG_RETRY_DELAY",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
];

/// Parses `KEY=VALUE` lines from a `.env` style document.
///
/// Blank lines and `#` comments are ignored, an optional `export ` prefix is stripped and
/// values wrapped in single or double quotes are unquoted.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);

        vars.insert(key.to_string(), value.to_string());
    }

    vars
}

/// Reads a `.env` file. A missing file yields no variables.
pub fn load_dotenv<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "loaded .env file");
            Ok(parse_dotenv(&content))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(err) => Err(err.into()),
    }
}

/// Builds the override layer from `.env` values and the process environment.
///
/// Process environment variables win over `.env` entries. Only [`OVERRIDE_KEYS`] are kept.
pub fn collect_overrides<I>(dotenv: HashMap<String, String>, process_env: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides: HashMap<String, String> = dotenv
        .into_iter()
        .filter(|(k, _)| OVERRIDE_KEYS.contains(&k.as_str()))
        .collect();

    for (key, value) in process_env {
        if OVERRIDE_KEYS.contains(&key.as_str()) && !value.is_empty() {
            overrides.insert(key, value);
        }
    }

    overrides
}
