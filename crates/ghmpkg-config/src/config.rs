use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{LazyLock, RwLock},
    time::Duration,
};

use ghmpkg_utils::{
    path::{resolve_path, xdg_config_home},
    time::parse_duration,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Package types the migration tool knows how to move, in processing order.
pub const SUPPORTED_PACKAGE_TYPES: &[&str] = &["maven", "npm", "container", "rubygems", "nuget"];

/// Order in which the catalog lists the versions of a package.
///
/// The GitHub packages API returns versions newest first, which is what `export` writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Application's configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Organization packages are migrated from.
    pub source_organization: Option<String>,

    /// Organization packages are migrated to.
    pub target_organization: Option<String>,

    /// Token with read access to the source organization's packages.
    pub source_token: Option<String>,

    /// Token with write access to the target organization's packages.
    pub target_token: Option<String>,

    /// Hostname of the source GitHub instance.
    /// Default: github.com
    pub source_hostname: Option<String>,

    /// Hostname of the target GitHub instance.
    /// Default: github.com
    pub target_hostname: Option<String>,

    /// Package types to migrate.
    /// Default: ["maven", "npm", "container", "rubygems", "nuget"]
    pub package_types: Option<Vec<String>>,

    /// Directory holding exported catalogs and downloaded packages.
    /// Default: migration-packages
    pub work_dir: Option<String>,

    /// Maximum number of concurrent file downloads within a version.
    /// Default: 5
    pub parallel_limit: Option<usize>,

    /// Maximum number of concurrent Maven file uploads within a version.
    /// Default: 5
    pub maven_upload_concurrency: Option<usize>,

    /// Maximum retry attempts for HTTP calls.
    /// Default: 3
    pub retry_max: Option<u32>,

    /// Base delay between retries, doubled on every attempt.
    /// Default: 1s
    pub retry_delay: Option<String>,

    /// Requests admitted per minute before pausing.
    /// Default: 5000
    pub rate_limit_per_minute: Option<u32>,

    /// Requests admitted per hour before pausing.
    /// Default: 10000
    pub rate_limit_per_hour: Option<u32>,

    /// Container registry host.
    /// Default: ghcr.io
    pub container_registry: Option<String>,

    /// Path to the NuGet push tool.
    /// Default: ./tool/gpr
    pub gpr_path: Option<String>,

    /// Order in which exported catalogs list versions.
    /// Default: newest-first
    pub catalog_order: Option<VersionOrder>,

    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
}

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("GHMPKG_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("ghmpkg").join("config.toml"),
    })
});

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            source_hostname: Some("github.com".into()),
            target_hostname: Some("github.com".into()),
            package_types: Some(
                SUPPORTED_PACKAGE_TYPES
                    .iter()
                    .map(|t| t.to_string())
                    .collect(),
            ),
            work_dir: Some("migration-packages".into()),
            parallel_limit: Some(5),
            maven_upload_concurrency: Some(5),
            retry_max: Some(3),
            retry_delay: Some("1s".into()),
            rate_limit_per_minute: Some(5000),
            rate_limit_per_hour: Some(10000),
            container_registry: Some("ghcr.io".into()),
            gpr_path: Some("./tool/gpr".into()),
            catalog_order: Some(VersionOrder::NewestFirst),
            ..Default::default()
        }
    }

    /// Creates a new configuration by loading it from the configuration file.
    /// If the configuration file is not found, it uses the default configuration.
    ///
    /// Overrides are applied before defaults are resolved.
    pub fn new(overrides: &HashMap<String, String>) -> Result<Self> {
        let config_path = CONFIG_PATH
            .read()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| xdg_config_home().join("ghmpkg").join("config.toml"));

        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => {
                debug!(path = %config_path.display(), "loaded config file");
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.apply_overrides(overrides);
        config.resolve()?;

        Ok(config)
    }

    /// Applies `GHMPKG_*` and proxy overrides on top of file values.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) {
        for (key, value) in overrides {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = value.to_string();
            match key.as_str() {
                "GHMPKG_SOURCE_ORGANIZATION" => self.source_organization = Some(value),
                "GHMPKG_TARGET_ORGANIZATION" => self.target_organization = Some(value),
                "GHMPKG_SOURCE_TOKEN" => self.source_token = Some(value),
                "GHMPKG_TARGET_TOKEN" => self.target_token = Some(value),
                "GHMPKG_SOURCE_HOSTNAME" => self.source_hostname = Some(value),
                "GHMPKG_TARGET_HOSTNAME" => self.target_hostname = Some(value),
                "GHMPKG_PACKAGE_TYPES" => {
                    self.package_types = Some(
                        value
                            .split(',')
                            .map(|t| t.trim().to_lowercase())
                            .filter(|t| !t.is_empty())
                            .collect(),
                    )
                }
                "GHMPKG_WORK_DIR" => self.work_dir = Some(value),
                "GHMPKG_RETRY_MAX" => {
                    if let Ok(n) = value.parse() {
                        self.retry_max = Some(n);
                    }
                }
                "GHMPKG_RETRY_DELAY" => self.retry_delay = Some(value),
                "HTTP_PROXY" => self.http_proxy = Some(value),
                "HTTPS_PROXY" => self.https_proxy = Some(value),
                "NO_PROXY" => self.no_proxy = Some(value),
                _ => {}
            }
        }
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.source_hostname.get_or_insert_with(|| "github.com".into());
        self.target_hostname.get_or_insert_with(|| "github.com".into());
        self.work_dir.get_or_insert_with(|| "migration-packages".into());
        self.retry_max.get_or_insert(3);
        self.retry_delay.get_or_insert_with(|| "1s".into());
        self.rate_limit_per_minute.get_or_insert(5000);
        self.rate_limit_per_hour.get_or_insert(10000);
        self.container_registry.get_or_insert_with(|| "ghcr.io".into());
        self.gpr_path.get_or_insert_with(|| "./tool/gpr".into());
        self.catalog_order.get_or_insert(VersionOrder::NewestFirst);

        let package_types = self.package_types.get_or_insert_with(Vec::new);
        if package_types.is_empty() {
            package_types.extend(SUPPORTED_PACKAGE_TYPES.iter().map(|t| t.to_string()));
        }
        for package_type in package_types.iter_mut() {
            *package_type = package_type.trim().to_lowercase();
            if !SUPPORTED_PACKAGE_TYPES.contains(&package_type.as_str()) {
                return Err(ConfigError::UnsupportedPackageType(package_type.clone()));
            }
        }

        for (key, value) in [
            ("parallel_limit", self.parallel_limit.get_or_insert(5)),
            (
                "maven_upload_concurrency",
                self.maven_upload_concurrency.get_or_insert(5),
            ),
        ] {
            if *value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: "must be greater than zero".into(),
                });
            }
        }

        self.retry_delay()?;

        Ok(())
    }

    pub fn source_organization(&self) -> Result<&str> {
        non_empty(&self.source_organization)
            .ok_or(ConfigError::MissingValue("source_organization"))
    }

    pub fn target_organization(&self) -> Result<&str> {
        non_empty(&self.target_organization)
            .ok_or(ConfigError::MissingValue("target_organization"))
    }

    pub fn source_token(&self) -> Result<&str> {
        non_empty(&self.source_token).ok_or(ConfigError::MissingValue("source_token"))
    }

    pub fn target_token(&self) -> Result<&str> {
        non_empty(&self.target_token).ok_or(ConfigError::MissingValue("target_token"))
    }

    pub fn source_hostname(&self) -> &str {
        non_empty(&self.source_hostname).unwrap_or("github.com")
    }

    pub fn target_hostname(&self) -> &str {
        non_empty(&self.target_hostname).unwrap_or("github.com")
    }

    pub fn package_types(&self) -> Vec<String> {
        match &self.package_types {
            Some(types) if !types.is_empty() => types.clone(),
            _ => SUPPORTED_PACKAGE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    pub fn work_dir(&self) -> Result<PathBuf> {
        let dir = non_empty(&self.work_dir).unwrap_or("migration-packages");
        Ok(resolve_path(dir)?)
    }

    pub fn parallel_limit(&self) -> usize {
        self.parallel_limit.unwrap_or(5).max(1)
    }

    pub fn maven_upload_concurrency(&self) -> usize {
        self.maven_upload_concurrency.unwrap_or(5).max(1)
    }

    pub fn retry_max(&self) -> u32 {
        self.retry_max.unwrap_or(3)
    }

    pub fn retry_delay(&self) -> Result<Duration> {
        let value = non_empty(&self.retry_delay).unwrap_or("1s");
        parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
            key: "retry_delay",
            value: value.to_string(),
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute.unwrap_or(5000)
    }

    pub fn rate_limit_per_hour(&self) -> u32 {
        self.rate_limit_per_hour.unwrap_or(10000)
    }

    pub fn container_registry(&self) -> &str {
        non_empty(&self.container_registry).unwrap_or("ghcr.io")
    }

    pub fn gpr_path(&self) -> &str {
        non_empty(&self.gpr_path).unwrap_or("./tool/gpr")
    }

    pub fn catalog_order(&self) -> VersionOrder {
        self.catalog_order.unwrap_or_default()
    }

    /// Proxy used for outbound registry traffic; HTTPS wins over HTTP.
    pub fn proxy(&self) -> Option<&str> {
        non_empty(&self.https_proxy).or_else(|| non_empty(&self.http_proxy))
    }
}
