use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Package formats the migration tool can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Maven,
    Npm,
    Container,
    Rubygems,
    Nuget,
}

impl PackageType {
    /// Every supported type, in the order runs process them.
    pub const ALL: [PackageType; 5] = [
        PackageType::Maven,
        PackageType::Npm,
        PackageType::Container,
        PackageType::Rubygems,
        PackageType::Nuget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Maven => "maven",
            PackageType::Npm => "npm",
            PackageType::Container => "container",
            PackageType::Rubygems => "rubygems",
            PackageType::Nuget => "nuget",
        }
    }

    /// Subdomain of the `*.pkg.{hostname}` registry serving this type.
    ///
    /// Container images are served from a dedicated registry host instead.
    pub fn subdomain(&self) -> Option<&'static str> {
        match self {
            PackageType::Container => None,
            other => Some(other.as_str()),
        }
    }

    /// Registry base URL for non-container types, e.g. `https://npm.pkg.github.com/`.
    pub fn registry_base(&self, hostname: &str) -> Option<String> {
        self.subdomain()
            .map(|sub| format!("https://{sub}.pkg.{}/", hostname.trim_end_matches('/')))
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maven" => Ok(PackageType::Maven),
            "npm" => Ok(PackageType::Npm),
            "container" => Ok(PackageType::Container),
            "rubygems" => Ok(PackageType::Rubygems),
            "nuget" => Ok(PackageType::Nuget),
            _ => Err(MigrateError::UnsupportedPackageType(s.to_string())),
        }
    }
}
