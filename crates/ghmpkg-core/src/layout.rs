use std::path::{Path, PathBuf};

use crate::PackageType;

/// On-disk layout of a migration work directory.
///
/// Downloads write to, and uploads read from, the same path function, so a pulled
/// artifact is always found again by `sync`:
///
/// ```text
/// {root}/export/{type}/{timestamp}_{org}_{type}_packages.csv
/// {root}/packages/{owner}/{type}/{name}/{version}/{filename}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    root: PathBuf,
}

impl LocalLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn export_dir(&self, package_type: PackageType) -> PathBuf {
        self.root.join("export").join(package_type.as_str())
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// Directory holding every downloaded file of one package version.
    pub fn package_dir(
        &self,
        owner: &str,
        package_type: PackageType,
        package_name: &str,
        version: &str,
    ) -> PathBuf {
        self.packages_dir()
            .join(owner)
            .join(package_type.as_str())
            .join(package_name)
            .join(version)
    }

    pub fn file_path(
        &self,
        owner: &str,
        package_type: PackageType,
        package_name: &str,
        version: &str,
        filename: &str,
    ) -> PathBuf {
        self.package_dir(owner, package_type, package_name, version)
            .join(filename)
    }
}
