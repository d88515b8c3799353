use ghmpkg_core::{api::VersionInfo, PackageType, ResultState};

use crate::error::Result;

/// One file of one package version, addressed by its catalog coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactRef<'a> {
    pub owner: &'a str,
    pub repository: &'a str,
    pub package_name: &'a str,
    pub version: &'a str,
    pub filename: &'a str,
}

impl<'a> ArtifactRef<'a> {
    pub fn new(
        owner: &'a str,
        repository: &'a str,
        package_name: &'a str,
        version: &'a str,
        filename: &'a str,
    ) -> Self {
        Self {
            owner,
            repository,
            package_name,
            version,
            filename,
        }
    }
}

/// Registry operations for one package format.
///
/// A provider is created once per package type in a run and reused for every package of
/// that type. `connect` must succeed before any transfer.
pub trait Provider: Send + Sync {
    fn package_type(&self) -> PackageType;

    /// Establishes registry sessions. A no-op for formats authenticated per request.
    fn connect(&mut self) -> Result<()>;

    /// Filenames published under `version`.
    ///
    /// Safe to call repeatedly; formats needing a secondary lookup cache it per package.
    fn fetch_package_files(
        &self,
        owner: &str,
        repository: &str,
        package_name: &str,
        version: &VersionInfo,
    ) -> Result<Vec<String>>;

    /// Fetches one file into the local layout. Returns `Skipped` without any network
    /// request when the file is already present.
    fn download(&self, artifact: &ArtifactRef) -> Result<ResultState>;

    /// Rewrites and publishes one file. Returns `Skipped` when nothing was pulled for
    /// the version or the target already has it.
    fn upload(&self, artifact: &ArtifactRef) -> Result<ResultState>;

    /// Uploads every file of one version, one result per input in input order.
    fn upload_batch(&self, artifacts: &[ArtifactRef]) -> Vec<Result<ResultState>> {
        artifacts.iter().map(|a| self.upload(a)).collect()
    }

    fn download_url(&self, artifact: &ArtifactRef) -> Result<String>;

    fn upload_url(&self, artifact: &ArtifactRef) -> Result<String>;
}

/// Builds providers for the engine, which switches provider whenever the package type
/// changes.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, package_type: PackageType) -> Result<Box<dyn Provider>>;
}
