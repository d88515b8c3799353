//! State and helpers shared by every provider variant.

use std::{path::Path, sync::Arc};

use ghmpkg_core::{api::CatalogApi, layout::LocalLayout, PackageType, ResultState};
use ghmpkg_dl::transport::{Transport, UploadStatus};
use ghmpkg_utils::fs::{ensure_dir_exists, write_through_partial};
use tracing::{debug, info};

use crate::{
    error::{ProviderError, Result},
    tool::ToolRunner,
    traits::ArtifactRef,
};

/// Organizations, credentials and hosts of both sides of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySettings {
    pub source_organization: String,
    pub target_organization: String,
    pub source_token: String,
    pub target_token: String,
    pub source_hostname: String,
    pub target_hostname: String,
    pub container_registry: String,
    /// Path of the NuGet push tool.
    pub gpr_path: String,
    pub maven_upload_concurrency: usize,
}

impl RegistrySettings {
    pub fn source_registry(&self, package_type: PackageType) -> String {
        self.registry(package_type, &self.source_hostname)
    }

    pub fn target_registry(&self, package_type: PackageType) -> String {
        self.registry(package_type, &self.target_hostname)
    }

    fn registry(&self, package_type: PackageType, hostname: &str) -> String {
        package_type
            .registry_base(hostname)
            .unwrap_or_else(|| self.container_registry.clone())
    }

    /// Whether source and target are the same organization, in which case nothing is
    /// rewritten.
    pub fn orgs_match(&self) -> bool {
        self.source_organization
            .eq_ignore_ascii_case(&self.target_organization)
    }
}

/// Collaborators handed to every provider.
pub struct ProviderContext {
    pub settings: RegistrySettings,
    pub layout: LocalLayout,
    pub transport: Arc<dyn Transport>,
    pub runner: Arc<dyn ToolRunner>,
    pub api: Arc<dyn CatalogApi>,
}

impl ProviderContext {
    /// Shared download flow.
    ///
    /// The local path is checked before anything else, so an already-downloaded file
    /// costs no URL resolution and no network call. `fetch` writes to a `.part` sibling
    /// that only replaces the local path once complete, so an interrupted transfer is
    /// fetched again on the next run. `stored_name` overrides the catalog filename for
    /// formats that store artifacts under a derived name.
    pub fn download_with<U, F>(
        &self,
        package_type: PackageType,
        artifact: &ArtifactRef,
        stored_name: Option<&str>,
        resolve_url: U,
        fetch: F,
    ) -> Result<ResultState>
    where
        U: FnOnce() -> Result<String>,
        F: FnOnce(&str, &Path) -> Result<()>,
    {
        let dest = self.layout.file_path(
            artifact.owner,
            package_type,
            artifact.package_name,
            artifact.version,
            stored_name.unwrap_or(artifact.filename),
        );
        if dest.exists() {
            debug!(path = %dest.display(), "already downloaded");
            return Ok(ResultState::Skipped);
        }
        if let Some(parent) = dest.parent() {
            ensure_dir_exists(parent)?;
        }

        let url = resolve_url()?;
        write_through_partial(&dest, |partial| fetch(&url, partial))?;
        info!(
            package = %artifact.package_name,
            version = %artifact.version,
            file = %artifact.filename,
            "downloaded"
        );
        Ok(ResultState::Success)
    }

    /// Shared upload flow.
    ///
    /// Local files were stored under the source organization. When the version directory
    /// does not exist the file is `Skipped` before any URL is resolved.
    pub fn upload_with<U, P>(
        &self,
        package_type: PackageType,
        artifact: &ArtifactRef,
        version_dir: &str,
        resolve_url: U,
        push: P,
    ) -> Result<ResultState>
    where
        U: FnOnce() -> Result<String>,
        P: FnOnce(&str, &Path) -> Result<ResultState>,
    {
        let dir = self.layout.package_dir(
            &self.settings.source_organization,
            package_type,
            artifact.package_name,
            version_dir,
        );
        if !dir.is_dir() {
            debug!(path = %dir.display(), "nothing pulled for this version");
            return Ok(ResultState::Skipped);
        }

        let url = resolve_url()?;
        let state = push(&url, &dir)?;
        info!(
            package = %artifact.package_name,
            version = %artifact.version,
            file = %artifact.filename,
            %state,
            "uploaded"
        );
        Ok(state)
    }

    /// GET with the source token.
    pub fn http_download(&self, url: &str, dest: &Path) -> Result<()> {
        self.transport
            .download(url, &self.settings.source_token, dest)
            .map_err(|source| {
                ProviderError::Download {
                    url: url.to_string(),
                    source,
                }
            })?;
        Ok(())
    }

    /// PUT with the target token. A conflict means the file is already published.
    pub fn http_upload(&self, url: &str, path: &Path) -> Result<ResultState> {
        let status = self
            .transport
            .upload(url, &self.settings.target_token, path)
            .map_err(|source| {
                ProviderError::Upload {
                    url: url.to_string(),
                    source,
                }
            })?;
        Ok(match status {
            UploadStatus::Created => ResultState::Success,
            UploadStatus::Conflict => ResultState::Skipped,
        })
    }
}

/// Appends path segments to a registry base, dropping empty ones.
pub fn join_url(base: &str, segments: &[&str]) -> String {
    let mut url = base.to_string();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        if !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(segment.trim_matches('/'));
    }
    url
}
