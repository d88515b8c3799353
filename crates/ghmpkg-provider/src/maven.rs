//! Maven artifacts transferred over the registry's HTTP interface.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use ghmpkg_core::{
    api::{VersionFiles, VersionInfo},
    PackageType, ResultState,
};
use ghmpkg_utils::{fs::edit_file, rewrite::replace_org_reference};
use rayon::{
    iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use tracing::{debug, info, warn};

use crate::{
    base::{join_url, ProviderContext},
    error::{ProviderError, Result},
    traits::{ArtifactRef, Provider},
};

fn is_pom(filename: &str) -> bool {
    filename.ends_with("pom.xml") || filename.ends_with(".pom")
}

pub struct MavenProvider {
    ctx: Arc<ProviderContext>,
    /// File listings per package name, fetched once.
    files: Mutex<HashMap<String, Vec<VersionFiles>>>,
}

impl MavenProvider {
    pub fn new(ctx: Arc<ProviderContext>) -> Self {
        Self {
            ctx,
            files: Mutex::new(HashMap::new()),
        }
    }

    fn url(base: &str, artifact: &ArtifactRef) -> String {
        join_url(
            base,
            &[
                artifact.owner,
                artifact.repository,
                artifact.package_name,
                artifact.version,
                artifact.filename,
            ],
        )
    }

    /// Points registry URLs inside a POM at the target organization.
    ///
    /// Failures are logged and the file is uploaded as is.
    fn rename(&self, path: &Path) {
        let settings = &self.ctx.settings;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        if settings.orgs_match() || !is_pom(name) {
            return;
        }

        let from = format!(
            "{}{}",
            settings.source_registry(PackageType::Maven),
            settings.source_organization
        );
        let to = format!(
            "{}{}",
            settings.target_registry(PackageType::Maven),
            settings.target_organization
        );
        match edit_file(path, |content| replace_org_reference(content, &from, &to)) {
            Ok(true) => info!(path = %path.display(), "rewrote organization in POM"),
            Ok(false) => debug!(path = %path.display(), "POM has no organization reference"),
            Err(err) => warn!(path = %path.display(), "failed to rewrite POM: {err}"),
        }
    }
}

impl Provider for MavenProvider {
    fn package_type(&self) -> PackageType {
        PackageType::Maven
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn fetch_package_files(
        &self,
        owner: &str,
        _repository: &str,
        package_name: &str,
        version: &VersionInfo,
    ) -> Result<Vec<String>> {
        let mut cache = self
            .files
            .lock()
            .map_err(|_| ProviderError::Custom("maven file cache poisoned".into()))?;

        if !cache.contains_key(package_name) {
            let listing = self
                .ctx
                .api
                .package_files(owner, PackageType::Maven, package_name)
                .map_err(|err| {
                    ProviderError::Enumeration {
                        package: package_name.to_string(),
                        reason: err.to_string(),
                    }
                })?;
            cache.insert(package_name.to_string(), listing);
        }

        Ok(cache
            .get(package_name)
            .into_iter()
            .flatten()
            .filter(|v| v.version == version.name)
            .flat_map(|v| v.files.iter().cloned())
            .collect())
    }

    fn download(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.download_with(
            PackageType::Maven,
            artifact,
            None,
            || self.download_url(artifact),
            |url, dest| self.ctx.http_download(url, dest),
        )
    }

    fn upload(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.upload_with(
            PackageType::Maven,
            artifact,
            artifact.version,
            || self.upload_url(artifact),
            |url, dir| {
                let path = dir.join(artifact.filename);
                if !path.is_file() {
                    debug!(path = %path.display(), "file was not pulled");
                    return Ok(ResultState::Skipped);
                }
                self.rename(&path);
                self.ctx.http_upload(url, &path)
            },
        )
    }

    /// Uploads files on a pool of `maven_upload_concurrency` threads, each taking the next
    /// pending file as soon as it is free. Results keep the input order.
    fn upload_batch(&self, artifacts: &[ArtifactRef]) -> Vec<Result<ResultState>> {
        if artifacts.is_empty() {
            return Vec::new();
        }
        let width = self.ctx.settings.maven_upload_concurrency.max(1);
        let pool = match ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("maven-upload-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Could not start upload threads, uploading sequentially: {err}");
                return artifacts.iter().map(|a| self.upload(a)).collect();
            }
        };

        pool.install(|| {
            artifacts
                .par_iter()
                .with_max_len(1)
                .map(|a| self.upload(a))
                .collect()
        })
    }

    fn download_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(Self::url(
            &self.ctx.settings.source_registry(PackageType::Maven),
            artifact,
        ))
    }

    fn upload_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(Self::url(
            &self.ctx.settings.target_registry(PackageType::Maven),
            artifact,
        ))
    }
}
