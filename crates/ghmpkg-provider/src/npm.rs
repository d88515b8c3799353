//! npm packages: tarballs over HTTP, published with the npm CLI.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use ghmpkg_core::{api::VersionInfo, PackageType, ResultState};
use ghmpkg_utils::{
    fs::{edit_file, write_file},
    rewrite::replace_npm_scope,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    archive::extract_tgz,
    base::{join_url, ProviderContext},
    error::{ProviderError, Result},
    tool::{read_log, ToolCommand},
    traits::{ArtifactRef, Provider},
};

const CONFLICT_MARKERS: [&str; 3] = ["E409", "EPUBLISHCONFLICT", "409 Conflict"];

fn tarball_name(package_name: &str, version: &str) -> String {
    format!("{package_name}-{version}.tgz")
}

pub struct NpmProvider {
    ctx: Arc<ProviderContext>,
    /// Registry documents per package name.
    packuments: Mutex<HashMap<String, Value>>,
}

impl NpmProvider {
    pub fn new(ctx: Arc<ProviderContext>) -> Self {
        Self {
            ctx,
            packuments: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetch_url(&self, owner: &str, package_name: &str) -> String {
        join_url(
            &self.ctx.settings.source_registry(PackageType::Npm),
            &[&format!("@{owner}"), package_name],
        )
    }

    fn npmrc(&self, owner: &str) -> String {
        let settings = &self.ctx.settings;
        format!(
            "//npm.pkg.{}/:_authToken={}\nregistry={}{owner}\n",
            settings.target_hostname,
            settings.target_token,
            settings.target_registry(PackageType::Npm)
        )
    }

    /// Unpacks the tarball, rewrites the scope in `package.json` and runs `npm publish`.
    fn publish(&self, artifact: &ArtifactRef, dir: &Path) -> Result<ResultState> {
        let settings = &self.ctx.settings;
        let tarball = dir.join(tarball_name(artifact.package_name, artifact.version));
        if !tarball.is_file() {
            debug!(path = %tarball.display(), "tarball was not pulled");
            return Ok(ResultState::Skipped);
        }

        extract_tgz(&tarball, dir)?;
        let package_dir = dir.join("package");
        let manifest = package_dir.join("package.json");
        if !settings.orgs_match() {
            edit_file(&manifest, |content| {
                replace_npm_scope(
                    content,
                    &settings.source_organization,
                    &settings.target_organization,
                )
            })
            .map_err(|err| {
                ProviderError::Rename {
                    path: manifest.clone(),
                    reason: err.to_string(),
                }
            })?;
        }

        let npmrc = dir.join(".npmrc");
        write_file(&npmrc, self.npmrc(artifact.owner))?;

        let log = dir.join("npmlog");
        let cmd = ToolCommand::new("npm")
            .args(["publish", "--ignore-scripts", "--userconfig"])
            .arg(npmrc.display().to_string())
            .current_dir(&package_dir)
            .env("HTTPS_PROXY", "")
            .log_to(&log);
        let output = self.ctx.runner.run(&cmd)?;
        if output.success() {
            return Ok(ResultState::Success);
        }

        let log_content = read_log(&log);
        if CONFLICT_MARKERS.iter().any(|m| log_content.contains(m)) {
            info!(package = %artifact.package_name, version = %artifact.version, "version already published");
            return Ok(ResultState::Skipped);
        }
        warn!(log = %log.display(), "npm publish failed");
        Err(ProviderError::Tool {
            program: cmd.program,
            status: output.status,
            log: Some(log),
        })
    }
}

impl Provider for NpmProvider {
    fn package_type(&self) -> PackageType {
        PackageType::Npm
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Basename of the version's tarball URL from the registry document.
    fn fetch_package_files(
        &self,
        owner: &str,
        _repository: &str,
        package_name: &str,
        version: &VersionInfo,
    ) -> Result<Vec<String>> {
        let enumeration = |reason: String| {
            ProviderError::Enumeration {
                package: package_name.to_string(),
                reason,
            }
        };

        let mut cache = self
            .packuments
            .lock()
            .map_err(|_| ProviderError::Custom("npm document cache poisoned".into()))?;
        if !cache.contains_key(package_name) {
            let url = self.fetch_url(owner, package_name);
            let doc = self
                .ctx
                .transport
                .get_json(&url, &self.ctx.settings.source_token)
                .map_err(|err| enumeration(err.to_string()))?;
            cache.insert(package_name.to_string(), doc);
        }

        let tarball = cache
            .get(package_name)
            .and_then(|doc| doc.get("versions"))
            .and_then(|versions| versions.get(&version.name))
            .and_then(|v| v.pointer("/dist/tarball"))
            .and_then(Value::as_str)
            .ok_or_else(|| enumeration(format!("no tarball for version {}", version.name)))?;

        let url = Url::parse(tarball).map_err(|err| enumeration(err.to_string()))?;
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| enumeration(format!("tarball URL {tarball} has no file name")))?;
        Ok(vec![name.to_string()])
    }

    fn download(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        let stored = tarball_name(artifact.package_name, artifact.version);
        self.ctx.download_with(
            PackageType::Npm,
            artifact,
            Some(&stored),
            || self.download_url(artifact),
            |url, dest| self.ctx.http_download(url, dest),
        )
    }

    fn upload(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.upload_with(
            PackageType::Npm,
            artifact,
            artifact.version,
            || self.upload_url(artifact),
            |_, dir| self.publish(artifact, dir),
        )
    }

    fn download_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(join_url(
            &self.ctx.settings.source_registry(PackageType::Npm),
            &[
                "download",
                &format!("@{}", artifact.owner),
                artifact.package_name,
                artifact.version,
                artifact.filename,
            ],
        ))
    }

    fn upload_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(join_url(
            &self.ctx.settings.target_registry(PackageType::Npm),
            &[
                &format!("@{}", artifact.owner),
                artifact.repository,
                artifact.package_name,
                artifact.version,
                artifact.filename,
            ],
        ))
    }
}
