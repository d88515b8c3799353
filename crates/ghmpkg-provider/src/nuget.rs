//! NuGet packages: downloaded over HTTP, pushed with the `gpr` tool.

use std::{path::Path, sync::Arc};

use ghmpkg_core::{api::VersionInfo, PackageType, ResultState};
use tracing::debug;

use crate::{
    archive::strip_zip_entries,
    base::{join_url, ProviderContext},
    error::Result,
    tool::{run_checked, ToolCommand},
    traits::{ArtifactRef, Provider},
};

/// Packaging metadata regenerated by the push tool.
const STALE_ENTRIES: [&str; 2] = ["_rels/.rels", "[Content_Types].xml"];

fn nupkg_name(package_name: &str, version: &str) -> String {
    format!("{package_name}-{version}.nupkg")
}

pub struct NugetProvider {
    ctx: Arc<ProviderContext>,
}

impl NugetProvider {
    pub fn new(ctx: Arc<ProviderContext>) -> Self {
        Self {
            ctx,
        }
    }

    fn publish(&self, artifact: &ArtifactRef, url: &str, dir: &Path) -> Result<ResultState> {
        let nupkg = dir.join(nupkg_name(artifact.package_name, artifact.version));
        if !nupkg.is_file() {
            debug!(path = %nupkg.display(), "package was not pulled");
            return Ok(ResultState::Skipped);
        }

        let removed = strip_zip_entries(&nupkg, &STALE_ENTRIES)?;
        debug!(path = %nupkg.display(), removed, "stripped packaging metadata");

        let settings = &self.ctx.settings;
        let cmd = ToolCommand::new(&settings.gpr_path)
            .arg("push")
            .arg(nupkg.display().to_string())
            .args(["--repository", url, "-k", settings.target_token.as_str()])
            .current_dir(dir)
            .log_to(dir.join("nugetlog"));
        run_checked(self.ctx.runner.as_ref(), &cmd)?;
        Ok(ResultState::Success)
    }
}

impl Provider for NugetProvider {
    fn package_type(&self) -> PackageType {
        PackageType::Nuget
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn fetch_package_files(
        &self,
        _owner: &str,
        _repository: &str,
        package_name: &str,
        version: &VersionInfo,
    ) -> Result<Vec<String>> {
        Ok(vec![nupkg_name(package_name, &version.name)])
    }

    fn download(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.download_with(
            PackageType::Nuget,
            artifact,
            None,
            || self.download_url(artifact),
            |url, dest| self.ctx.http_download(url, dest),
        )
    }

    fn upload(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.upload_with(
            PackageType::Nuget,
            artifact,
            artifact.version,
            || self.upload_url(artifact),
            |url, dir| self.publish(artifact, url, dir),
        )
    }

    fn download_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(join_url(
            &self.ctx.settings.source_registry(PackageType::Nuget),
            &[
                artifact.owner,
                "download",
                artifact.package_name,
                artifact.version,
                artifact.filename,
            ],
        ))
    }

    /// Repository the pushed package is linked to.
    fn upload_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(join_url(
            &format!("https://{}/", self.ctx.settings.target_hostname),
            &[artifact.owner, artifact.repository],
        ))
    }
}
