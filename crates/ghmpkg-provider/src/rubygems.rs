//! RubyGems: gems fetched over HTTP, rebuilt and pushed with the `gem` CLI.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ghmpkg_core::{api::VersionInfo, PackageType, ResultState};
use ghmpkg_utils::{
    fs::{edit_file, ensure_dir_exists, write_file},
    path::home_dir,
    rewrite::replace_org_reference,
};
use tracing::{info, warn};

use crate::{
    base::{join_url, ProviderContext},
    error::{ErrorContext, ProviderError, Result},
    tool::{run_checked, ToolCommand},
    traits::{ArtifactRef, Provider},
};

fn gem_name(package_name: &str, version: &str) -> String {
    format!("{package_name}-{version}.gem")
}

pub struct RubyGemsProvider {
    ctx: Arc<ProviderContext>,
    credentials: PathBuf,
}

impl RubyGemsProvider {
    pub fn new(ctx: Arc<ProviderContext>) -> Self {
        Self {
            ctx,
            credentials: home_dir().join(".gem").join("credentials"),
        }
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials = path.into();
        self
    }

    /// Writes the push key for the target registry, readable only by the owner.
    fn ensure_credentials(&self) -> Result<()> {
        if let Some(parent) = self.credentials.parent() {
            ensure_dir_exists(parent)?;
        }
        write_file(
            &self.credentials,
            format!("---\n:github: {}\n", self.ctx.settings.target_token),
        )?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.credentials, std::fs::Permissions::from_mode(0o600))
                .with_context(|| {
                    format!("restricting permissions of {}", self.credentials.display())
                })?;
        }
        Ok(())
    }

    /// Points the registry and repository URLs in a gemspec at the target organization.
    fn rename(&self, gemspec: &Path) -> Result<()> {
        let settings = &self.ctx.settings;
        if settings.orgs_match() {
            return Ok(());
        }

        let replacements = [
            (
                format!(
                    "{}{}",
                    settings.source_registry(PackageType::Rubygems),
                    settings.source_organization
                ),
                format!(
                    "{}{}",
                    settings.target_registry(PackageType::Rubygems),
                    settings.target_organization
                ),
            ),
            (
                format!(
                    "https://{}/{}",
                    settings.source_hostname, settings.source_organization
                ),
                format!(
                    "https://{}/{}",
                    settings.target_hostname, settings.target_organization
                ),
            ),
        ];

        let changed = edit_file(gemspec, |content| {
            replacements
                .iter()
                .fold(content.to_string(), |acc, (from, to)| {
                    replace_org_reference(&acc, from, to)
                })
        })
        .map_err(|err| {
            ProviderError::Rename {
                path: gemspec.to_path_buf(),
                reason: err.to_string(),
            }
        })?;
        if changed {
            info!(path = %gemspec.display(), "rewrote organization in gemspec");
        }
        Ok(())
    }

    fn push(&self, owner: &str, dir: &Path, gem: &str) -> Result<()> {
        self.ensure_credentials()?;
        let host = format!(
            "{}{owner}",
            self.ctx.settings.target_registry(PackageType::Rubygems)
        );
        let cmd = ToolCommand::new("gem")
            .args(["push", "--key", "github", "--host"])
            .args([host.as_str(), gem])
            .current_dir(dir)
            .env("HTTPS_PROXY", "")
            .env("GITHUB_TOKEN", &self.ctx.settings.target_token)
            .log_to(dir.join("gempush.log"));
        run_checked(self.ctx.runner.as_ref(), &cmd)?;
        Ok(())
    }

    /// Unpacks the gem, patches and rebuilds its gemspec, then pushes the rebuilt gem.
    ///
    /// Without a gemspec the downloaded gem is pushed unchanged.
    fn publish(&self, artifact: &ArtifactRef, dir: &Path) -> Result<ResultState> {
        if !dir.join(artifact.filename).is_file() {
            return Ok(ResultState::Skipped);
        }

        let unpack = ToolCommand::new("gem")
            .args(["unpack", artifact.filename])
            .current_dir(dir);
        run_checked(self.ctx.runner.as_ref(), &unpack)?;

        let basename = artifact
            .filename
            .strip_suffix(".gem")
            .unwrap_or(artifact.filename);
        let unpacked = dir.join(basename);
        let gemspec = [basename, artifact.package_name]
            .iter()
            .map(|stem| unpacked.join(format!("{stem}.gemspec")))
            .find(|path| path.is_file());

        let Some(gemspec) = gemspec else {
            warn!(
                package = %artifact.package_name,
                version = %artifact.version,
                "no gemspec found, pushing the original gem"
            );
            self.push(artifact.owner, dir, artifact.filename)?;
            return Ok(ResultState::Success);
        };

        self.rename(&gemspec)?;
        let spec_name = gemspec
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let build = ToolCommand::new("gem")
            .args(["build", spec_name.as_str()])
            .current_dir(&unpacked)
            .log_to(dir.join("gembuild.log"));
        run_checked(self.ctx.runner.as_ref(), &build)?;

        self.push(
            artifact.owner,
            &unpacked,
            &gem_name(artifact.package_name, artifact.version),
        )?;
        Ok(ResultState::Success)
    }
}

impl Provider for RubyGemsProvider {
    fn package_type(&self) -> PackageType {
        PackageType::Rubygems
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
        Ok(vec![gem_name(package_name, &version.name)])
    }

    fn download(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.download_with(
            PackageType::Rubygems,
            artifact,
            None,
            || self.download_url(artifact),
            |url, dest| self.ctx.http_download(url, dest),
        )
    }

    fn upload(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        self.ctx.upload_with(
            PackageType::Rubygems,
            artifact,
            artifact.version,
            || self.upload_url(artifact),
            |_, dir| self.publish(artifact, dir),
        )
    }

    fn download_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(join_url(
            &self.ctx.settings.source_registry(PackageType::Rubygems),
            &[artifact.owner, "gems", artifact.filename],
        ))
    }

    fn upload_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Ok(join_url(
            &self.ctx.settings.target_registry(PackageType::Rubygems),
            &[
                artifact.owner,
                artifact.repository,
                artifact.package_name,
                artifact.version,
                artifact.filename,
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::tests::Fixture;

    const GEMSPEC: &str = r#"Gem::Specification.new do |s|
  s.name = "tool"
  s.homepage = "https://github.com/acme"
  s.metadata = {
    "github_repo" => "https://github.com/acme/tool",
    "allowed_push_host" => "https://rubygems.pkg.github.com/acme",
    "docs" => "https://github.com/acme-organization/docs",
  }
end
"#;

    fn provider(fx: &Fixture) -> RubyGemsProvider {
        RubyGemsProvider::new(fx.context())
            .with_credentials_path(fx.dir.path().join("home/.gem/credentials"))
    }

    fn pulled(fx: &Fixture, with_spec: Option<&str>) -> PathBuf {
        let dir = fx.dir.path().join("packages/acme/rubygems/tool/1.0.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tool-1.0.0.gem"), b"gem").unwrap();
        if let Some(spec) = with_spec {
            let unpacked = dir.join("tool-1.0.0");
            std::fs::create_dir_all(&unpacked).unwrap();
            std::fs::write(unpacked.join(spec), GEMSPEC).unwrap();
        }
        dir
    }

    fn artifact() -> ArtifactRef<'static> {
        ArtifactRef::new("acme-new", "tools", "tool", "1.0.0", "tool-1.0.0.gem")
    }

    #[test]
    fn test_urls_and_files() {
        let fx = Fixture::new();
        let provider = provider(&fx);
        let version = VersionInfo {
            id: 3,
            name: "1.0.0".into(),
            tags: vec![],
        };
        assert_eq!(
            provider.fetch_package_files("acme", "tools", "tool", &version).unwrap(),
            vec!["tool-1.0.0.gem"]
        );
        let source = ArtifactRef::new("acme", "tools", "tool", "1.0.0", "tool-1.0.0.gem");
        assert_eq!(
            provider.download_url(&source).unwrap(),
            "https://rubygems.pkg.github.com/acme/gems/tool-1.0.0.gem"
        );
        assert_eq!(
            provider.upload_url(&artifact()).unwrap(),
            "https://rubygems.pkg.github.com/acme-new/tools/tool/1.0.0/tool-1.0.0.gem"
        );
    }

    #[test]
    fn test_rename_rewrites_both_references_only() {
        let fx = Fixture::new();
        let provider = provider(&fx);
        let spec = fx.dir.path().join("tool.gemspec");
        std::fs::write(&spec, GEMSPEC).unwrap();

        provider.rename(&spec).unwrap();
        let updated = std::fs::read_to_string(&spec).unwrap();
        let expected = GEMSPEC
            .replace("\"https://github.com/acme\"", "\"https://github.com/acme-new\"")
            .replace("https://github.com/acme/tool", "https://github.com/acme-new/tool")
            .replace(
                "https://rubygems.pkg.github.com/acme\"",
                "https://rubygems.pkg.github.com/acme-new\"",
            );
        assert_eq!(updated, expected);
        assert!(updated.contains("https://github.com/acme-organization/docs"));
    }

    #[test]
    fn test_upload_rebuilds_and_pushes() {
        let fx = Fixture::new();
        let provider = provider(&fx);
        let dir = pulled(&fx, Some("tool-1.0.0.gemspec"));

        assert_eq!(provider.upload(&artifact()).unwrap(), ResultState::Success);

        let unpacked = dir.join("tool-1.0.0");
        let spec = std::fs::read_to_string(unpacked.join("tool-1.0.0.gemspec")).unwrap();
        assert!(spec.contains("https://rubygems.pkg.github.com/acme-new"));

        let commands = fx.runner.commands();
        let args: Vec<Vec<String>> = commands.iter().map(|c| c.args.clone()).collect();
        assert_eq!(args[0], vec!["unpack", "tool-1.0.0.gem"]);
        assert_eq!(args[1], vec!["build", "tool-1.0.0.gemspec"]);
        assert_eq!(
            args[2],
            vec![
                "push",
                "--key",
                "github",
                "--host",
                "https://rubygems.pkg.github.com/acme-new",
                "tool-1.0.0.gem",
            ]
        );
        assert_eq!(commands[2].cwd, Some(unpacked.clone()));
        assert!(commands[2]
            .env
            .contains(&("GITHUB_TOKEN".into(), "tgt-token".into())));

        let credentials = fx.dir.path().join("home/.gem/credentials");
        assert_eq!(
            std::fs::read_to_string(&credentials).unwrap(),
            "---\n:github: tgt-token\n"
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&credentials).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_gemspec_found_by_package_name() {
        let fx = Fixture::new();
        let provider = provider(&fx);
        pulled(&fx, Some("tool.gemspec"));

        assert_eq!(provider.upload(&artifact()).unwrap(), ResultState::Success);
        assert_eq!(fx.runner.commands()[1].args, vec!["build", "tool.gemspec"]);
    }

    #[test]
    fn test_missing_gemspec_pushes_original() {
        let fx = Fixture::new();
        let provider = provider(&fx);
        let dir = pulled(&fx, None);

        assert_eq!(provider.upload(&artifact()).unwrap(), ResultState::Success);
        let commands = fx.runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].args[0], "push");
        assert_eq!(commands[1].args.last().unwrap(), "tool-1.0.0.gem");
        assert_eq!(commands[1].cwd, Some(dir));
    }

    #[test]
    fn test_failed_unpack_is_error() {
        let fx = Fixture::new();
        let provider = provider(&fx);
        pulled(&fx, Some("tool-1.0.0.gemspec"));
        fx.runner.reply(1, "");

        assert!(matches!(
            provider.upload(&artifact()),
            Err(ProviderError::Tool { .. })
        ));
        assert_eq!(fx.runner.commands().len(), 1);
    }
}
