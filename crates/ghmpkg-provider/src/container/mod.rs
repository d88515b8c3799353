//! Container images moved between registries through a local container engine.

mod engine;

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use ghmpkg_core::{api::VersionInfo, PackageType, ResultState};
use ghmpkg_utils::rewrite::rewrite_source_label;
use tracing::{debug, info};

pub use engine::{ContainerEngine, DockerCli, ImageDetails, RegistrySession};

use crate::{
    base::ProviderContext,
    error::{ProviderError, Result},
    traits::{ArtifactRef, Provider},
};

pub const SOURCE_LABEL: &str = "org.opencontainers.image.source";

/// Splits a catalog filename of the form `name:tag`.
fn split_reference(filename: &str) -> Result<(&str, &str)> {
    filename
        .rsplit_once(':')
        .filter(|(name, tag)| !name.is_empty() && !tag.is_empty())
        .ok_or_else(|| ProviderError::InvalidArtifact(filename.to_string()))
}

fn archive_name(package_name: &str, tag: &str) -> String {
    format!("{package_name}-{tag}.tar")
}

pub struct ContainerProvider {
    ctx: Arc<ProviderContext>,
    engine: Arc<dyn ContainerEngine>,
    source_session: Option<RegistrySession>,
    target_session: Option<RegistrySession>,
    /// Source image id to the first target reference recreated from it.
    recreated: Mutex<HashMap<String, String>>,
}

impl ContainerProvider {
    pub fn new(ctx: Arc<ProviderContext>, engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            ctx,
            engine,
            source_session: None,
            target_session: None,
            recreated: Mutex::new(HashMap::new()),
        }
    }

    fn image_ref(registry: &str, owner: &str, filename: &str) -> Result<String> {
        let (name, tag) = split_reference(filename)?;
        Ok(format!(
            "{}/{}/{}:{tag}",
            registry.trim_end_matches('/'),
            owner.to_lowercase(),
            name.to_lowercase()
        ))
    }

    fn source_session(&self) -> Result<&RegistrySession> {
        self.source_session.as_ref().ok_or_else(|| {
            ProviderError::Auth {
                registry: self.ctx.settings.source_registry(PackageType::Container),
                reason: "not logged in".into(),
            }
        })
    }

    fn target_session(&self) -> Result<&RegistrySession> {
        self.target_session.as_ref().ok_or_else(|| {
            ProviderError::Auth {
                registry: self.ctx.settings.target_registry(PackageType::Container),
                reason: "target organization or token not configured".into(),
            }
        })
    }

    /// Makes `target_ref` point at a copy of `source_ref` whose source label names the
    /// target organization.
    ///
    /// Each distinct source image is recreated once; further tags of the same image
    /// are plain re-tags of the first recreated reference.
    fn rename(&self, source_ref: &str, target_ref: &str) -> Result<()> {
        let settings = &self.ctx.settings;
        if settings.orgs_match() {
            return self.engine.tag(source_ref, target_ref);
        }

        let details = self.engine.inspect(source_ref)?.ok_or_else(|| {
            ProviderError::Custom(format!("image {source_ref} is not available locally"))
        })?;

        let cached = self
            .recreated
            .lock()
            .map_err(|_| ProviderError::Custom("recreated image cache poisoned".into()))?
            .get(&details.id)
            .cloned();
        if let Some(existing) = cached {
            debug!(image = %details.id, from = %existing, to = %target_ref, "re-tagging recreated image");
            return self.engine.tag(&existing, target_ref);
        }

        let mut labels = details.labels;
        if let Some(source) = labels.get_mut(SOURCE_LABEL) {
            *source = rewrite_source_label(
                source,
                &settings.source_organization,
                &settings.target_organization,
            );
        }

        let container = self.engine.create(source_ref, &labels)?;
        let committed = self.engine.commit(&container, target_ref, &labels);
        let removed = self.engine.remove_container(&container);
        committed?;
        removed?;

        self.recreated
            .lock()
            .map_err(|_| ProviderError::Custom("recreated image cache poisoned".into()))?
            .insert(details.id, target_ref.to_string());
        info!(from = %source_ref, to = %target_ref, "recreated image with rewritten labels");
        Ok(())
    }

    fn push(&self, artifact: &ArtifactRef, target_ref: &str, dir: &Path) -> Result<ResultState> {
        let settings = &self.ctx.settings;
        let (name, tag) = split_reference(artifact.filename)?;
        let source_ref = Self::image_ref(
            &settings.source_registry(PackageType::Container),
            &settings.source_organization,
            artifact.filename,
        )?;

        if self.engine.inspect(&source_ref)?.is_none() {
            let archive = dir.join(archive_name(name, tag));
            if !archive.is_file() {
                debug!(path = %archive.display(), "image archive missing");
                return Ok(ResultState::Skipped);
            }
            self.engine.load(&archive)?;
        }

        self.rename(&source_ref, target_ref)?;
        self.engine.push(self.target_session()?, target_ref)?;
        Ok(ResultState::Success)
    }
}

impl Provider for ContainerProvider {
    fn package_type(&self) -> PackageType {
        PackageType::Container
    }

    fn connect(&mut self) -> Result<()> {
        let settings = &self.ctx.settings;
        let source_registry = settings.source_registry(PackageType::Container);
        if settings.source_organization.is_empty() || settings.source_token.is_empty() {
            return Err(ProviderError::Auth {
                registry: source_registry,
                reason: "source organization and token are required".into(),
            });
        }

        let source = self.engine.login(
            &source_registry,
            &settings.source_organization,
            &settings.source_token,
            "source",
        )?;

        let target = if !settings.target_organization.is_empty()
            && !settings.target_token.is_empty()
        {
            Some(self.engine.login(
                &settings.target_registry(PackageType::Container),
                &settings.target_organization,
                &settings.target_token,
                "target",
            )?)
        } else {
            None
        };

        self.source_session = Some(source);
        self.target_session = target;
        Ok(())
    }

    /// One `name:tag` per tag, oldest tag first.
    fn fetch_package_files(
        &self,
        _owner: &str,
        _repository: &str,
        package_name: &str,
        version: &VersionInfo,
    ) -> Result<Vec<String>> {
        Ok(version
            .tags
            .iter()
            .rev()
            .map(|tag| format!("{package_name}:{tag}"))
            .collect())
    }

    fn download(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        let (name, tag) = split_reference(artifact.filename)?;
        let stored = archive_name(name, tag);
        let by_tag = ArtifactRef {
            version: tag,
            ..*artifact
        };

        self.ctx.download_with(
            PackageType::Container,
            &by_tag,
            Some(&stored),
            || self.download_url(artifact),
            |image, dest| {
                self.engine.pull(self.source_session()?, image)?;
                self.engine.save(image, dest)
            },
        )
    }

    fn upload(&self, artifact: &ArtifactRef) -> Result<ResultState> {
        let (_, tag) = split_reference(artifact.filename)?;
        self.ctx.upload_with(
            PackageType::Container,
            artifact,
            tag,
            || self.upload_url(artifact),
            |target_ref, dir| self.push(artifact, target_ref, dir),
        )
    }

    fn download_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Self::image_ref(
            &self.ctx.settings.source_registry(PackageType::Container),
            artifact.owner,
            artifact.filename,
        )
    }

    fn upload_url(&self, artifact: &ArtifactRef) -> Result<String> {
        Self::image_ref(
            &self.ctx.settings.target_registry(PackageType::Container),
            artifact.owner,
            artifact.filename,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashSet},
        path::PathBuf,
    };

    use super::*;
    use crate::base::tests::Fixture;

    /// In-memory engine recording every call.
    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<String>>,
        images: Mutex<HashMap<String, ImageDetails>>,
        fail_login: bool,
        fail_save: bool,
    }

    impl FakeEngine {
        fn with_image(self, reference: &str, id: &str, source: &str) -> Self {
            self.images.lock().unwrap().insert(
                reference.to_string(),
                ImageDetails {
                    id: id.to_string(),
                    labels: BTreeMap::from([(SOURCE_LABEL.to_string(), source.to_string())]),
                },
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ContainerEngine for FakeEngine {
        fn login(&self, registry: &str, user: &str, _: &str, name: &str) -> Result<RegistrySession> {
            self.record(format!("login {registry} {user}"));
            if self.fail_login {
                return Err(ProviderError::Auth {
                    registry: registry.into(),
                    reason: "denied".into(),
                });
            }
            Ok(RegistrySession {
                registry: registry.to_string(),
                config_dir: PathBuf::from(name),
            })
        }

        fn pull(&self, session: &RegistrySession, image: &str) -> Result<()> {
            self.record(format!("pull {} {image}", session.config_dir.display()));
            Ok(())
        }

        fn save(&self, image: &str, dest: &Path) -> Result<()> {
            self.record(format!("save {image}"));
            std::fs::write(dest, b"tar").unwrap();
            if self.fail_save {
                return Err(ProviderError::Custom("no space left on device".into()));
            }
            Ok(())
        }

        fn load(&self, archive: &Path) -> Result<()> {
            self.record(format!("load {}", archive.display()));
            Ok(())
        }

        fn inspect(&self, image: &str) -> Result<Option<ImageDetails>> {
            self.record(format!("inspect {image}"));
            Ok(self.images.lock().unwrap().get(image).cloned())
        }

        fn tag(&self, source: &str, target: &str) -> Result<()> {
            self.record(format!("tag {source} {target}"));
            Ok(())
        }

        fn create(&self, image: &str, labels: &BTreeMap<String, String>) -> Result<String> {
            self.record(format!("create {image} {}", labels[SOURCE_LABEL]));
            Ok("cid".into())
        }

        fn commit(&self, container: &str, image: &str, _: &BTreeMap<String, String>) -> Result<()> {
            self.record(format!("commit {container} {image}"));
            Ok(())
        }

        fn remove_container(&self, container: &str) -> Result<()> {
            self.record(format!("rm {container}"));
            Ok(())
        }

        fn push(&self, session: &RegistrySession, image: &str) -> Result<()> {
            self.record(format!("push {} {image}", session.config_dir.display()));
            Ok(())
        }
    }

    fn connected(fx: &Fixture, engine: Arc<FakeEngine>) -> ContainerProvider {
        let mut provider = ContainerProvider::new(fx.context(), engine);
        provider.connect().unwrap();
        provider
    }

    fn pull_dir(fx: &Fixture, tag: &str) {
        std::fs::create_dir_all(fx.dir.path().join("packages/acme/container/App").join(tag))
            .unwrap();
    }

    #[test]
    fn test_connect_logs_into_both_registries() {
        let fx = Fixture::new();
        let engine = Arc::new(FakeEngine::default());
        connected(&fx, engine.clone());
        assert_eq!(
            engine.calls(),
            vec!["login ghcr.io acme", "login ghcr.io acme-new"]
        );
    }

    #[test]
    fn test_connect_failure_is_auth_error() {
        let fx = Fixture::new();
        let engine = Arc::new(FakeEngine {
            fail_login: true,
            ..Default::default()
        });
        let mut provider = ContainerProvider::new(fx.context(), engine);
        assert!(matches!(provider.connect(), Err(ProviderError::Auth { .. })));
    }

    #[test]
    fn test_fetch_package_files_reverses_tags() {
        let fx = Fixture::new();
        let provider = ContainerProvider::new(fx.context(), Arc::new(FakeEngine::default()));
        let version = VersionInfo {
            id: 1,
            name: "sha256:abc".into(),
            tags: vec!["latest".into(), "2.0".into()],
        };
        assert_eq!(
            provider.fetch_package_files("acme", "", "app", &version).unwrap(),
            vec!["app:2.0", "app:latest"]
        );
    }

    #[test]
    fn test_urls_are_lowercased() {
        let fx = Fixture::new();
        let provider = ContainerProvider::new(fx.context(), Arc::new(FakeEngine::default()));
        let artifact = ArtifactRef::new("Acme", "repo", "App", "sha256:abc", "App:V1");
        assert_eq!(provider.download_url(&artifact).unwrap(), "ghcr.io/acme/app:V1");
        assert!(provider
            .download_url(&ArtifactRef { filename: "no-tag", ..artifact })
            .is_err());
    }

    #[test]
    fn test_download_pulls_and_saves_once() {
        let fx = Fixture::new();
        let engine = Arc::new(FakeEngine::default());
        let provider = connected(&fx, engine.clone());
        let artifact = ArtifactRef::new("acme", "repo", "App", "sha256:abc", "App:1.0");

        assert_eq!(provider.download(&artifact).unwrap(), ResultState::Success);
        assert!(fx
            .dir
            .path()
            .join("packages/acme/container/App/1.0/App-1.0.tar")
            .is_file());
        assert_eq!(provider.download(&artifact).unwrap(), ResultState::Skipped);
        assert_eq!(engine.count("pull source ghcr.io/acme/app:1.0"), 1);
        assert_eq!(engine.count("save"), 1);
    }

    #[test]
    fn test_failed_save_leaves_no_archive() {
        let fx = Fixture::new();
        let engine = Arc::new(FakeEngine {
            fail_save: true,
            ..Default::default()
        });
        let provider = connected(&fx, engine.clone());
        let artifact = ArtifactRef::new("acme", "repo", "App", "sha256:abc", "App:1.0");
        let archive = fx.dir.path().join("packages/acme/container/App/1.0/App-1.0.tar");

        assert!(provider.download(&artifact).is_err());
        assert!(!archive.exists());
        assert!(!archive.with_extension("tar.part").exists());
        assert!(provider.download(&artifact).is_err());
        assert_eq!(engine.count("save"), 2);
    }

    #[test]
    fn test_same_digest_recreated_once() {
        let fx = Fixture::new();
        let engine = Arc::new(
            FakeEngine::default()
                .with_image("ghcr.io/acme/app:1.0", "sha256:same", "https://github.com/acme/app")
                .with_image("ghcr.io/acme/app:latest", "sha256:same", "https://github.com/acme/app"),
        );
        let provider = connected(&fx, engine.clone());
        pull_dir(&fx, "1.0");
        pull_dir(&fx, "latest");

        for tag in ["1.0", "latest"] {
            let filename = format!("App:{tag}");
            let artifact = ArtifactRef::new("acme-new", "repo", "App", "sha256:same", &filename);
            assert_eq!(provider.upload(&artifact).unwrap(), ResultState::Success);
        }

        assert_eq!(engine.count("create"), 1);
        assert_eq!(engine.count("commit"), 1);
        assert_eq!(engine.count("rm cid"), 1);
        assert!(engine
            .calls()
            .contains(&"create ghcr.io/acme/app:1.0 https://github.com/acme-new/app".to_string()));
        assert!(engine
            .calls()
            .contains(&"tag ghcr.io/acme-new/app:1.0 ghcr.io/acme-new/app:latest".to_string()));
        let pushes: HashSet<_> = engine
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("push"))
            .collect();
        assert_eq!(
            pushes,
            HashSet::from([
                "push target ghcr.io/acme-new/app:1.0".to_string(),
                "push target ghcr.io/acme-new/app:latest".to_string(),
            ])
        );
    }

    #[test]
    fn test_upload_loads_archive_when_image_missing() {
        let fx = Fixture::new();
        let engine = Arc::new(FakeEngine::default());
        let provider = connected(&fx, engine.clone());
        pull_dir(&fx, "1.0");
        let archive = fx.dir.path().join("packages/acme/container/App/1.0/App-1.0.tar");
        std::fs::write(&archive, b"tar").unwrap();

        // the fake never gains the image after load, so rename cannot inspect it
        let artifact = ArtifactRef::new("acme-new", "repo", "App", "sha256:abc", "App:1.0");
        assert!(provider.upload(&artifact).is_err());
        assert!(engine.calls().contains(&format!("load {}", archive.display())));
    }

    #[test]
    fn test_upload_without_pull_is_skipped() {
        let fx = Fixture::new();
        let engine = Arc::new(FakeEngine::default());
        let provider = connected(&fx, engine.clone());
        let artifact = ArtifactRef::new("acme-new", "repo", "App", "sha256:abc", "App:1.0");
        assert_eq!(provider.upload(&artifact).unwrap(), ResultState::Skipped);
        assert_eq!(engine.count("push"), 0);
    }
}
