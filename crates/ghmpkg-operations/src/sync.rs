//! Uploads pulled packages to the target organization.

use std::sync::Arc;

use ghmpkg_core::ResultState;
use ghmpkg_events::{LogLevel, OperationId};
use ghmpkg_provider::{ArtifactRef, Provider};

use crate::{
    context::MigrateContext,
    engine::{finish_file, migrate, Direction, OwnedArtifact},
    error::OperationResult,
    report::{Report, ReportSummary},
};

/// Syncs the latest exported catalog of each selected package type.
///
/// Packages that already exist in the target organization are skipped whole.
pub async fn sync(ctx: &MigrateContext) -> OperationResult<ReportSummary> {
    ctx.config().source_organization()?;
    ctx.config().target_organization()?;
    migrate(ctx, Direction::Upload).await
}

/// Uploads the files of one version through the provider's batch upload.
pub(crate) async fn upload_version(
    ctx: &MigrateContext,
    report: &Report,
    op_id: OperationId,
    provider: &Arc<dyn Provider>,
    artifacts: Vec<OwnedArtifact>,
) -> Vec<ResultState> {
    if artifacts.is_empty() {
        return Vec::new();
    }
    let package_type = provider.package_type();
    let provider = provider.clone();
    let batch = artifacts.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let refs: Vec<ArtifactRef> = batch.iter().map(OwnedArtifact::artifact).collect();
        provider.upload_batch(&refs)
    })
    .await;

    let mut results = match joined {
        Ok(results) => results.into_iter(),
        Err(err) => {
            ctx.log(LogLevel::Error, format!("Upload task failed: {err}"));
            Vec::new().into_iter()
        }
    };

    artifacts
        .iter()
        .map(|artifact| {
            let state = match results.next() {
                Some(Ok(state)) => state,
                Some(Err(err)) => {
                    ctx.log(
                        LogLevel::Error,
                        format!(
                            "Error uploading {}@{} ({}): {err}",
                            artifact.package_name, artifact.version, artifact.filename
                        ),
                    );
                    ResultState::Failed
                }
                None => ResultState::Failed,
            };
            finish_file(ctx, report, op_id, package_type, artifact, state)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::Path, sync::Mutex};

    use flate2::{write::GzEncoder, Compression};
    use ghmpkg_core::{
        api::{PackageInfo, VersionInfo},
        layout::LocalLayout,
        PackageType,
    };
    use ghmpkg_dl::{
        error::TransportError,
        transport::{Transport, UploadStatus},
    };
    use ghmpkg_events::CollectorSink;
    use ghmpkg_provider::{
        tool::{ToolCommand, ToolOutput},
        DefaultProviderFactory, DockerCli, ProviderContext, ProviderFactory, ToolRunner,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        context::registry_settings,
        engine::tests::{test_config, test_context, ScriptedFactory, StaticApi},
        export::export,
        pull::pull,
    };

    /// Registry that serves one packument and one tarball.
    struct FakeRegistry {
        packument: Value,
        tarball: Vec<u8>,
        downloads: Mutex<Vec<String>>,
    }

    impl Transport for FakeRegistry {
        fn download(&self, url: &str, _token: &str, dest: &Path) -> Result<u64, TransportError> {
            self.downloads.lock().unwrap().push(url.to_string());
            std::fs::write(dest, &self.tarball).unwrap();
            Ok(self.tarball.len() as u64)
        }

        fn upload(&self, _url: &str, _token: &str, _path: &Path) -> Result<UploadStatus, TransportError> {
            Ok(UploadStatus::Created)
        }

        fn get_json(&self, _url: &str, _token: &str) -> Result<Value, TransportError> {
            Ok(self.packument.clone())
        }

        fn post_json(&self, _url: &str, _token: &str, _body: &Value) -> Result<Value, TransportError> {
            Ok(Value::Null)
        }

        fn status(&self, _url: &str, _token: &str) -> Result<u16, TransportError> {
            Ok(200)
        }
    }

    #[derive(Default)]
    struct QuietRunner {
        commands: Mutex<Vec<ToolCommand>>,
    }

    impl ToolRunner for QuietRunner {
        fn run(&self, command: &ToolCommand) -> ghmpkg_provider::Result<ToolOutput> {
            self.commands.lock().unwrap().push(command.clone());
            Ok(ToolOutput {
                status: Some(0),
                stdout: String::new(),
            })
        }
    }

    fn npm_tarball(manifest: &str) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "package/package.json", manifest.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test]
    async fn test_npm_export_pull_sync() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.package_types = Some(vec!["npm".into()]);

        let manifest = r#"{"name":"@acme/ui","version":"1.0.0"}"#;
        let tarball = npm_tarball(manifest);

        let registry = Arc::new(FakeRegistry {
            packument: json!({
                "versions": {
                    "1.0.0": {
                        "dist": {
                            "tarball": "https://npm.pkg.github.com/download/@acme/ui/1.0.0/f00dfeed"
                        }
                    }
                }
            }),
            tarball,
            downloads: Mutex::new(Vec::new()),
        });
        let runner = Arc::new(QuietRunner::default());
        let source = Arc::new(StaticApi {
            packages: vec![PackageInfo {
                name: "ui".into(),
                repository: "web".into(),
            }],
            versions: HashMap::from([(
                "ui".to_string(),
                vec![VersionInfo {
                    id: 1,
                    name: "1.0.0".into(),
                    tags: Vec::new(),
                }],
            )]),
            ..Default::default()
        });

        let layout = LocalLayout::new(dir.path());
        let provider_ctx = Arc::new(ProviderContext {
            settings: registry_settings(&config),
            layout: layout.clone(),
            transport: registry.clone(),
            runner: runner.clone(),
            api: source.clone(),
        });
        let engine = Arc::new(DockerCli::new(runner.clone(), dir.path().join(".docker")));
        let factory = Arc::new(DefaultProviderFactory::new(provider_ctx, engine));
        let ctx = MigrateContext::from_parts(
            config,
            Arc::new(CollectorSink::default()),
            layout,
            source,
            Arc::new(StaticApi::default()),
            factory,
        );

        let exported = export(&ctx).await.unwrap();
        assert_eq!(exported.files.success, 1);

        let pulled = pull(&ctx).await.unwrap();
        assert_eq!(pulled.files.success, 1);
        assert_eq!(registry.downloads.lock().unwrap().len(), 1);

        let synced = sync(&ctx).await.unwrap();
        assert_eq!(synced.title, "Sync");
        assert_eq!(synced.files.success, 1);
        assert_eq!(synced.versions.success, 1);
        assert_eq!(synced.packages.success, 1);
        assert_eq!(synced.by_type[&PackageType::Npm].packages, 1);
        assert!(!synced.has_failures());

        let version_dir = dir.path().join("packages/acme/npm/ui/1.0.0");
        let rewritten =
            std::fs::read_to_string(version_dir.join("package/package.json")).unwrap();
        assert!(rewritten.contains("@acme-new/ui"));
        let npmrc = std::fs::read_to_string(version_dir.join(".npmrc")).unwrap();
        assert!(npmrc.contains("registry=https://npm.pkg.github.com/acme-new"));

        let commands = runner.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, "npm");
        assert_eq!(commands[0].args[0], "publish");

        let repeat = pull(&ctx).await.unwrap();
        assert_eq!(repeat.files.skipped, 1);
        assert_eq!(registry.downloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_version_maps_batch_results() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ScriptedFactory {
            outcomes: HashMap::from([
                ("lib-1.0.0.pom".to_string(), ResultState::Failed),
                ("lib-1.0.0.module".to_string(), ResultState::Skipped),
            ]),
            ..Default::default()
        };
        let provider: Arc<dyn Provider> = Arc::from(factory.create(PackageType::Maven).unwrap());
        let ctx = test_context(
            test_config(dir.path()),
            Arc::new(ScriptedFactory::default()),
            StaticApi::default(),
            StaticApi::default(),
            Arc::new(CollectorSink::default()),
        );
        let report = Report::new("Sync");
        let artifacts = ["lib-1.0.0.jar", "lib-1.0.0.pom", "lib-1.0.0.module"]
            .iter()
            .map(|file| {
                OwnedArtifact {
                    owner: "acme-new".into(),
                    repository: "libs".into(),
                    package_name: "com.acme.lib".into(),
                    version: "1.0.0".into(),
                    filename: file.to_string(),
                }
            })
            .collect();

        let states = upload_version(&ctx, &report, 7, &provider, artifacts).await;
        assert_eq!(
            states,
            vec![ResultState::Success, ResultState::Failed, ResultState::Skipped]
        );
        assert_eq!(report.summary().files.total(), 3);
    }

    #[tokio::test]
    async fn test_sync_requires_target_organization() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.target_organization = Some(String::new());
        let ctx = test_context(
            config,
            Arc::new(ScriptedFactory::default()),
            StaticApi::default(),
            StaticApi::default(),
            Arc::new(CollectorSink::default()),
        );
        assert!(sync(&ctx).await.is_err());
    }
}
