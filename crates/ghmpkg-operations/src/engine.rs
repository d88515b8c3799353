//! Walks a catalog package by package and drives one provider per package type.

use std::sync::Arc;

use ghmpkg_core::{
    catalog::{Catalog, GroupKey},
    csv::{latest_catalog_file, read_catalog},
    PackageType, ResultState,
};
use ghmpkg_events::{LogLevel, MigrateEvent, OperationId, RunStage};
use ghmpkg_provider::{ArtifactRef, Provider};
use tracing::{debug, info};

use crate::{
    context::MigrateContext,
    error::OperationResult,
    progress::{next_op_id, BatchTracker},
    pull::download_version,
    report::{Report, ReportSummary},
    sync::upload_version,
};

/// Which way files move during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Source registry to the local work directory.
    Download,
    /// Local work directory to the target registry.
    Upload,
}

impl Direction {
    pub fn stage(self) -> RunStage {
        match self {
            Direction::Download => RunStage::Pull,
            Direction::Upload => RunStage::Sync,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Direction::Download => "Pull",
            Direction::Upload => "Sync",
        }
    }
}

/// Owned form of [`ArtifactRef`] that can move into a blocking task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedArtifact {
    pub owner: String,
    pub repository: String,
    pub package_name: String,
    pub version: String,
    pub filename: String,
}

impl OwnedArtifact {
    pub fn artifact(&self) -> ArtifactRef<'_> {
        ArtifactRef::new(
            &self.owner,
            &self.repository,
            &self.package_name,
            &self.version,
            &self.filename,
        )
    }
}

/// Records one file outcome and emits its event.
pub(crate) fn finish_file(
    ctx: &MigrateContext,
    report: &Report,
    op_id: OperationId,
    package_type: PackageType,
    artifact: &OwnedArtifact,
    state: ResultState,
) -> ResultState {
    report.record_file(package_type, state);
    ctx.events().emit(MigrateEvent::FileFinished {
        op_id,
        package_name: artifact.package_name.clone(),
        version: artifact.version.clone(),
        filename: artifact.filename.clone(),
        outcome: state.into(),
    });
    state
}

/// Drives providers over the groups of a catalog, feeding a shared [`Report`].
pub struct TransferEngine<'a> {
    ctx: &'a MigrateContext,
    direction: Direction,
    report: Arc<Report>,
}

impl<'a> TransferEngine<'a> {
    pub fn new(ctx: &'a MigrateContext, direction: Direction, report: Arc<Report>) -> Self {
        Self {
            ctx,
            direction,
            report,
        }
    }

    /// Processes every package of `catalog` in encounter order.
    ///
    /// A provider is created and connected lazily whenever the package type changes.
    /// When that fails, every group of the type is marked failed and the run moves on.
    pub async fn run(&self, catalog: &Catalog) -> OperationResult<()> {
        let target_org = match self.direction {
            Direction::Upload => Some(self.ctx.config().target_organization()?.to_string()),
            Direction::Download => None,
        };

        let groups = catalog.groups();
        let mut tracker = BatchTracker::new(self.ctx.events().clone(), groups.len() as u32);
        let mut active: Option<(PackageType, Option<Arc<dyn Provider>>)> = None;

        for group in &groups {
            let package_type = group.package_type;
            if active.as_ref().map(|(ty, _)| *ty) != Some(package_type) {
                active = Some((package_type, self.activate(package_type).await));
            }

            let provider = active.as_ref().and_then(|(_, provider)| provider.clone());
            let state = match provider {
                Some(provider) => {
                    self.process_package(catalog, group, provider, target_org.as_deref())
                        .await
                }
                None => self.finish_package(next_op_id(), group, ResultState::Failed),
            };
            tracker.package_done(state.into());
        }
        Ok(())
    }

    async fn activate(&self, package_type: PackageType) -> Option<Arc<dyn Provider>> {
        info!(package_type = %package_type, "creating provider");
        self.ctx.events().emit(MigrateEvent::Connecting {
            package_type: package_type.to_string(),
        });

        let factory = self.ctx.factory().clone();
        let connected = tokio::task::spawn_blocking(move || {
            let mut provider = factory.create(package_type)?;
            provider.connect()?;
            Ok::<_, ghmpkg_provider::ProviderError>(provider)
        })
        .await;

        match connected {
            Ok(Ok(provider)) => Some(Arc::from(provider)),
            Ok(Err(err)) => {
                self.ctx.log(
                    LogLevel::Error,
                    format!("Error connecting {package_type} provider: {err}"),
                );
                None
            }
            Err(err) => {
                self.ctx.log(
                    LogLevel::Error,
                    format!("Error connecting {package_type} provider: {err}"),
                );
                None
            }
        }
    }

    async fn target_has_package(
        &self,
        org: &str,
        package_type: PackageType,
        package_name: &str,
    ) -> OperationResult<bool> {
        let api = self.ctx.target_api().clone();
        let org = org.to_string();
        let name = package_name.to_string();
        let exists =
            tokio::task::spawn_blocking(move || api.package_exists(&org, package_type, &name))
                .await??;
        Ok(exists)
    }

    async fn process_package(
        &self,
        catalog: &Catalog,
        group: &GroupKey,
        provider: Arc<dyn Provider>,
        target_org: Option<&str>,
    ) -> ResultState {
        let package_type = group.package_type;
        let op_id = next_op_id();
        let versions = catalog.versions(group);

        self.ctx.events().emit(MigrateEvent::PackageStarted {
            op_id,
            package_type: package_type.to_string(),
            package_name: group.package_name.clone(),
            versions: versions.len() as u32,
        });

        if let Some(org) = target_org {
            match self
                .target_has_package(org, package_type, &group.package_name)
                .await
            {
                Ok(true) => {
                    info!(package = %group.package_name, "Package already exists, skipping");
                    return self.finish_package(op_id, group, ResultState::Skipped);
                }
                Ok(false) => {}
                Err(err) => {
                    self.ctx.log(
                        LogLevel::Error,
                        format!("Error checking target for {}: {err}", group.package_name),
                    );
                    return self.finish_package(op_id, group, ResultState::Failed);
                }
            }
        }

        let owner = target_org.unwrap_or(&group.organization);
        let mut states = Vec::with_capacity(versions.len());
        for version in &versions {
            let artifacts: Vec<OwnedArtifact> = catalog
                .filenames(group, version)
                .into_iter()
                .map(|filename| {
                    OwnedArtifact {
                        owner: owner.to_string(),
                        repository: group.repository.clone(),
                        package_name: group.package_name.clone(),
                        version: version.clone(),
                        filename,
                    }
                })
                .collect();

            debug!(package = %group.package_name, version = %version, files = artifacts.len(), "processing version");
            self.ctx.events().emit(MigrateEvent::VersionStarted {
                op_id,
                package_name: group.package_name.clone(),
                version: version.clone(),
                files: artifacts.len() as u32,
            });

            let file_states = match self.direction {
                Direction::Download => {
                    download_version(self.ctx, &self.report, op_id, &provider, artifacts).await
                }
                Direction::Upload => {
                    upload_version(self.ctx, &self.report, op_id, &provider, artifacts).await
                }
            };

            let state = ResultState::roll_up(file_states);
            self.report.record_version(package_type, state);
            self.ctx.events().emit(MigrateEvent::VersionFinished {
                op_id,
                package_name: group.package_name.clone(),
                version: version.clone(),
                outcome: state.into(),
            });
            states.push(state);
        }

        self.finish_package(op_id, group, ResultState::roll_up(states))
    }

    fn finish_package(&self, op_id: OperationId, group: &GroupKey, state: ResultState) -> ResultState {
        self.report.record_package(group.package_type, state);
        self.ctx.events().emit(MigrateEvent::PackageFinished {
            op_id,
            package_type: group.package_type.to_string(),
            package_name: group.package_name.clone(),
            outcome: state.into(),
        });
        state
    }
}

/// Loads the latest exported catalog of each selected type and transfers it.
pub(crate) async fn migrate(ctx: &MigrateContext, direction: Direction) -> OperationResult<ReportSummary> {
    let report = Arc::new(Report::new(direction.title()));
    let engine = TransferEngine::new(ctx, direction, report.clone());

    for package_type in ctx.package_types()? {
        let export_dir = ctx.layout().export_dir(package_type);
        let Some(path) = latest_catalog_file(&export_dir)? else {
            ctx.log(
                LogLevel::Warning,
                format!(
                    "No {package_type} catalog found in {}. Are you sure you exported first?",
                    export_dir.display()
                ),
            );
            continue;
        };

        info!(path = %path.display(), "loading catalog");
        let catalog = Catalog::new(read_catalog(&path)?, ctx.config().catalog_order());

        ctx.events().emit(MigrateEvent::RunStarted {
            stage: direction.stage(),
            package_type: package_type.to_string(),
            packages: catalog.package_count(package_type) as u32,
        });
        engine.run(&catalog).await?;
        ctx.events().emit(MigrateEvent::RunFinished {
            stage: direction.stage(),
            package_type: package_type.to_string(),
        });
    }

    Ok(report.summary())
}
