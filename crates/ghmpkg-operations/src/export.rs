//! Enumerates the source organization's packages into catalog CSV files.

use std::{path::PathBuf, sync::Arc};

use chrono::Local;
use ghmpkg_core::{
    catalog::PackageRecord,
    csv::{catalog_file_name, write_catalog},
    PackageType, ResultState,
};
use ghmpkg_events::{MigrateEvent, Outcome, RunStage};
use tracing::{debug, info};

use crate::{
    context::MigrateContext,
    error::OperationResult,
    progress::next_op_id,
    report::{Report, ReportSummary},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Packages GitHub keeps around after deletion carry this prefix.
const DELETED_PREFIX: &str = "deleted_";

/// Writes one catalog per selected package type and reports what was found.
pub async fn export(ctx: &MigrateContext) -> OperationResult<ReportSummary> {
    let organization = ctx.config().source_organization()?.to_string();
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let report = Arc::new(Report::new("Export"));

    info!(organization = %organization, "exporting packages");
    for package_type in ctx.package_types()? {
        let task_ctx = ctx.clone();
        let task_report = report.clone();
        let task_org = organization.clone();
        let task_timestamp = timestamp.clone();
        let path = tokio::task::spawn_blocking(move || {
            export_type(
                &task_ctx,
                &task_org,
                package_type,
                &task_timestamp,
                &task_report,
            )
        })
        .await??;
        info!(path = %path.display(), "wrote {package_type} catalog");
    }

    Ok(report.summary())
}

fn export_type(
    ctx: &MigrateContext,
    organization: &str,
    package_type: PackageType,
    timestamp: &str,
    report: &Report,
) -> OperationResult<PathBuf> {
    let events = ctx.events();
    let provider = ctx.factory().create(package_type)?;
    let api = ctx.source_api();

    let packages: Vec<_> = api
        .list_packages(organization, package_type)?
        .into_iter()
        .filter(|package| !package.name.starts_with(DELETED_PREFIX))
        .collect();
    events.emit(MigrateEvent::RunStarted {
        stage: RunStage::Export,
        package_type: package_type.to_string(),
        packages: packages.len() as u32,
    });

    let mut records = Vec::new();
    for package in &packages {
        let op_id = next_op_id();
        let versions = api.list_versions(organization, package_type, &package.name)?;
        events.emit(MigrateEvent::PackageStarted {
            op_id,
            package_type: package_type.to_string(),
            package_name: package.name.clone(),
            versions: versions.len() as u32,
        });

        for version in &versions {
            let files = provider.fetch_package_files(
                organization,
                &package.repository,
                &package.name,
                version,
            )?;
            debug!(package = %package.name, version = %version.name, files = files.len(), "listed files");
            for filename in files {
                report.record_file(package_type, ResultState::Success);
                records.push(PackageRecord::new(
                    organization,
                    &package.repository,
                    package_type,
                    &package.name,
                    &version.name,
                    filename,
                ));
            }
            report.record_version(package_type, ResultState::Success);
        }

        report.record_package(package_type, ResultState::Success);
        events.emit(MigrateEvent::PackageFinished {
            op_id,
            package_type: package_type.to_string(),
            package_name: package.name.clone(),
            outcome: Outcome::Success,
        });
    }

    let path = ctx
        .layout()
        .export_dir(package_type)
        .join(catalog_file_name(timestamp, organization, package_type.as_str()));
    write_catalog(&path, &records)?;
    events.emit(MigrateEvent::RunFinished {
        stage: RunStage::Export,
        package_type: package_type.to_string(),
    });
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ghmpkg_core::{
        api::{PackageInfo, VersionInfo},
        csv::{latest_catalog_file, read_catalog},
    };
    use ghmpkg_events::CollectorSink;

    use super::*;
    use crate::engine::tests::{test_config, test_context, ScriptedFactory, StaticApi};

    fn version(id: u64, name: &str) -> VersionInfo {
        VersionInfo {
            id,
            name: name.into(),
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_export_writes_catalog_and_skips_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.package_types = Some(vec!["npm".into()]);
        let source = StaticApi {
            packages: vec![
                PackageInfo {
                    name: "ui".into(),
                    repository: "web".into(),
                },
                PackageInfo {
                    name: "deleted_ui".into(),
                    repository: "web".into(),
                },
            ],
            versions: HashMap::from([(
                "ui".to_string(),
                vec![version(2, "1.1.0"), version(1, "1.0.0")],
            )]),
            ..Default::default()
        };
        let ctx = test_context(
            config,
            Arc::new(ScriptedFactory::default()),
            source,
            StaticApi::default(),
            Arc::new(CollectorSink::default()),
        );

        let summary = export(&ctx).await.unwrap();
        assert_eq!(summary.title, "Export");
        assert_eq!(summary.packages.success, 1);
        assert_eq!(summary.versions.success, 2);
        assert_eq!(summary.files.success, 2);

        let path = latest_catalog_file(ctx.layout().export_dir(PackageType::Npm))
            .unwrap()
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_acme_npm_packages.csv"));

        let records = read_catalog(&path).unwrap();
        assert_eq!(
            records,
            vec![
                PackageRecord::new("acme", "web", PackageType::Npm, "ui", "1.1.0", "ui-1.1.0.tgz"),
                PackageRecord::new("acme", "web", PackageType::Npm, "ui", "1.0.0", "ui-1.0.0.tgz"),
            ]
        );
    }

    #[tokio::test]
    async fn test_export_requires_source_organization() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.source_organization = None;
        let ctx = test_context(
            config,
            Arc::new(ScriptedFactory::default()),
            StaticApi::default(),
            StaticApi::default(),
            Arc::new(CollectorSink::default()),
        );
        assert!(export(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_export_empty_type_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.package_types = Some(vec!["rubygems".into()]);
        let ctx = test_context(
            config,
            Arc::new(ScriptedFactory::default()),
            StaticApi::default(),
            StaticApi::default(),
            Arc::new(CollectorSink::default()),
        );

        let summary = export(&ctx).await.unwrap();
        assert_eq!(summary.packages.total(), 0);
        let path = latest_catalog_file(ctx.layout().export_dir(PackageType::Rubygems))
            .unwrap()
            .unwrap();
        assert!(read_catalog(path).unwrap().is_empty());
    }
}
