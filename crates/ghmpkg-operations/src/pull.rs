//! Downloads every cataloged file from the source organization.

use std::sync::Arc;

use ghmpkg_core::ResultState;
use ghmpkg_events::{LogLevel, OperationId};
use ghmpkg_provider::Provider;
use tokio::sync::Semaphore;

use crate::{
    context::MigrateContext,
    engine::{finish_file, migrate, Direction, OwnedArtifact},
    error::OperationResult,
    report::{Report, ReportSummary},
};

/// Pulls the latest exported catalog of each selected package type.
pub async fn pull(ctx: &MigrateContext) -> OperationResult<ReportSummary> {
    ctx.config().source_organization()?;
    migrate(ctx, Direction::Download).await
}

/// Downloads the files of one version concurrently.
///
/// At most `parallel_limit` transfers run at once. Every task is joined, and
/// failures are gathered into one logged error instead of cancelling siblings.
pub(crate) async fn download_version(
    ctx: &MigrateContext,
    report: &Report,
    op_id: OperationId,
    provider: &Arc<dyn Provider>,
    artifacts: Vec<OwnedArtifact>,
) -> Vec<ResultState> {
    let Some(first) = artifacts.first() else {
        return Vec::new();
    };
    let package_type = provider.package_type();
    let label = format!("{}@{}", first.package_name, first.version);

    let semaphore = Arc::new(Semaphore::new(ctx.config().parallel_limit().max(1)));
    let mut handles = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let semaphore = semaphore.clone();
        let provider = provider.clone();
        let handle = tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            let (artifact, result) = tokio::task::spawn_blocking(move || {
                let result = provider.download(&artifact.artifact());
                (artifact, result)
            })
            .await?;
            drop(permit);
            Ok::<_, tokio::task::JoinError>((artifact, result))
        });
        handles.push(handle);
    }

    let mut states = Vec::with_capacity(handles.len());
    let mut errors = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Ok((artifact, Ok(state)))) => {
                states.push(finish_file(ctx, report, op_id, package_type, &artifact, state));
            }
            Ok(Ok((artifact, Err(err)))) => {
                errors.push(format!("{}: {err}", artifact.filename));
                states.push(finish_file(
                    ctx,
                    report,
                    op_id,
                    package_type,
                    &artifact,
                    ResultState::Failed,
                ));
            }
            Ok(Err(err)) | Err(err) => {
                errors.push(err.to_string());
                report.record_file(package_type, ResultState::Failed);
                states.push(ResultState::Failed);
            }
        }
    }

    if !errors.is_empty() {
        ctx.log(
            LogLevel::Error,
            format!("Error downloading {label}: {}", errors.join("; ")),
        );
    }
    states
}
