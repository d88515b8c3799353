use std::{
    collections::HashMap,
    sync::{mpsc::Receiver, LazyLock},
    time::Duration,
};

use ghmpkg_events::{MigrateEvent, OperationId, Outcome, RunStage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};

use crate::utils::{Colored, Icons};

/// Shared MultiProgress instance for suspend/stop from other modules.
static MULTI: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

const TICK: Duration = Duration::from_millis(100);

/// Pause progress display, run the closure, then resume.
pub fn suspend<F: FnOnce()>(f: F) {
    MULTI.suspend(f);
}

/// Stop and clear all progress bars.
pub fn stop() {
    MULTI.clear().ok();
}

/// Owns the background thread that renders progress events.
///
/// The [`MigrateContext`](ghmpkg_operations::MigrateContext) holding the channel sender
/// must be dropped before [`finish`](ProgressGuard::finish), or the join never returns.
pub struct ProgressGuard {
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressGuard {
    pub fn finish(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn run_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix}  {wide_bar:.cyan/dim}  {pos}/{len}  {msg}")
        .map(|style| style.progress_chars("━━─"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner(message: String) -> ProgressBar {
    let pb = MULTI.add(ProgressBar::new_spinner());
    pb.set_style(spinner_style());
    pb.set_message(message);
    pb.enable_steady_tick(TICK);
    pb
}

fn stage_name(stage: RunStage) -> &'static str {
    match stage {
        RunStage::Export => "Exporting",
        RunStage::Pull => "Pulling",
        RunStage::Sync => "Syncing",
    }
}

fn outcome_line(package_type: &str, package_name: &str, outcome: Outcome) -> String {
    let (icon, label) = match outcome {
        Outcome::Success => (Colored(Green, Icons::CHECK), Colored(Green, "done")),
        Outcome::Skipped => (Colored(Yellow, Icons::SKIP), Colored(Yellow, "skipped")),
        Outcome::Failed => (Colored(Red, Icons::CROSS), Colored(Red, "failed")),
    };
    format!(
        " {icon} {}/{}: {label}",
        package_type,
        Colored(Cyan, package_name)
    )
}

/// Spawns a thread that maps [`MigrateEvent`]s to indicatif progress bars.
///
/// Each run gets one bar counting finished packages; each package in flight gets a
/// spinner that follows its current version and is cleared when the package finishes.
pub fn spawn_event_handler(receiver: Receiver<MigrateEvent>) -> ProgressGuard {
    let handle = std::thread::spawn(move || {
        let mut jobs: HashMap<OperationId, ProgressBar> = HashMap::new();
        let mut run_job: Option<ProgressBar> = None;
        let mut connect_job: Option<ProgressBar> = None;

        while let Ok(event) = receiver.recv() {
            match event {
                MigrateEvent::Connecting {
                    package_type,
                } => {
                    if let Some(pb) = connect_job.take() {
                        pb.finish_and_clear();
                    }
                    connect_job = Some(spinner(format!("{package_type}: connecting")));
                }
                MigrateEvent::RunStarted {
                    stage,
                    package_type,
                    packages,
                } => {
                    if let Some(pb) = run_job.take() {
                        pb.finish_and_clear();
                    }
                    let pb = MULTI.add(ProgressBar::new(packages as u64));
                    pb.set_style(run_style());
                    pb.set_prefix(format!("{} {package_type}", stage_name(stage)));
                    pb.enable_steady_tick(TICK);
                    run_job = Some(pb);
                }
                MigrateEvent::PackageStarted {
                    op_id,
                    package_name,
                    versions,
                    ..
                } => {
                    if let Some(pb) = connect_job.take() {
                        pb.finish_and_clear();
                    }
                    jobs.insert(
                        op_id,
                        spinner(format!("{package_name}: {versions} version(s)")),
                    );
                }
                MigrateEvent::VersionStarted {
                    op_id,
                    package_name,
                    version,
                    files,
                } => {
                    if let Some(pb) = jobs.get(&op_id) {
                        pb.set_message(format!("{package_name}@{version}: {files} file(s)"));
                    }
                }
                MigrateEvent::FileFinished {
                    package_name,
                    version,
                    filename,
                    outcome: Outcome::Failed,
                    ..
                } => {
                    MULTI.suspend(|| {
                        eprintln!(
                            "   {} {package_name}@{version} {filename}",
                            Colored(Red, Icons::CROSS)
                        );
                    });
                }
                MigrateEvent::PackageFinished {
                    op_id,
                    package_type,
                    package_name,
                    outcome,
                } => {
                    if let Some(pb) = connect_job.take() {
                        pb.finish_and_clear();
                    }
                    if let Some(pb) = jobs.remove(&op_id) {
                        pb.finish_and_clear();
                    }
                    let line = outcome_line(&package_type, &package_name, outcome);
                    MULTI.suspend(|| eprintln!("{line}"));
                }
                MigrateEvent::BatchProgress {
                    completed,
                    failed,
                    ..
                } => {
                    if let Some(pb) = &run_job {
                        pb.set_position(completed as u64);
                        if failed > 0 {
                            pb.set_message(format!("{failed} failed"));
                        }
                    }
                }
                MigrateEvent::RunFinished {
                    ..
                } => {
                    if let Some(pb) = run_job.take() {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }

        for pb in run_job.into_iter().chain(connect_job).chain(jobs.into_values()) {
            pb.finish_and_clear();
        }
    });

    ProgressGuard {
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use ghmpkg_events::ChannelSink;
    use ghmpkg_events::EventSink;
    use serial_test::serial;

    use super::*;
    use crate::utils::set_color;

    #[test]
    #[serial]
    fn test_outcome_line_plain() {
        set_color(false);
        assert_eq!(
            outcome_line("npm", "ui", Outcome::Skipped),
            format!(" {} npm/ui: skipped", Icons::SKIP)
        );
        set_color(true);
    }

    #[test]
    fn test_handler_drains_and_exits() {
        let (sink, receiver) = ChannelSink::new();
        let guard = spawn_event_handler(receiver);
        sink.emit(MigrateEvent::RunStarted {
            stage: RunStage::Pull,
            package_type: "npm".into(),
            packages: 1,
        });
        sink.emit(MigrateEvent::PackageStarted {
            op_id: 1,
            package_type: "npm".into(),
            package_name: "ui".into(),
            versions: 1,
        });
        sink.emit(MigrateEvent::BatchProgress {
            completed: 1,
            total: 1,
            failed: 0,
        });
        sink.emit(MigrateEvent::RunFinished {
            stage: RunStage::Pull,
            package_type: "npm".into(),
        });
        drop(sink);
        guard.finish();
    }
}
