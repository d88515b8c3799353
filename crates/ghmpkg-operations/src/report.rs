//! Outcome counters for one run.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use ghmpkg_core::{PackageType, ResultState};
use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    success: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn add(&self, state: ResultState) {
        let counter = match state {
            ResultState::Success => &self.success,
            ResultState::Skipped => &self.skipped,
            ResultState::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CountSummary {
        CountSummary {
            success: self.success.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Success/skip/failure counts at one granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountSummary {
    pub success: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl CountSummary {
    pub fn total(&self) -> u64 {
        self.success + self.skipped + self.failed
    }
}

/// Successful transfers of one package type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeSuccess {
    pub packages: u64,
    pub versions: u64,
    pub files: u64,
}

/// Serializable snapshot of a [`Report`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub title: String,
    pub packages: CountSummary,
    pub versions: CountSummary,
    pub files: CountSummary,
    pub by_type: BTreeMap<PackageType, TypeSuccess>,
}

impl ReportSummary {
    pub fn has_failures(&self) -> bool {
        self.packages.failed > 0 || self.versions.failed > 0 || self.files.failed > 0
    }
}

/// Counters shared by the concurrent transfer tasks of a run.
///
/// Every processed file, version and package is recorded exactly once.
#[derive(Debug, Default)]
pub struct Report {
    title: String,
    packages: Counters,
    versions: Counters,
    files: Counters,
    by_type: Mutex<BTreeMap<PackageType, TypeSuccess>>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    fn bump_type(&self, package_type: PackageType, f: impl FnOnce(&mut TypeSuccess)) {
        if let Ok(mut by_type) = self.by_type.lock() {
            f(by_type.entry(package_type).or_default());
        }
    }

    pub fn record_file(&self, package_type: PackageType, state: ResultState) {
        self.files.add(state);
        if state == ResultState::Success {
            self.bump_type(package_type, |t| t.files += 1);
        }
    }

    pub fn record_version(&self, package_type: PackageType, state: ResultState) {
        self.versions.add(state);
        if state == ResultState::Success {
            self.bump_type(package_type, |t| t.versions += 1);
        }
    }

    pub fn record_package(&self, package_type: PackageType, state: ResultState) {
        self.packages.add(state);
        if state == ResultState::Success {
            self.bump_type(package_type, |t| t.packages += 1);
        }
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            title: self.title.clone(),
            packages: self.packages.snapshot(),
            versions: self.versions.snapshot(),
            files: self.files.snapshot(),
            by_type: self
                .by_type
                .lock()
                .map(|by_type| by_type.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_counts_and_type_breakdown() {
        let report = Report::new("Sync");
        report.record_file(PackageType::Npm, ResultState::Success);
        report.record_file(PackageType::Npm, ResultState::Skipped);
        report.record_file(PackageType::Maven, ResultState::Failed);
        report.record_version(PackageType::Npm, ResultState::Skipped);
        report.record_package(PackageType::Npm, ResultState::Success);

        let summary = report.summary();
        assert_eq!(summary.title, "Sync");
        assert_eq!(
            summary.files,
            CountSummary {
                success: 1,
                skipped: 1,
                failed: 1
            }
        );
        assert_eq!(summary.files.total(), 3);
        assert_eq!(summary.versions.skipped, 1);
        assert_eq!(
            summary.by_type[&PackageType::Npm],
            TypeSuccess {
                packages: 1,
                versions: 0,
                files: 1
            }
        );
        assert!(!summary.by_type.contains_key(&PackageType::Maven));
        assert!(summary.has_failures());
    }

    #[test]
    fn test_concurrent_increments() {
        let report = Arc::new(Report::new("Pull"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let report = report.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        report.record_file(PackageType::Maven, ResultState::Success);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = report.summary();
        assert_eq!(summary.files.success, 800);
        assert_eq!(summary.by_type[&PackageType::Maven].files, 800);
    }

    #[test]
    fn test_summary_serializes() {
        let report = Report::new("Export");
        report.record_package(PackageType::Container, ResultState::Success);
        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["packages"]["success"], 1);
        assert_eq!(json["by_type"]["container"]["packages"], 1);
    }
}
