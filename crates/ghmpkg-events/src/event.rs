use crate::OperationId;

/// All event types emitted by migration operations.
#[derive(Debug, Clone)]
pub enum MigrateEvent {
    /// A run over one package type is starting.
    RunStarted {
        stage: RunStage,
        package_type: String,
        packages: u32,
    },
    /// Registry session is being established for a package type.
    Connecting { package_type: String },
    /// Work on a package is starting.
    PackageStarted {
        op_id: OperationId,
        package_type: String,
        package_name: String,
        versions: u32,
    },
    /// Work on a version is starting.
    VersionStarted {
        op_id: OperationId,
        package_name: String,
        version: String,
        files: u32,
    },
    /// A single file finished transferring.
    FileFinished {
        op_id: OperationId,
        package_name: String,
        version: String,
        filename: String,
        outcome: Outcome,
    },
    /// A version finished; the outcome is rolled up from its files.
    VersionFinished {
        op_id: OperationId,
        package_name: String,
        version: String,
        outcome: Outcome,
    },
    /// A package finished; the outcome is rolled up from its versions.
    PackageFinished {
        op_id: OperationId,
        package_type: String,
        package_name: String,
        outcome: Outcome,
    },
    /// Overall progress across the packages of a run.
    BatchProgress {
        completed: u32,
        total: u32,
        failed: u32,
    },
    /// A run over one package type finished.
    RunFinished { stage: RunStage, package_type: String },
    /// Log message.
    Log { level: LogLevel, message: String },
}

/// Kind of run being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Enumerating the source catalog.
    Export,
    /// Downloading packages from the source registry.
    Pull,
    /// Uploading packages to the target registry.
    Sync,
}

/// Terminal outcome of a file, version or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Skipped,
    Failed,
}

/// Log levels for event-based logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}
