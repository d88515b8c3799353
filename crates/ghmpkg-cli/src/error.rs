use ghmpkg_config::error::ConfigError;
use ghmpkg_operations::OperationError;
use ghmpkg_utils::error::PathError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg_cli::path))]
    Path(#[from] PathError),

    #[error("Failed to render report: {0}")]
    #[diagnostic(code(ghmpkg_cli::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to resolve {action}: {source}")]
    #[diagnostic(code(ghmpkg_cli::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("{title} finished with failures")]
    #[diagnostic(
        code(ghmpkg_cli::failures),
        help("Re-run the same command; completed files are skipped")
    )]
    Failures { title: String },
}

pub type CliResult<T> = std::result::Result<T, CliError>;
