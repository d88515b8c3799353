use ghmpkg_config::error::ConfigError;
use ghmpkg_core::error::MigrateError;
use ghmpkg_dl::error::TransportError;
use ghmpkg_provider::ProviderError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum OperationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] MigrateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error("Transfer task failed: {0}")]
    #[diagnostic(code(ghmpkg_operations::task))]
    Task(String),

    #[error("{0}")]
    #[diagnostic(code(ghmpkg_operations::custom))]
    Custom(String),
}

impl From<tokio::task::JoinError> for OperationError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

pub type OperationResult<T> = std::result::Result<T, OperationError>;
