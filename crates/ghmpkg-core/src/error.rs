//! Error types for ghmpkg-core.

use ghmpkg_config::error::ConfigError;
use ghmpkg_dl::error::TransportError;
use ghmpkg_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

/// Core error type for package migration operations.
#[derive(Error, Diagnostic, Debug)]
pub enum MigrateError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg::filesystem), help("Check file permissions and disk space"))]
    FileSystemError(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg::path))]
    PathError(#[from] PathError),

    #[error("Error while {action}")]
    #[diagnostic(code(ghmpkg::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported package type: {0}")]
    #[diagnostic(
        code(ghmpkg::package_type),
        help("Supported package types are: maven, npm, container, rubygems, nuget")
    )]
    UnsupportedPackageType(String),

    #[error("Invalid catalog {path}: {reason}")]
    #[diagnostic(
        code(ghmpkg::catalog),
        help("Re-run 'gh-migrate-packages export' to regenerate the catalog")
    )]
    InvalidCatalog { path: String, reason: String },

    #[error("Unexpected response from the packages API: {0}")]
    #[diagnostic(code(ghmpkg::api))]
    InvalidApiResponse(String),

    #[error("{0}")]
    #[diagnostic(code(ghmpkg::error))]
    Custom(String),
}

impl MigrateError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, MigrateError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, MigrateError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            MigrateError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_wraps_io_error() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = result
            .with_context(|| "reading catalog".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while reading catalog");
    }

    #[test]
    fn test_invalid_catalog_message() {
        let err = MigrateError::InvalidCatalog {
            path: "export/npm/x.csv".into(),
            reason: "missing header".into(),
        };
        assert_eq!(
            err.message(),
            "Invalid catalog export/npm/x.csv: missing header"
        );
    }
}
