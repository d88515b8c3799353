//! Error types for the provider crate.

use std::path::PathBuf;

use ghmpkg_core::error::MigrateError;
use ghmpkg_dl::error::TransportError;
use ghmpkg_utils::error::FileSystemError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while enumerating, transferring or rewriting packages.
#[derive(Error, Diagnostic, Debug)]
pub enum ProviderError {
    #[error("Authentication with {registry} failed: {reason}")]
    #[diagnostic(
        code(ghmpkg_provider::auth),
        help("Check the organization and token settings for this registry")
    )]
    Auth { registry: String, reason: String },

    #[error("Failed to enumerate files of {package}: {reason}")]
    #[diagnostic(code(ghmpkg_provider::enumeration))]
    Enumeration { package: String, reason: String },

    #[error("Download of {url} failed")]
    #[diagnostic(code(ghmpkg_provider::download))]
    Download {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Upload to {url} failed")]
    #[diagnostic(code(ghmpkg_provider::upload))]
    Upload {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to rewrite {path}: {reason}")]
    #[diagnostic(code(ghmpkg_provider::rename))]
    Rename { path: PathBuf, reason: String },

    #[error("`{program}` exited with status {}", status.map_or_else(|| "unknown".to_string(), |s| s.to_string()))]
    #[diagnostic(
        code(ghmpkg_provider::tool),
        help("See the tool's log file next to the package for details")
    )]
    Tool {
        program: String,
        status: Option<i32>,
        log: Option<PathBuf>,
    },

    #[error("Failed to run `{program}`")]
    #[diagnostic(
        code(ghmpkg_provider::spawn),
        help("Make sure the tool is installed and on PATH")
    )]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact name `{0}`")]
    #[diagnostic(code(ghmpkg_provider::artifact))]
    InvalidArtifact(String),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg_provider::archive))]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] MigrateError),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg_provider::filesystem))]
    FileSystem(#[from] FileSystemError),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(ghmpkg_provider::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("{0}")]
    #[diagnostic(code(ghmpkg_provider::custom))]
    Custom(String),
}

/// A specialized Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            ProviderError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
