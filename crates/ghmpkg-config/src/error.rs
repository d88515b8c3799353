use ghmpkg_utils::error::{FileSystemError, PathError, UtilsError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(ghmpkg_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(ghmpkg_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    #[diagnostic(
        code(ghmpkg_config::missing_value),
        help("Set it in config.toml, the matching GHMPKG_* environment variable, or a command-line flag")
    )]
    MissingValue(&'static str),

    #[error("Unsupported package type: {0}")]
    #[diagnostic(
        code(ghmpkg_config::unsupported_package_type),
        help("Supported package types are: maven, npm, container, rubygems, nuget")
    )]
    UnsupportedPackageType(String),

    #[error("Invalid duration for {key}: {value}")]
    #[diagnostic(
        code(ghmpkg_config::invalid_duration),
        help("Use a duration such as 500ms, 1s or 1m30s")
    )]
    InvalidDuration { key: &'static str, value: String },

    #[error("Invalid value for {key}: {reason}")]
    #[diagnostic(code(ghmpkg_config::invalid_value))]
    InvalidValue { key: &'static str, reason: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(ghmpkg_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg_config::utils))]
    Utils(#[from] UtilsError),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_message() {
        let err = ConfigError::MissingValue("source_organization");
        assert_eq!(
            err.to_string(),
            "Missing required setting: source_organization"
        );
    }

    #[test]
    fn test_invalid_duration_message() {
        let err = ConfigError::InvalidDuration {
            key: "retry_delay",
            value: "soon".into(),
        };
        assert_eq!(err.to_string(), "Invalid duration for retry_delay: soon");
    }

    #[test]
    fn test_path_error_conversion() {
        let err: ConfigError = PathError::Empty.into();
        assert!(matches!(err, ConfigError::Utils(UtilsError::Path(_))));
    }
}
