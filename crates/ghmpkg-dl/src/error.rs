use ghmpkg_utils::error::FileSystemError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum TransportError {
    #[error("Invalid URL: {url}")]
    #[diagnostic(code(ghmpkg_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(ghmpkg_dl::network),
        help("Check your internet connection or proxy settings and try again")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(ghmpkg_dl::http_error))]
    HttpError { status: u16, url: String },

    #[error(transparent)]
    #[diagnostic(code(ghmpkg_dl::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(ghmpkg_dl::filesystem))]
    FileSystem(#[from] FileSystemError),

    #[error("Invalid response from {url}")]
    #[diagnostic(
        code(ghmpkg_dl::invalid_response),
        help("The registry returned a body that could not be parsed")
    )]
    InvalidResponse { url: String },
}

impl TransportError {
    /// Whether the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::HttpError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
