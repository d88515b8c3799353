use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

use ghmpkg_utils::fs::ensure_dir_exists;
use serde_json::Value;
use tracing::{debug, trace};
use ureq::{http::HeaderMap, Agent};

use crate::{
    error::{Result, TransportError},
    http_client::{apply_headers, parse_url, ClientConfig},
    rate::RateGuard,
    retry::RetryPolicy,
};

/// Result of a successful PUT to a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// The registry accepted the artifact.
    Created,
    /// The registry already holds the artifact (HTTP 409).
    Conflict,
}

/// Outbound HTTP operations used by providers and the catalog API.
///
/// Implementations must be safe to share between concurrent transfer tasks.
pub trait Transport: Send + Sync {
    /// GETs `url` with `Authorization: token <token>` and writes the body to `dest`.
    ///
    /// Returns the number of bytes written.
    fn download(&self, url: &str, token: &str, dest: &Path) -> Result<u64>;

    /// PUTs the file at `path` to `url` with a bearer token.
    fn upload(&self, url: &str, token: &str, path: &Path) -> Result<UploadStatus>;

    /// GETs `url` with a bearer token and parses the body as JSON.
    fn get_json(&self, url: &str, token: &str) -> Result<Value>;

    /// POSTs `body` as JSON with a bearer token and parses the JSON response.
    fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<Value>;

    /// GETs `url` with a bearer token and returns only the status code.
    fn status(&self, url: &str, token: &str) -> Result<u16>;
}

/// Content type sent with an uploaded artifact, chosen by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jar") => "application/java-archive",
        Some("pom") => "application/xml",
        _ => "application/octet-stream",
    }
}

/// Classifies the status of an upload response.
///
/// 409 means the artifact is already published; any other status above 299 is an error.
pub fn classify_upload_status(status: u16, url: &str) -> Result<UploadStatus> {
    match status {
        409 => Ok(UploadStatus::Conflict),
        s if s > 299 => Err(TransportError::HttpError {
            status: s,
            url: url.to_string(),
        }),
        _ => Ok(UploadStatus::Created),
    }
}

fn ensure_success(status: u16, url: &str) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(TransportError::HttpError {
            status,
            url: url.to_string(),
        })
    }
}

/// [`Transport`] backed by a `ureq` agent, admitting every request through a shared
/// [`RateGuard`] and retrying transient failures with a [`RetryPolicy`].
pub struct HttpTransport {
    agent: Agent,
    headers: Option<HeaderMap>,
    guard: Arc<RateGuard>,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, guard: Arc<RateGuard>, retry: RetryPolicy) -> Self {
        Self {
            agent: config.build(),
            headers: config.headers.clone(),
            guard,
            retry,
        }
    }

    fn with_retry<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        self.retry.run(self.guard.clock().as_ref(), |_| {
            self.guard.admit();
            op()
        })
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, token: &str, dest: &Path) -> Result<u64> {
        parse_url(url)?;
        if let Some(parent) = dest.parent() {
            ensure_dir_exists(parent)?;
        }

        self.with_retry(|| {
            let req = apply_headers(self.agent.get(url), &self.headers)
                .header("Authorization", format!("token {token}"));
            let mut response = req.call()?;
            ensure_success(response.status().as_u16(), url)?;

            let mut writer = BufWriter::new(File::create(dest)?);
            let written = std::io::copy(&mut response.body_mut().as_reader(), &mut writer)?;
            writer.flush()?;
            debug!(url, bytes = written, "downloaded");
            Ok(written)
        })
    }

    fn upload(&self, url: &str, token: &str, path: &Path) -> Result<UploadStatus> {
        parse_url(url)?;
        let body = std::fs::read(path)?;
        let content_type = content_type_for(path);

        self.with_retry(|| {
            let req = apply_headers(self.agent.put(url), &self.headers)
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", content_type);
            let response = req.send(&body[..])?;
            let status = response.status().as_u16();
            trace!(url, status, "upload response");
            classify_upload_status(status, url)
        })
    }

    fn get_json(&self, url: &str, token: &str) -> Result<Value> {
        parse_url(url)?;
        self.with_retry(|| {
            let req = apply_headers(self.agent.get(url), &self.headers)
                .header("Authorization", format!("Bearer {token}"))
                .header("Accept", "application/json");
            let mut response = req.call()?;
            ensure_success(response.status().as_u16(), url)?;
            response
                .body_mut()
                .read_json::<Value>()
                .map_err(|_| TransportError::InvalidResponse {
                    url: url.to_string(),
                })
        })
    }

    fn post_json(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        parse_url(url)?;
        self.with_retry(|| {
            let req = apply_headers(self.agent.post(url), &self.headers)
                .header("Authorization", format!("Bearer {token}"));
            let mut response = req.send_json(body)?;
            ensure_success(response.status().as_u16(), url)?;
            response
                .body_mut()
                .read_json::<Value>()
                .map_err(|_| TransportError::InvalidResponse {
                    url: url.to_string(),
                })
        })
    }

    fn status(&self, url: &str, token: &str) -> Result<u16> {
        parse_url(url)?;
        self.with_retry(|| {
            let req = apply_headers(self.agent.get(url), &self.headers)
                .header("Authorization", format!("Bearer {token}"));
            let status = req.call()?.status().as_u16();
            if status == 429 || status >= 500 {
                return Err(TransportError::HttpError {
                    status,
                    url: url.to_string(),
                });
            }
            Ok(status)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateLimits;
    use std::path::PathBuf;

    #[test]
    fn test_content_type_for() {
        assert_eq!(
            content_type_for(&PathBuf::from("app-1.0.jar")),
            "application/java-archive"
        );
        assert_eq!(content_type_for(&PathBuf::from("app-1.0.pom")), "application/xml");
        assert_eq!(
            content_type_for(&PathBuf::from("app-1.0.jar.sha1")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for(&PathBuf::from("maven-metadata")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_classify_upload_status() {
        assert_eq!(
            classify_upload_status(201, "u").unwrap(),
            UploadStatus::Created
        );
        assert_eq!(
            classify_upload_status(200, "u").unwrap(),
            UploadStatus::Created
        );
        assert_eq!(
            classify_upload_status(409, "u").unwrap(),
            UploadStatus::Conflict
        );
        assert!(matches!(
            classify_upload_status(401, "u"),
            Err(TransportError::HttpError { status: 401, .. })
        ));
        assert!(matches!(
            classify_upload_status(500, "u"),
            Err(TransportError::HttpError { status: 500, .. })
        ));
    }

    #[test]
    fn test_ensure_success() {
        assert!(ensure_success(200, "u").is_ok());
        assert!(ensure_success(204, "u").is_ok());
        assert!(ensure_success(404, "u").is_err());
        assert!(ensure_success(302, "u").is_err());
    }

    #[test]
    fn test_invalid_url_rejected_before_request() {
        let transport = HttpTransport::new(
            &ClientConfig::default(),
            Arc::new(RateGuard::new(RateLimits::default())),
            RetryPolicy::default(),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = transport
            .download("not a url", "token", &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
        assert!(!dir.path().join("out").exists());
    }
}
