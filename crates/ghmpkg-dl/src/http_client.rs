use std::time::Duration;

use ureq::{http::HeaderMap, Agent, Proxy, RequestBuilder};

use crate::error::{Result, TransportError};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub headers: Option<HeaderMap>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    /// Creates a default ClientConfig with the `gh-migrate-packages` user agent and no proxy,
    /// extra headers or timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use ghmpkg_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert_eq!(cfg.user_agent.as_deref(), Some("gh-migrate-packages"));
    /// assert!(cfg.proxy.is_none());
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some("gh-migrate-packages".into()),
            proxy: None,
            headers: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Sets the proxy from a URL such as `http://proxy:3128`.
    pub fn with_proxy(mut self, proxy: Option<&str>) -> Result<Self> {
        self.proxy = match proxy {
            Some(proxy) => Some(Proxy::new(proxy)?),
            None => None,
        };
        Ok(self)
    }

    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// Status codes are returned as responses rather than errors so callers can classify
    /// conflicts and rate limiting themselves.
    pub fn build(&self) -> Agent {
        let mut config = ureq::Agent::config_builder()
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout)
            .http_status_as_error(false);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

/// Apply headers from an optional `HeaderMap` to a `RequestBuilder`.
pub(crate) fn apply_headers<B>(
    mut req: RequestBuilder<B>,
    headers: &Option<HeaderMap>,
) -> RequestBuilder<B> {
    if let Some(headers) = headers {
        for (key, value) in headers.iter() {
            req = req.header(key, value);
        }
    }
    req
}

/// Validates `url` before it is handed to the agent.
pub(crate) fn parse_url(url: &str) -> Result<url::Url> {
    url::Url::parse(url).map_err(|source| TransportError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent, Some("gh-migrate-packages".to_string()));
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_client_config_build() {
        let config = ClientConfig {
            user_agent: Some("test-agent".to_string()),
            proxy: None,
            headers: None,
            timeout: Some(Duration::from_secs(30)),
        };
        let agent = config.build();
        let _req = agent.get("https://maven.pkg.github.com/acme");
    }

    #[test]
    fn test_with_proxy() {
        let config = ClientConfig::default()
            .with_proxy(Some("http://localhost:3128"))
            .unwrap();
        assert!(config.proxy.is_some());

        let config = config.with_proxy(None).unwrap();
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://npm.pkg.github.com/@acme/left-pad").is_ok());
        assert!(matches!(
            parse_url("not a url"),
            Err(TransportError::InvalidUrl { .. })
        ));
    }
}
