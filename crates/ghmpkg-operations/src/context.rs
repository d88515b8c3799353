use std::sync::Arc;

use ghmpkg_config::config::Config;
use ghmpkg_core::{
    api::{CatalogApi, GitHubCatalogApi},
    layout::LocalLayout,
    PackageType,
};
use ghmpkg_dl::{
    http_client::ClientConfig,
    rate::{RateGuard, RateLimits},
    retry::RetryPolicy,
    transport::{HttpTransport, Transport},
};
use ghmpkg_events::{EventSink, EventSinkHandle, LogLevel, MigrateEvent};
use ghmpkg_provider::{
    DefaultProviderFactory, DockerCli, ProviderContext, ProviderFactory, RegistrySettings,
    SystemRunner, ToolRunner,
};
use tracing::debug;

use crate::error::OperationResult;

struct Inner {
    config: Config,
    events: EventSinkHandle,
    layout: LocalLayout,
    source_api: Arc<dyn CatalogApi>,
    target_api: Arc<dyn CatalogApi>,
    factory: Arc<dyn ProviderFactory>,
}

/// Everything an operation needs for one run, cheap to clone.
#[derive(Clone)]
pub struct MigrateContext {
    inner: Arc<Inner>,
}

/// Provider-facing view of the resolved configuration.
pub fn registry_settings(config: &Config) -> RegistrySettings {
    RegistrySettings {
        source_organization: config.source_organization().unwrap_or_default().to_string(),
        target_organization: config.target_organization().unwrap_or_default().to_string(),
        source_token: config.source_token().unwrap_or_default().to_string(),
        target_token: config.target_token().unwrap_or_default().to_string(),
        source_hostname: config.source_hostname().to_string(),
        target_hostname: config.target_hostname().to_string(),
        container_registry: config.container_registry().to_string(),
        gpr_path: config.gpr_path().to_string(),
        maven_upload_concurrency: config.maven_upload_concurrency(),
    }
}

impl MigrateContext {
    /// Wires the HTTP transport, catalog APIs and providers from `config`.
    pub fn new(config: Config, events: EventSinkHandle) -> OperationResult<Self> {
        let client = ClientConfig::default().with_proxy(config.proxy())?;
        let guard = Arc::new(RateGuard::new(RateLimits {
            per_minute: config.rate_limit_per_minute(),
            per_hour: config.rate_limit_per_hour(),
        }));
        let retry = RetryPolicy::new(config.retry_max(), config.retry_delay()?);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&client, guard, retry));

        let settings = registry_settings(&config);
        let source_api: Arc<dyn CatalogApi> = Arc::new(GitHubCatalogApi::new(
            transport.clone(),
            &settings.source_hostname,
            settings.source_token.clone(),
        ));
        let target_api: Arc<dyn CatalogApi> = Arc::new(GitHubCatalogApi::new(
            transport.clone(),
            &settings.target_hostname,
            settings.target_token.clone(),
        ));

        let work_dir = config.work_dir()?;
        let layout = LocalLayout::new(&work_dir);
        let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
        let engine = Arc::new(DockerCli::new(runner.clone(), work_dir.join(".docker")));
        let provider_ctx = Arc::new(ProviderContext {
            settings,
            layout: layout.clone(),
            transport,
            runner,
            api: source_api.clone(),
        });
        let factory = Arc::new(DefaultProviderFactory::new(provider_ctx, engine));

        debug!(work_dir = %work_dir.display(), "created migration context");
        Ok(Self::from_parts(
            config, events, layout, source_api, target_api, factory,
        ))
    }

    /// Builds a context from explicit collaborators.
    pub fn from_parts(
        config: Config,
        events: EventSinkHandle,
        layout: LocalLayout,
        source_api: Arc<dyn CatalogApi>,
        target_api: Arc<dyn CatalogApi>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                events,
                layout,
                source_api,
                target_api,
                factory,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.inner.events
    }

    pub fn layout(&self) -> &LocalLayout {
        &self.inner.layout
    }

    pub fn source_api(&self) -> &Arc<dyn CatalogApi> {
        &self.inner.source_api
    }

    pub fn target_api(&self) -> &Arc<dyn CatalogApi> {
        &self.inner.target_api
    }

    pub fn factory(&self) -> &Arc<dyn ProviderFactory> {
        &self.inner.factory
    }

    /// Package types selected for this run, in configured order.
    pub fn package_types(&self) -> OperationResult<Vec<PackageType>> {
        let types = self
            .config()
            .package_types()
            .iter()
            .map(|t| t.parse())
            .collect::<Result<Vec<PackageType>, _>>()?;
        Ok(types)
    }

    /// Emits a log event and mirrors it to tracing.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        self.events().emit(MigrateEvent::Log {
            level,
            message,
        });
    }
}
