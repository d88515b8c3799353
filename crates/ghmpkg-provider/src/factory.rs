use std::sync::Arc;

use ghmpkg_core::PackageType;

use crate::{
    base::ProviderContext,
    container::{ContainerEngine, ContainerProvider},
    error::Result,
    maven::MavenProvider,
    npm::NpmProvider,
    nuget::NugetProvider,
    rubygems::RubyGemsProvider,
    traits::{Provider, ProviderFactory},
};

/// Builds the provider for each package type over one shared context.
pub struct DefaultProviderFactory {
    ctx: Arc<ProviderContext>,
    engine: Arc<dyn ContainerEngine>,
}

impl DefaultProviderFactory {
    pub fn new(ctx: Arc<ProviderContext>, engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            ctx,
            engine,
        }
    }

    pub fn context(&self) -> &Arc<ProviderContext> {
        &self.ctx
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, package_type: PackageType) -> Result<Box<dyn Provider>> {
        let ctx = self.ctx.clone();
        let provider: Box<dyn Provider> = match package_type {
            PackageType::Maven => Box::new(MavenProvider::new(ctx)),
            PackageType::Npm => Box::new(NpmProvider::new(ctx)),
            PackageType::Container => {
                Box::new(ContainerProvider::new(ctx, self.engine.clone()))
            }
            PackageType::Rubygems => Box::new(RubyGemsProvider::new(ctx)),
            PackageType::Nuget => Box::new(NugetProvider::new(ctx)),
        };
        Ok(provider)
    }
}
