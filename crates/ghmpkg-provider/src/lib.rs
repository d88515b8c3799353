//! Package format providers for moving artifacts between GitHub organizations.
//!
//! Each [`Provider`] knows how to enumerate, download, rewrite and publish one package
//! format. External tools and the container engine sit behind [`ToolRunner`] and
//! [`ContainerEngine`] so every variant can run against fakes.

pub mod archive;
pub mod base;
pub mod container;
pub mod error;
pub mod factory;
pub mod maven;
pub mod npm;
pub mod nuget;
pub mod rubygems;
pub mod tool;
pub mod traits;

pub use base::{ProviderContext, RegistrySettings};
pub use container::{ContainerEngine, DockerCli};
pub use error::{ProviderError, Result};
pub use factory::DefaultProviderFactory;
pub use tool::{SystemRunner, ToolRunner};
pub use traits::{ArtifactRef, Provider, ProviderFactory};
