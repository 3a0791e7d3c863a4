//! Layered configuration.
//!
//! ```rust,no_run
//! use sales_agent::config::{ConfigBuilder, EngineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = ConfigBuilder::new()
//!     .env()
//!     .file("sales-agent.json")
//!     .build()
//!     .await?;
//! let config = EngineConfig::load(&provider).await?;
//! # Ok(())
//! # }
//! ```

mod composite;
mod env;
mod file;
mod memory;
mod provider;
mod settings;

pub use composite::CompositeConfigProvider;
pub use env::{DEFAULT_ENV_PREFIX, EnvConfigProvider};
pub use file::FileConfigProvider;
pub use memory::MemoryConfigProvider;
pub use provider::{ConfigProvider, ConfigProviderExt};
pub use settings::{DEFAULT_MAX_STEPS, EngineConfig, keys};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Provider error: {message}")]
    Provider { message: String },

    /// A builder was finished without a required component.
    #[error("Missing required component: {what}")]
    Missing { what: &'static str },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

enum Layer {
    Env(String),
    File(PathBuf),
    Provider(Box<dyn ConfigProvider>),
}

/// Assembles a [`CompositeConfigProvider`]; layers added first take priority.
#[derive(Default)]
pub struct ConfigBuilder {
    layers: Vec<Layer>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variables under [`DEFAULT_ENV_PREFIX`].
    pub fn env(self) -> Self {
        self.env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    pub fn env_with_prefix(mut self, prefix: &str) -> Self {
        self.layers.push(Layer::Env(prefix.to_string()));
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.layers.push(Layer::File(path.into()));
        self
    }

    pub fn memory(self, provider: MemoryConfigProvider) -> Self {
        self.provider(Box::new(provider))
    }

    pub fn provider(mut self, provider: Box<dyn ConfigProvider>) -> Self {
        self.layers.push(Layer::Provider(provider));
        self
    }

    /// Opens file layers; a malformed file fails the build.
    pub async fn build(self) -> ConfigResult<CompositeConfigProvider> {
        let mut composite = CompositeConfigProvider::new();
        for layer in self.layers {
            let provider: Box<dyn ConfigProvider> = match layer {
                Layer::Env(prefix) => Box::new(EnvConfigProvider::prefixed(prefix)),
                Layer::File(path) => Box::new(FileConfigProvider::open(path).await?),
                Layer::Provider(provider) => provider,
            };
            composite.push(provider);
        }
        Ok(composite)
    }
}
