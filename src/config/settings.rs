//! Typed settings assembled from a [`ConfigProvider`].

use std::time::Duration;

use tracing::debug;

use super::provider::{ConfigProvider, ConfigProviderExt};
use super::{ConfigError, ConfigResult};
use crate::conversation::CustomerId;
use crate::reasoning::{DEFAULT_MAX_ATTEMPTS, OpenAiConfig};

/// Mirrors the recursion limit of the graph runtime the engine replaces.
pub const DEFAULT_MAX_STEPS: u32 = 25;

pub mod keys {
    pub const REASONING_MAX_ATTEMPTS: &str = "reasoning.max_attempts";
    pub const REASONING_TIMEOUT_MS: &str = "reasoning.timeout_ms";
    pub const ENGINE_MAX_STEPS: &str = "engine.max_steps";
    pub const CUSTOMER_DEFAULT_ID: &str = "customer.default_id";
    pub const OPENAI_API_KEY: &str = "openai.api_key";
    pub const OPENAI_MODEL: &str = "openai.model";
    pub const OPENAI_BASE_URL: &str = "openai.base_url";
    pub const OPENAI_MAX_RETRIES: &str = "openai.max_retries";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_reasoning_attempts: u32,
    /// Covers the whole corrective-retry loop of one reasoning step.
    pub reasoning_timeout: Option<Duration>,
    pub max_steps_per_turn: u32,
    pub default_customer: CustomerId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reasoning_attempts: DEFAULT_MAX_ATTEMPTS,
            reasoning_timeout: None,
            max_steps_per_turn: DEFAULT_MAX_STEPS,
            default_customer: CustomerId::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_reasoning_attempts(mut self, attempts: u32) -> Self {
        self.max_reasoning_attempts = attempts;
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout = Some(timeout);
        self
    }

    pub fn with_max_steps(mut self, steps: u32) -> Self {
        self.max_steps_per_turn = steps;
        self
    }

    pub fn with_default_customer(mut self, customer: impl Into<CustomerId>) -> Self {
        self.default_customer = customer.into();
        self
    }

    /// Reads overrides from `provider`; absent keys keep their defaults.
    pub async fn load<P: ConfigProvider + ?Sized>(provider: &P) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(attempts) = provider.get_parsed::<u32>(keys::REASONING_MAX_ATTEMPTS).await? {
            config.max_reasoning_attempts = positive(keys::REASONING_MAX_ATTEMPTS, attempts)?;
        }
        if let Some(ms) = provider.get_parsed::<u64>(keys::REASONING_TIMEOUT_MS).await? {
            // Zero disables the timeout.
            config.reasoning_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(steps) = provider.get_parsed::<u32>(keys::ENGINE_MAX_STEPS).await? {
            config.max_steps_per_turn = positive(keys::ENGINE_MAX_STEPS, steps)?;
        }
        if let Some(customer) = provider.get_raw(keys::CUSTOMER_DEFAULT_ID).await? {
            let customer = customer.trim();
            if customer.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: keys::CUSTOMER_DEFAULT_ID.to_string(),
                    message: "must not be empty".into(),
                });
            }
            config.default_customer = CustomerId::from(customer);
        }

        debug!(source = provider.name(), ?config, "Engine configuration loaded");
        Ok(config)
    }
}

fn positive(key: &str, value: u32) -> ConfigResult<u32> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1".into(),
        });
    }
    Ok(value)
}

impl OpenAiConfig {
    /// Builds a client configuration; `openai.api_key` is required.
    pub async fn load<P: ConfigProvider + ?Sized>(provider: &P) -> ConfigResult<Self> {
        let api_key = provider.require(keys::OPENAI_API_KEY).await?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: keys::OPENAI_API_KEY.to_string(),
                message: "must not be empty".into(),
            });
        }
        let mut config = OpenAiConfig::new(api_key.trim());

        if let Some(model) = provider.get_raw(keys::OPENAI_MODEL).await? {
            config = config.with_model(model.trim());
        }
        if let Some(base_url) = provider.get_raw(keys::OPENAI_BASE_URL).await? {
            config = config.with_base_url(base_url.trim());
        }
        if let Some(retries) = provider.get_parsed::<u32>(keys::OPENAI_MAX_RETRIES).await? {
            config = config.with_max_retries(retries);
        }
        debug!(source = provider.name(), model = %config.model, "Reasoner configuration loaded");
        Ok(config)
    }
}
