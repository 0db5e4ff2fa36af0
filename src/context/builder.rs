use super::config::ContextConfig;
use super::core::ClientContext;
use crate::batch::{BatchExecutor, DuplicatePolicy};
use crate::transport::HttpBatchExecutor;
use crate::Result;
use std::sync::Arc;

/// Builder for [`ClientContext`].
///
/// Starts from [`ContextConfig::from_env`] unless a config is given; explicit
/// setters win over both.
pub struct ClientContextBuilder {
    config: Option<ContextConfig>,
    base_url: Option<String>,
    access_token: Option<String>,
    timeout_secs: Option<u64>,
    duplicate_policy: Option<DuplicatePolicy>,
    /// Injected executor; when absent the HTTP executor is built from the config.
    executor: Option<Arc<dyn BatchExecutor>>,
}

impl ClientContextBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            base_url: None,
            access_token: None,
            timeout_secs: None,
            duplicate_policy: None,
            executor: None,
        }
    }

    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Use a custom executor instead of HTTP (mock servers, in-memory tests).
    pub fn executor(mut self, executor: Arc<dyn BatchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<ClientContext> {
        let mut config = self.config.unwrap_or_else(ContextConfig::from_env);
        if let Some(url) = self.base_url {
            config.base_url = Some(url);
        }
        if let Some(token) = self.access_token {
            config.access_token = Some(token);
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(policy) = self.duplicate_policy {
            config.duplicate_policy = policy;
        }

        let executor: Arc<dyn BatchExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(HttpBatchExecutor::new(&config)?),
        };

        tracing::debug!(config = ?config, "client context built");
        Ok(ClientContext::from_parts(config, executor))
    }
}

impl Default for ClientContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
