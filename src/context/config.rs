use crate::batch::DuplicatePolicy;
use crate::{Error, ErrorContext, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection and policy settings of a [`ClientContext`](super::ClientContext).
///
/// Can be read from the environment (`SP_MODEL_*`) or from a YAML file:
///
/// ```yaml
/// base_url: https://contoso.sharepoint.com/sites/dev
/// timeout_secs: 60
/// duplicate_policy: allow
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Site url every request path is resolved against.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Bearer token passed through as-is.
    pub access_token: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            access_token: None,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by:
    /// - `SP_MODEL_BASE_URL`
    /// - `SP_MODEL_HTTP_TIMEOUT_SECS` (default 30)
    /// - `SP_MODEL_ACCESS_TOKEN`
    /// - `SP_MODEL_DUPLICATE_POLICY` (`reject` | `allow`)
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var("SP_MODEL_BASE_URL") {
            cfg.base_url = Some(url);
        }
        if let Some(secs) = env::var("SP_MODEL_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            cfg.timeout_secs = secs;
        }
        if let Ok(token) = env::var("SP_MODEL_ACCESS_TOKEN") {
            cfg.access_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(policy) = env::var("SP_MODEL_DUPLICATE_POLICY")
            .ok()
            .and_then(|s| s.parse::<DuplicatePolicy>().ok())
        {
            cfg.duplicate_policy = policy;
        }
        cfg
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration(
                "invalid context configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("context_config"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Parsed site url, always ending in `/` so request paths join below it.
    pub fn site_url(&self) -> Result<Url> {
        let raw = self.base_url.as_deref().ok_or_else(|| {
            Error::configuration(
                "base url is not configured",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details("set SP_MODEL_BASE_URL or ContextConfig::with_base_url"),
            )
        })?;
        let mut url = Url::parse(raw).map_err(|e| {
            Error::configuration(
                format!("invalid base url '{}'", raw),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(e.to_string()),
            )
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::configuration(
                format!("unsupported scheme '{}'", url.scheme()),
                ErrorContext::new().with_field_path("base_url"),
            ));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("duplicate_policy", &self.duplicate_policy)
            .finish()
    }
}
