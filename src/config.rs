use std::fmt;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::openai::client::DEFAULT_BASE_URL;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// The credential used for every remote call.
///
/// Formatting never prints the key; only the HTTP client reads it through
/// [`ApiKey::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// What a refresh does when the remote entity has disappeared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Report the refresh as failed.
    #[default]
    Error,
    /// Drop the entity from state so the next plan recreates it.
    Remove,
}

/// Provider-level configuration as declared by the user.
#[derive(Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub on_missing: MissingPolicy,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("on_missing", &self.on_missing)
            .finish()
    }
}

/// Configuration after credential and endpoint resolution.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub on_missing: MissingPolicy,
}

impl ProviderConfig {
    pub fn resolve(&self) -> ProviderResult<ResolvedConfig> {
        self.resolve_with(
            std::env::var(API_KEY_ENV).ok().as_deref(),
            std::env::var(BASE_URL_ENV).ok().as_deref(),
        )
    }

    /// Resolve against raw environment values.
    /// Used directly in tests to avoid mutating process-global environment.
    pub fn resolve_with(
        &self,
        env_api_key: Option<&str>,
        env_base_url: Option<&str>,
    ) -> ProviderResult<ResolvedConfig> {
        let api_key = non_empty(self.api_key.as_deref())
            .or_else(|| non_empty(env_api_key))
            .map(ApiKey::new)
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "missing api key: set `api_key` in the provider configuration \
                     or the {API_KEY_ENV} environment variable"
                ))
            })?;

        let base_url = non_empty(self.base_url.as_deref())
            .or_else(|| non_empty(env_base_url))
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        Ok(ResolvedConfig {
            api_key,
            base_url,
            on_missing: self.on_missing,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
