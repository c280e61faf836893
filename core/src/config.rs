//! Client configuration.
//!
//! One base URL, one credential policy and one logout policy for the whole
//! client. Values come from the environment and may be overridden by flags.

use std::str::FromStr;

use crate::client::ExpenseClient;
use crate::credential::{CredentialPolicy, UnknownPolicy};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000/api/v1";

pub const ENV_BASE_URL: &str = "EXPENSE_API_URL";
pub const ENV_CREDENTIAL: &str = "EXPENSE_CREDENTIAL";
pub const ENV_LOGOUT_POLICY: &str = "EXPENSE_LOGOUT_POLICY";

/// What to do with the local session when the logout request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogoutPolicy {
    /// Hand the session back with the error so the user can retry.
    #[default]
    KeepSession,
    /// Drop the session anyway and report the error.
    ForceSignOut,
}

impl FromStr for LogoutPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(LogoutPolicy::KeepSession),
            "force" => Ok(LogoutPolicy::ForceSignOut),
            _ => Err(ConfigError::LogoutPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Credential(#[from] UnknownPolicy),

    #[error("unknown logout policy \"{0}\" (expected \"keep\" or \"force\")")]
    LogoutPolicy(String),

    #[error("base URL must start with http:// or https://, got \"{0}\"")]
    BaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub credential: CredentialPolicy,
    pub logout: LogoutPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credential: CredentialPolicy::default(),
            logout: LogoutPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL) {
            config = config.with_base_url(&url)?;
        }
        if let Some(credential) = lookup(ENV_CREDENTIAL) {
            config.credential = credential.parse()?;
        }
        if let Some(logout) = lookup(ENV_LOGOUT_POLICY) {
            config.logout = logout.parse()?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::BaseUrl(url.to_string()));
        }
        self.base_url = url.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// An unauthenticated client for this configuration.
    pub fn client(&self) -> ExpenseClient {
        ExpenseClient::new(&self.base_url)
    }
}
