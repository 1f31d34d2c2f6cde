use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::engine::ExecutorConfig;
use crate::providers::GeminiProvider;

pub const DEFAULT_PORT: u16 = 3001;
/// Flow EVM testnet
pub const DEFAULT_CHAIN_ID: u64 = 545;
/// Upper bound on a single HTTP call to the model API.
pub const MODEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub twitter_client_id: Option<String>,
    pub twitter_client_secret: Option<String>,
    pub twitter_redirect_uri: Option<String>,
    pub flare_api_key: Option<String>,
    pub flare_verifier_url: Option<String>,
    pub database_url: Option<String>,
    pub frontend_url: Option<String>,
    pub vault_address: Option<String>,
    pub chain_id: u64,
    pub action_delay_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_key: None,
            gemini_model: None,
            twitter_bearer_token: None,
            twitter_client_id: None,
            twitter_client_secret: None,
            twitter_redirect_uri: None,
            flare_api_key: None,
            flare_verifier_url: None,
            database_url: None,
            frontend_url: None,
            vault_address: None,
            chain_id: DEFAULT_CHAIN_ID,
            action_delay_ms: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Reads a TOML file, then lets environment variables override it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Some(chain_id) = get("CHAIN_ID").and_then(|v| v.parse().ok()) {
            self.chain_id = chain_id;
        }
        if let Some(delay) = get("ACTION_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.action_delay_ms = Some(delay);
        }

        let strings: [(&str, &mut Option<String>); 11] = [
            ("GEMINI_API_KEY", &mut self.gemini_api_key),
            ("GEMINI_MODEL", &mut self.gemini_model),
            ("TWITTER_BEARER_TOKEN", &mut self.twitter_bearer_token),
            ("TWITTER_CLIENT_ID", &mut self.twitter_client_id),
            ("TWITTER_CLIENT_SECRET", &mut self.twitter_client_secret),
            ("TWITTER_REDIRECT_URI", &mut self.twitter_redirect_uri),
            ("FLARE_API_KEY", &mut self.flare_api_key),
            ("FLARE_VERIFIER_URL", &mut self.flare_verifier_url),
            ("DATABASE_URL", &mut self.database_url),
            ("FRONTEND_URL", &mut self.frontend_url),
            ("VAULT_ADDRESS", &mut self.vault_address),
        ];
        for (key, slot) in strings {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        let mut executor = ExecutorConfig::default();
        if let Some(ms) = self.action_delay_ms {
            executor.action_delay = Duration::from_millis(ms);
        }
        if let Some(vault) = &self.vault_address {
            executor.vault_address = vault.clone();
        }
        executor
    }

    /// Gemini client for `api_key`, using the configured model.
    pub fn gemini_provider(&self, api_key: &str) -> GeminiProvider {
        let mut provider =
            GeminiProvider::new(api_key.to_string()).with_timeout(MODEL_REQUEST_TIMEOUT);
        if let Some(model) = &self.gemini_model {
            provider = provider.with_model(model.clone());
        }
        provider
    }
}
