//! TOML settings.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! ```toml
//! provider = "openai"
//! model = "gpt-4o"
//! request_timeout_secs = 60
//! char_limit = 2000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blocks::{clamp_char_limit, DEFAULT_CHAR_LIMIT};
use crate::client::ClientConfig;
use crate::document::DEFAULT_EXPORT_NAME;
use crate::error::Result;
use crate::providers::{resolve_model, Provider};

pub const DEFAULT_CONFIG_FILE: &str = "codeflow.toml";
pub const DEFAULT_STORE_FILE: &str = "codeflow.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: Provider,
    /// Empty means the provider's default model.
    pub model: Option<String>,
    /// Name of the env var holding the API key; empty means the provider default.
    pub api_key_env: Option<String>,
    pub request_timeout_secs: u64,
    /// Block size used until the user picks one.
    pub char_limit: usize,
    pub store_path: PathBuf,
    pub export_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            provider: Provider::default(),
            model: None,
            api_key_env: None,
            request_timeout_secs: 30,
            char_limit: DEFAULT_CHAR_LIMIT,
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            export_name: DEFAULT_EXPORT_NAME.to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(text)?;
        settings.char_limit = clamp_char_limit(settings.char_limit);
        Ok(settings)
    }

    /// Load `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Settings::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn api_key_var(&self) -> String {
        match self.api_key_env.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.provider.api_key_env().to_string(),
        }
    }

    /// Client configuration with the API key read from the environment.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.provider);
        config.model = resolve_model(self.provider, self.model.as_deref());
        config.api_key = std::env::var(self.api_key_var()).ok();
        config.request_timeout = Duration::from_secs(self.request_timeout_secs.max(1));
        config
    }
}
