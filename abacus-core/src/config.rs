// abacus-core/src/config.rs

//! Configuration structures and parsing for the chat client.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use url::Url;

fn default_api_key_env_var() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Top-level configuration, read from `Abacus.toml`.
#[derive(Deserialize, Debug, Clone)]
pub struct ChatConfig {
    /// System-role instruction seeded into every session.
    pub system_prompt: String,
    /// Environment variable holding the completion endpoint credential.
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    pub model: ModelConfig,
    pub server: ServerConfig,
    /// Resolved credential. Filled by [`ChatConfig::resolve_api_key`], never
    /// read from the config file itself.
    #[serde(skip)]
    pub api_key: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    pub endpoint: String,
    /// Extra request parameters (e.g. `temperature`) passed through to the
    /// completion request body.
    #[serde(default)]
    pub parameters: Option<toml::Value>,
}

/// How to launch the MCP tool server.
#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ChatConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<ChatConfig> {
        let config: ChatConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        if config.system_prompt.trim().is_empty() {
            return Err(anyhow!("'system_prompt' in config content is empty."));
        }
        if config.model.model_name.trim().is_empty() {
            return Err(anyhow!("'model.model_name' in config content is empty."));
        }
        if config.model.endpoint.trim().is_empty() {
            return Err(anyhow!("'model.endpoint' in config content is empty."));
        }
        Url::parse(&config.model.endpoint).with_context(|| {
            format!(
                "Invalid URL format for 'model.endpoint' ('{}').",
                config.model.endpoint
            )
        })?;
        if let Some(params) = &config.model.parameters {
            if !params.is_table() {
                return Err(anyhow!(
                    "'model.parameters' must be a TOML table of request parameters."
                ));
            }
        }
        if config.server.command.trim().is_empty() {
            return Err(anyhow!("'server.command' in config content is empty."));
        }

        tracing::debug!("Successfully parsed and validated configuration.");
        Ok(config)
    }

    /// Resolves the endpoint credential from the configured environment
    /// variable. Must succeed before any connection is attempted; a missing
    /// credential is a startup failure, not something to discover mid-chat.
    pub fn resolve_api_key(&mut self) -> Result<()> {
        match std::env::var(&self.api_key_env_var) {
            Ok(key) if !key.trim().is_empty() => {
                self.api_key = key;
                Ok(())
            }
            _ => Err(anyhow!(
                "Environment variable '{}' is not set. Export your API key before starting.",
                self.api_key_env_var
            )),
        }
    }
}
