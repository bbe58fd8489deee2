//! Runtime configuration for chat-relay.
//!
//! Everything is read once at startup: CLI flags via clap, provider
//! credentials from the process environment (optionally seeded from a
//! dotenv file). The resulting [`Config`] is immutable and handed to the
//! components that need it.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Environment variable holding the provider endpoint URL.
pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
/// Environment variable holding the provider API key.
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
/// Environment variable holding the model (deployment) name.
pub const ENV_MODEL_NAME: &str = "AZURE_OPENAI_MODEL_NAME";
/// Environment variable holding the provider API version.
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay", about = "Chat backend relaying messages to a hosted LLM")]
pub struct Cli {
    /// Dotenv file to load before reading the environment.
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8000")]
    pub listen: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream provider connection settings.
    pub provider: ProviderConfig,

    /// Agent persona.
    pub agent: AgentConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8000").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Connection settings for the hosted chat-completion provider.
///
/// Values are opaque: nothing here is validated. A missing value only
/// surfaces when a session is opened.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base endpoint URL (e.g. `https://my-resource.openai.azure.com`).
    pub endpoint: Option<String>,

    /// API key sent with every request.
    pub api_key: Option<String>,

    /// Model / deployment name.
    pub model: Option<String>,

    /// API version query parameter.
    pub api_version: Option<String>,
}

// Keep the key out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl ProviderConfig {
    /// Build from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            endpoint: get(ENV_ENDPOINT),
            api_key: get(ENV_API_KEY),
            model: get(ENV_MODEL_NAME),
            api_version: get(ENV_API_VERSION),
        }
    }

    /// Read the provider settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// The single stateless agent every request is routed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub instructions: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            instructions: "A helpful assistant that provides information and assistance."
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration: seed the environment from `env_file` if it
    /// exists, then read provider settings. Variables already set in the
    /// process environment take precedence over the file.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        load_env_file(&cli.env_file)?;

        Ok(Config {
            server: ServerConfig {
                listen: cli.listen.clone(),
            },
            provider: ProviderConfig::from_env(),
            agent: AgentConfig::default(),
        })
    }
}

fn load_env_file(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        dotenvy::from_path(path)?;
        tracing::debug!(path = %path.display(), "Loaded env file");
    } else {
        tracing::debug!("Env file not found at {:?}, using process environment", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_agent() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.name, "Assistant");
        assert!(cfg.agent.instructions.starts_with("A helpful assistant"));
        assert_eq!(cfg.server.listen, "0.0.0.0:8000");
    }

    #[test]
    fn test_provider_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_ENDPOINT, "https://example.openai.azure.com"),
            (ENV_API_KEY, "secret"),
            (ENV_MODEL_NAME, "gpt-4o-mini"),
            (ENV_API_VERSION, ""),
        ]
        .into_iter()
        .collect();

        let cfg = ProviderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.endpoint.as_deref(), Some("https://example.openai.azure.com"));
        assert_eq!(cfg.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cfg.api_version, None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let cfg = ProviderConfig {
            api_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
