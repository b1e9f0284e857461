use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `config.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Model catalog.
    pub models: Vec<ModelConfig>,
    /// Model used when a request names none.
    pub default_model: String,
    /// Ordered candidates tried after the requested model fails.
    #[serde(default)]
    pub fallback_models: Vec<String>,
    /// Extra names that resolve to a model id.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Attempts per candidate before falling through (clamped to ≥ 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

fn default_max_retries() -> usize {
    2
}

/// A configured model on a provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Unique identifier for this entry (e.g. "flash").
    pub id: String,
    /// Provider id: "openai", "gemini", "openrouter", ...
    pub provider: String,
    /// Upstream model name. Defaults to `id`.
    #[serde(default)]
    pub model: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Context window in tokens.
    #[serde(default)]
    pub context_window: Option<u64>,
    /// Endpoint override: the full chat-completions URL for OpenAI-style
    /// providers, the API base for Gemini.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API key (plain text or env-var reference like `$GEMINI_API_KEY`).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ModelConfig {
    /// Upstream model name sent to the provider.
    pub fn upstream_model(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Listen address.
    #[serde(default = "default_gateway_addr")]
    pub addr: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: default_gateway_addr(),
        }
    }
}

fn default_gateway_addr() -> String {
    "127.0.0.1:4141".to_string()
}

impl Config {
    /// Read and parse a YAML configuration file, falling back to
    /// `<path>.bak` when the file itself is missing.
    pub async fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut bak_name = path.as_os_str().to_os_string();
                bak_name.push(".bak");
                let bak_path = PathBuf::from(bak_name);
                match tokio::fs::read_to_string(&bak_path).await {
                    Ok(c) => {
                        tracing::warn!(
                            path = %path.display(),
                            bak = %bak_path.display(),
                            "config file not found, falling back to .bak"
                        );
                        c
                    }
                    Err(_) => {
                        return Err(e).with_context(|| {
                            format!("failed to read config file: {}", path.display())
                        });
                    }
                }
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read config file: {}", path.display()));
            }
        };

        let config = Self::from_yaml(&contents)?;

        tracing::debug!(
            models = config.models.len(),
            fallbacks = config.fallback_models.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(contents: &str) -> anyhow::Result<Config> {
        let config: Config =
            serde_yaml_ng::from_str(contents).context("failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate semantic constraints that serde cannot enforce.
    fn validate(&self) -> anyhow::Result<()> {
        use std::collections::HashSet;

        let mut model_ids = HashSet::new();
        for m in &self.models {
            if m.id.trim().is_empty() {
                anyhow::bail!("config: model with empty id");
            }
            if !model_ids.insert(m.id.as_str()) {
                anyhow::bail!("config: duplicate model ID: {}", m.id);
            }
        }

        let known = |r: &str| {
            model_ids.contains(r)
                || self
                    .aliases
                    .get(r)
                    .is_some_and(|target| model_ids.contains(target.as_str()))
        };

        for (alias, target) in &self.aliases {
            if !model_ids.contains(target.as_str()) {
                anyhow::bail!("config: alias '{alias}' references unknown model '{target}'");
            }
        }

        if !known(&self.default_model) {
            anyhow::bail!(
                "config: default_model references unknown model '{}'",
                self.default_model
            );
        }

        for fb in &self.fallback_models {
            if !known(fb) {
                anyhow::bail!("config: fallback references unknown model '{fb}'");
            }
        }

        Ok(())
    }

    /// Serialize and write the configuration back to a YAML file.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = serde_yaml_ng::to_string(self).context("serialize config YAML")?;
        tokio::fs::write(path, &contents)
            .await
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Resolve an API key: config value → env var → empty string.
///
/// If the config value starts with `$`, it's treated as an env-var reference.
pub fn resolve_config_key(config_key: Option<&str>, provider_id: &str) -> String {
    if let Some(k) = config_key {
        if let Some(var) = k.strip_prefix('$') {
            return std::env::var(var).unwrap_or_default();
        }
        if !k.is_empty() {
            return k.to_string();
        }
    }
    let env_name = format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"));
    std::env::var(env_name).unwrap_or_default()
}
