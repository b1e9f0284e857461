//! Model catalog lookup and failover ordering.
//!
//! The relay only needs the [`ModelRouter`] contract: resolve a name to a
//! concrete provider/model record, list the catalog, and supply the
//! default and fallback order. [`CatalogRouter`] is the config-backed
//! implementation. Routers are read-only after construction.

use serde::Serialize;

use crate::config::{Config, ModelConfig};

/// Wire dialect a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFormat {
    OpenAi,
    Gemini,
}

impl ProviderFormat {
    pub fn for_provider(provider_id: &str) -> Self {
        let p = provider_id.to_ascii_lowercase();
        if p.contains("gemini") || p.contains("google") || p.contains("vertex") {
            ProviderFormat::Gemini
        } else {
            ProviderFormat::OpenAi
        }
    }
}

/// A resolved model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecord {
    /// Catalog id.
    pub id: String,
    pub provider: String,
    /// Upstream model name.
    pub model: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    pub format: ProviderFormat,
    #[serde(skip)]
    pub endpoint: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl From<&ModelConfig> for ModelRecord {
    fn from(mc: &ModelConfig) -> Self {
        Self {
            id: mc.id.clone(),
            provider: mc.provider.clone(),
            model: mc.upstream_model().to_string(),
            name: mc.name.clone().unwrap_or_else(|| mc.id.clone()),
            context_window: mc.context_window,
            format: ProviderFormat::for_provider(&mc.provider),
            endpoint: mc.endpoint.clone(),
            api_key: mc.api_key.clone(),
        }
    }
}

impl ModelRecord {
    pub fn resolve_api_key(&self) -> String {
        crate::config::resolve_config_key(self.api_key.as_deref(), &self.provider)
    }
}

/// Lookup contract consumed by the relay.
pub trait ModelRouter: Send + Sync {
    fn resolve(&self, alias_or_id: &str) -> Option<ModelRecord>;

    /// Catalog grouped by provider; stable across calls.
    fn list_models(&self) -> Vec<ModelRecord>;

    fn default_model(&self) -> &str;

    fn fallback_models(&self) -> &[String];

    /// The requested (or default) model followed by the fallback chain,
    /// without duplicates. Unresolvable fallbacks are skipped; an
    /// unresolvable request is an error.
    fn candidates(&self, requested: Option<&str>) -> anyhow::Result<Vec<ModelRecord>> {
        let wanted = requested
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_model());
        let primary = self
            .resolve(wanted)
            .ok_or_else(|| anyhow::anyhow!("unknown model: {wanted}"))?;

        let mut out = vec![primary];
        for fb in self.fallback_models() {
            match self.resolve(fb) {
                Some(rec) if !out.iter().any(|r| r.id == rec.id) => out.push(rec),
                Some(_) => {}
                None => tracing::warn!(model_ref = %fb, "fallback model not found, skipping"),
            }
        }
        Ok(out)
    }
}

/// Router over the configured model catalog.
#[derive(Debug, Clone)]
pub struct CatalogRouter {
    models: Vec<ModelRecord>,
    aliases: std::collections::HashMap<String, String>,
    default_model: String,
    fallback_models: Vec<String>,
}

impl CatalogRouter {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            models: cfg.models.iter().map(ModelRecord::from).collect(),
            aliases: cfg.aliases.clone(),
            default_model: cfg.default_model.clone(),
            fallback_models: cfg.fallback_models.clone(),
        }
    }

    fn by_id(&self, id: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.id == id)
    }
}

impl ModelRouter for CatalogRouter {
    /// Exact id, then alias, then `provider/model`, then bare upstream
    /// model name.
    fn resolve(&self, alias_or_id: &str) -> Option<ModelRecord> {
        let key = alias_or_id.trim();
        if key.is_empty() {
            return None;
        }

        if let Some(m) = self.by_id(key) {
            return Some(m.clone());
        }
        if let Some(m) = self.aliases.get(key).and_then(|target| self.by_id(target)) {
            return Some(m.clone());
        }
        if let Some((provider, model)) = key.split_once('/') {
            if let Some(m) = self
                .models
                .iter()
                .find(|m| m.provider == provider && (m.model == model || m.id == model))
            {
                return Some(m.clone());
            }
        }
        self.models.iter().find(|m| m.model == key).cloned()
    }

    fn list_models(&self) -> Vec<ModelRecord> {
        let mut providers: Vec<&str> = Vec::new();
        for m in &self.models {
            if !providers.contains(&m.provider.as_str()) {
                providers.push(&m.provider);
            }
        }
        providers
            .into_iter()
            .flat_map(|p| self.models.iter().filter(move |m| m.provider == p))
            .cloned()
            .collect()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn fallback_models(&self) -> &[String] {
        &self.fallback_models
    }
}
