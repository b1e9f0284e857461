//! CLI subcommand handlers.
//!
//! Keeps `main.rs` slim: clap parsing stays there, the logic lives here.

use std::io::Read;
use std::path::Path;

use anyhow::Context;

use crate::config;
use crate::inject::{InjectContext, MessageInjector};
use crate::normalize::{extract_declarations, to_gemini_tools, NormalizeOptions};
use crate::router::{CatalogRouter, ModelRouter};
use crate::transcript::{ModelRef, TranscriptStore};

/// Print the model catalog grouped by provider.
pub async fn list_models(config_path: &Path) -> anyhow::Result<()> {
    let cfg = config::Config::load(config_path).await?;
    let router = CatalogRouter::from_config(&cfg);

    println!("{:<16} {:<12} {:<32} {:<10}", "ID", "PROVIDER", "MODEL", "FORMAT");
    println!("{}", "─".repeat(72));
    let models = router.list_models();
    for m in &models {
        let marker = if m.id == router.default_model() { " *" } else { "" };
        println!(
            "{:<16} {:<12} {:<32} {:<10}{marker}",
            m.id,
            m.provider,
            m.model,
            format!("{:?}", m.format).to_lowercase(),
        );
    }
    println!("\n{} model(s) configured; * = default.", models.len());
    if !router.fallback_models().is_empty() {
        println!("fallbacks: {}", router.fallback_models().join(" → "));
    }
    Ok(())
}

/// Resolve a name the way the relay would and print the result as JSON.
pub async fn resolve_model(config_path: &Path, alias: &str) -> anyhow::Result<()> {
    let cfg = config::Config::load(config_path).await?;
    let router = CatalogRouter::from_config(&cfg);
    let record = router
        .resolve(alias)
        .with_context(|| format!("unknown model: {alias}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Inject a synthetic user message into a stored session.
pub async fn inject(
    session_id: &str,
    text: &str,
    agent: Option<String>,
    provider: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let injector = MessageInjector::new(TranscriptStore::from_env());
    let ctx = InjectContext {
        agent,
        model: match (provider, model) {
            (Some(p), Some(m)) => Some(ModelRef::new(p, m)),
            (None, None) => None,
            _ => anyhow::bail!("--provider and --model must be given together"),
        },
        ..Default::default()
    };

    let injected = injector.try_inject(session_id, text, &ctx).await?;
    println!(
        "injected {} into session {} (agent: {})",
        injected.message.id,
        session_id,
        injected.message.agent.as_deref().unwrap_or_default()
    );
    Ok(())
}

/// Convert an OpenAI tools file (or stdin) to a Gemini tools block.
pub fn convert_tools(source: &str, declarations_only: bool) -> anyhow::Result<()> {
    let raw = read_file_source(source)?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("parse tools JSON")?;

    if declarations_only {
        println!("{}", serde_json::to_string_pretty(&extract_declarations(&value))?);
        return Ok(());
    }

    let tools = value
        .as_array()
        .context("expected a JSON array of OpenAI tools")?;
    let normalized = to_gemini_tools(tools, NormalizeOptions::from_env());
    for s in &normalized.skipped {
        eprintln!("skipped tool #{}: {}", s.index, s.reason);
    }
    println!("{}", serde_json::to_string_pretty(&normalized.value)?);
    Ok(())
}

/// Read contents from a source: a path, or "-" for stdin.
fn read_file_source(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("read file {source}"))
    }
}
