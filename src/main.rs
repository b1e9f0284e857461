use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use modelgate::cli;
use modelgate::config;
use modelgate::continuity::ContinuityStore;
use modelgate::gateway::{self, AppState};
use modelgate::inject::MessageInjector;
use modelgate::relay::Relay;
use modelgate::router::CatalogRouter;
use modelgate::transcript::TranscriptStore;

#[derive(Parser, Debug)]
#[command(
    name = "modelgate",
    version,
    about = "Model relay with OpenAI/Gemini normalisation and session continuity"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP gateway
    Serve {
        /// Listen address (overrides `gateway.addr`)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// List configured models grouped by provider
    Models,
    /// Resolve a model id or alias
    Resolve {
        /// Model id, alias or provider/model
        alias: String,
    },
    /// Inject a synthetic user message into a stored session
    Inject {
        #[arg(long)]
        session: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long, requires = "model")]
        provider: Option<String>,
        #[arg(long, requires = "provider")]
        model: Option<String>,
    },
    /// Convert an OpenAI tool array to Gemini tools. Use "-" for stdin.
    ConvertTools {
        source: String,
        /// Print only the extracted function declarations
        #[arg(long)]
        declarations: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| modelgate::modelgate_home().join("config.yaml"));

    match cli.command {
        None => serve(&config_path, None).await,
        Some(Command::Serve { addr }) => serve(&config_path, addr).await,
        Some(Command::Models) => cli::list_models(&config_path).await,
        Some(Command::Resolve { alias }) => cli::resolve_model(&config_path, &alias).await,
        Some(Command::Inject {
            session,
            text,
            agent,
            provider,
            model,
        }) => cli::inject(&session, &text, agent, provider, model).await,
        Some(Command::ConvertTools {
            source,
            declarations,
        }) => cli::convert_tools(&source, declarations),
    }
}

async fn serve(config_path: &std::path::Path, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    info!(path = %config_path.display(), "loading configuration");
    let cfg = config::Config::load(config_path).await?;

    let addr = match addr {
        Some(a) => a,
        None => cfg
            .gateway
            .addr
            .parse()
            .with_context(|| format!("invalid gateway.addr: {}", cfg.gateway.addr))?,
    };

    let continuity = Arc::new(ContinuityStore::new());
    let router = Arc::new(CatalogRouter::from_config(&cfg));
    let relay = Arc::new(Relay::new(router, continuity.clone(), cfg.max_retries));
    let store = TranscriptStore::from_env();
    info!(root = %store.root().display(), "transcript store");
    let injector = Arc::new(MessageInjector::new(store));

    let gw = gateway::start_gateway(addr, AppState::new(relay, continuity, injector)).await?;
    info!(addr = %gw.addr, models = cfg.models.len(), "modelgate ready");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    gw.handle.abort();
    Ok(())
}
