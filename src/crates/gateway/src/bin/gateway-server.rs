//! Gateway server binary
//!
//! Serves the kramen HTTP surface over a Qdrant-backed endpoint index.

use anyhow::Context;
use clap::Parser;
use gateway::{create_router, AppState, GatewayConfig, StaticKeyValidator};
use llm::LlmFactory;
use resolver::{
    ActionExecutor, InMemoryRegistry, Pipeline, QdrantIndex, SemanticIndex, StepOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tooling::logging::init_tracing;

#[derive(Parser)]
#[command(name = "gateway-server")]
#[command(about = "Natural-language gateway to indexed HTTP APIs", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Configuration file (defaults to config/gateway.toml when present)
    #[arg(short, long, env = "KRAMEN_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host, overrides the configuration
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");
    let args = Args::parse();

    tracing::info!("Loading gateway configuration...");
    let mut config =
        GatewayConfig::load_from(args.config.as_deref()).context("loading gateway configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing::info!(
        qdrant = %config.qdrant_url,
        embedding_model = %config.embedding_model,
        api_keys = config.api_keys.len(),
        integrations = config.integrations.len(),
        "Configuration loaded"
    );
    if config.api_keys.is_empty() {
        tracing::warn!("No api keys configured; every run request will be rejected");
    }

    let settings = config.pipeline_settings();
    let index: Arc<dyn SemanticIndex> =
        Arc::new(QdrantIndex::new(config.qdrant()).context("building Qdrant client")?);
    let executor =
        Arc::new(ActionExecutor::new(config.http_timeout()).context("building HTTP client")?);
    let pipeline = Pipeline::new(index, executor, &settings);

    let registry: InMemoryRegistry = config.integrations.iter().cloned().collect();
    let orchestrator = StepOrchestrator::new(pipeline.clone(), Arc::new(registry), &settings);

    let mut models = LlmFactory::new().with_timeout(config.llm_timeout());
    if let Some(url) = &config.openai_base_url {
        models = models.with_openai_base_url(url);
    }
    if let Some(url) = &config.anthropic_base_url {
        models = models.with_anthropic_base_url(url);
    }

    let shutdown = CancellationToken::new();
    let state = AppState {
        pipeline,
        orchestrator,
        models: Arc::new(models),
        auth: Arc::new(StaticKeyValidator::new(config.api_keys.clone())),
        shutdown: shutdown.clone(),
    };
    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Starting gateway server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Gateway server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and cancels in-flight deep runs.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL-C signal, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down");
        }
    }

    shutdown.cancel();
}
