use anyhow::Result;
use clap::Parser;
use linkread::orchestrator::Orchestrator;
use linkread::providers::factory::ProviderRegistry;
use linkread_server::configuration::Settings;
use linkread_server::routes;
use linkread_server::state::{body_limit_for, AppState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "MCP server exposing the read_link tool")]
struct Cli {
    /// Port to listen on. Overrides the configured port.
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::new()?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let reader_config = settings.reader_config();
    let registry =
        ProviderRegistry::from_configs(&reader_config.providers, &reader_config.call_policy)?;
    if registry.is_empty() {
        tracing::warn!("no AI provider is configured; only web pages can be read");
    } else {
        info!(providers = ?registry.configured(), "providers ready");
    }
    let orchestrator = Orchestrator::new(reader_config, &registry)?;

    let state = AppState::new(Arc::new(orchestrator))
        .with_response_deadline(settings.response_deadline())
        .with_ping_interval(settings.ping_interval())
        .with_body_limit(body_limit_for(settings.fallback.max_file_size));
    let app = routes::configure(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
