//! Verdict HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use verdict::cache::ExpirySweeper;
use verdict::config::Config;
use verdict::external::EvaluationProvider;
use verdict::gateway::{HandlerState, create_router_with_state};
use verdict::router::Orchestrator;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    let provider = config.provider()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        provider = provider.name(),
        fallback_timeout_ms = config.fallback_timeout.as_millis() as u64,
        cache_capacity = config.cache_capacity,
        "Verdict starting"
    );
    if config.provider_url.is_none() && !config.mock_provider {
        tracing::warn!("No VERDICT_PROVIDER_URL configured, tier 4 disabled; misses fall back to the heuristic");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        config.orchestrator_config(),
        Arc::new(provider),
    ));

    let sweeper = config.sweeper_enabled().then(|| {
        let sweeper = ExpirySweeper::new(
            Arc::clone(orchestrator.exact_cache()),
            config.sweep_interval,
        );
        let _ = sweeper.start();
        sweeper
    });

    let app = create_router_with_state(HandlerState::new(orchestrator));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.stop();
    }

    tracing::info!("Verdict shutdown complete");
    Ok(())
}

async fn run_health_check() -> i32 {
    let port = std::env::var(Config::ENV_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
    {
        Ok(client) => client,
        Err(_) => return 1,
    };

    match client.get(&url).send().await {
        Ok(res) if res.status().is_success() => 0,
        _ => 1,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
