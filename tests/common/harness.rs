//! Test server harness.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use verdict::external::{CannedProvider, EvaluationProvider};
use verdict::gateway::{HandlerState, create_router_with_state};
use verdict::router::{Orchestrator, OrchestratorConfig};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Default)]
pub struct TestServerConfig {
    /// `0` picks an ephemeral port.
    pub port: u16,
    pub orchestrator: OrchestratorConfig,
}

impl TestServerConfig {
    pub fn orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }
}

pub struct TestServer<P: EvaluationProvider> {
    pub addr: SocketAddr,
    pub orchestrator: Arc<Orchestrator<P>>,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl<P: EvaluationProvider> TestServer<P> {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl<P: EvaluationProvider> Drop for TestServer<P> {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Spawns a server whose tier 4 is the local [`CannedProvider`] (always scores 88).
pub async fn spawn_test_server(
    config: TestServerConfig,
) -> Result<TestServer<CannedProvider>, ServerStartupError> {
    spawn_server_with_provider(config, CannedProvider).await
}

/// Spawns a server in front of an arbitrary provider.
pub async fn spawn_server_with_provider<P: EvaluationProvider>(
    config: TestServerConfig,
    provider: P,
) -> Result<TestServer<P>, ServerStartupError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let orchestrator = Arc::new(Orchestrator::new(config.orchestrator, Arc::new(provider)));
    let app = create_router_with_state(HandlerState::new(Arc::clone(&orchestrator)));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        orchestrator,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
    })
}
