use crate::generator::Generator;
use crate::state::AppState;
use crate::store::KubeStore;
use std::env;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod deployment;
mod error;
mod generator;
mod resources;
mod state;
mod store;
mod webserver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!(
        "Starting deploymentconfig-generator {}",
        env!("CARGO_PKG_VERSION")
    );

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = config::load_config(&config_path)?;

    let client = store::create_client().await?;
    let default_namespace = config
        .namespace
        .clone()
        .unwrap_or_else(|| client.default_namespace().to_string());
    info!("Using default namespace {}", default_namespace);

    let kube_store = KubeStore::new(client);
    let shutdown = CancellationToken::new();
    let state = AppState::new(
        Generator::new(kube_store.clone(), kube_store),
        default_namespace,
        shutdown.clone(),
    );

    let app = webserver::create_app(state);
    let addr = config.webserver.socket_addr();
    info!("Starting webserver on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Webserver stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, cancelling in-flight requests");
    shutdown.cancel();
}
