//! Skylift platform service binary.
//!
//! Wires the deployment engine against the real collaborators (git, docker,
//! kubectl, JSON registry) and waits for shutdown. The HTTP layer sits in
//! front of the [`Platform`] facade and is deployed separately.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skylift_build::DockerCli;
use skylift_control::{
    ControlConfig, DisabledGenerator, EnvironmentCheck, JsonStore, KubectlCli, Platform,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("skylift_control=info".parse()?),
        )
        .init();

    info!("Skylift platform service starting");

    let config = ControlConfig::load().unwrap_or_else(|e| {
        info!(error = %e, "failed to load config, using defaults");
        ControlConfig::default()
    });

    info!(
        registry = %config.registry.file.display(),
        git_base = %config.build.git_base.display(),
        server_ip = %config.cluster.server_ip,
        "configuration loaded"
    );

    let check = EnvironmentCheck::run();
    check.validate()?;

    tokio::fs::create_dir_all(&config.build.git_base).await?;

    let store = Arc::new(JsonStore::new(&config.registry.file));
    let cluster = Arc::new(KubectlCli::new(config.cluster.server_ip.clone()));
    let images = Arc::new(DockerCli::new());
    // The model-backed generator is provided by the deployment; the engine
    // itself only needs the seam.
    let generator = Arc::new(DisabledGenerator);

    let platform = Arc::new(Platform::new(config, store, cluster, images, generator));
    info!(templates = ?platform.templates(), "platform engine ready");

    let cancel = CancellationToken::new();
    shutdown_signal(cancel.clone()).await;

    info!("platform service shutdown complete");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
        () = cancel.cancelled() => {
            info!("shutdown requested");
        }
    }
}
