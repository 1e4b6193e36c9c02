use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use slotdesk::accounts::AccountDirectory;
use slotdesk::api::{self, AppState};
use slotdesk::config::Config;
use slotdesk::tenant::TenantManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    slotdesk::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let accounts = AccountDirectory::load(&config.accounts_file)?;

    let shutdown = CancellationToken::new();
    let tenants = Arc::new(TenantManager::new(
        config.data_dir.clone(),
        config.compact_threshold,
        shutdown.clone(),
    ));
    let limiter = Arc::new(Semaphore::new(config.max_connections));
    let state = AppState {
        tenants,
        credentials: Arc::new(accounts),
        policy: config.policy,
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
        limiter: limiter.clone(),
    };

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("slotdesk listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  accounts_file: {}", config.accounts_file.display());
    info!("  max_connections: {}", config.max_connections);
    info!(
        "  business hours: {:02}:00-{:02}:00, {} min slots",
        config.policy.open_hour, config.policy.close_hour, config.policy.slot_minutes
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let server = tokio::spawn(api::serve(listener, state, shutdown.clone()));

    wait_for_signal().await;
    info!("shutdown signal received, no longer accepting requests");
    shutdown.cancel();

    // In-flight requests get up to 10s to finish.
    info!("draining requests...");
    match tokio::time::timeout(Duration::from_secs(10), server).await {
        Ok(Ok(Ok(()))) => info!("all requests drained"),
        Ok(Ok(Err(e))) => error!("server error: {e}"),
        Ok(Err(e)) => error!("server task failed: {e}"),
        Err(_) => {
            let remaining = config.max_connections - limiter.available_permits();
            warn!("drain timeout, {remaining} requests still open");
        }
    }

    info!("slotdesk stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
