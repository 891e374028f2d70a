use invoice_risk_engine::{
    config::Config,
    engine::{Scorer, ScoringEngine},
    routes::{self, AppState},
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_risk_engine=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    let prometheus = invoice_risk_engine::metrics::install_recorder()?;

    let addr: SocketAddr = config.bind_addr().parse()?;
    let lazy_load = config.models.lazy_load;

    let engine = Arc::new(ScoringEngine::new(config));
    if lazy_load {
        info!("Model loading deferred to first scoring call");
    } else {
        let status = engine.initialize();
        info!(
            models_loaded = status.models_loaded,
            fallback_mode = status.fallback_mode,
            "Scoring engine ready"
        );
    }

    let scorer: Arc<dyn Scorer> = engine;
    let app = routes::router(AppState::new(scorer).with_prometheus(prometheus));

    info!("Starting invoice risk engine on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Shutdown signal received, starting graceful shutdown");
}
