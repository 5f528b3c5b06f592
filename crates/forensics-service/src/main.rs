use anyhow::Result;
use common::history::HistoryWriter;
use forensics_service::{
    api,
    classifier::{http::HttpClassifier, mock::MockClassifier, Classifier},
    config::ForensicsServiceConfig,
    history::JsonFileHistory,
    media::FfmpegOpener,
    ForensicsServiceState,
};
use std::sync::Arc;
use telemetry::LogConfig;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = telemetry::init_structured_logging(
        LogConfig::new("forensics-service").with_version(common::VERSION),
    );

    info!("Starting Forensics Service...");

    let config = ForensicsServiceConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        node_id = %config.node_id,
        history = %config.history_path.display(),
        interval_secs = config.analysis.frame_interval_secs,
        "Forensics Service configuration loaded"
    );

    let classifier: Arc<dyn Classifier> = match &config.classifier_url {
        Some(url) => {
            info!("Using remote classifier at: {}", url);
            Arc::new(HttpClassifier::new(
                url.clone(),
                config.classifier_api_key.clone(),
                config.classifier_timeout,
            )?)
        }
        None => {
            warn!("CLASSIFIER_URL not set; running in standalone mode with the mock classifier");
            Arc::new(MockClassifier::new())
        }
    };

    let history: Arc<dyn HistoryWriter> =
        Arc::new(JsonFileHistory::new(&config.history_path, config.history_limit));
    let opener = Arc::new(FfmpegOpener::new(config.capture));

    let state = ForensicsServiceState::new(
        config.node_id.clone(),
        classifier,
        history,
        opener,
        config.analysis.clone(),
    );

    let app = api::router(state.clone());

    info!("Binding to {}", config.bind_addr);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Forensics Service listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: ForensicsServiceState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
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
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
    if let Err(e) = state.shutdown().await {
        error!("Error during shutdown: {}", e);
    }
}
