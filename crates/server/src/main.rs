//! Server binary: loads configuration, opens the store, starts the
//! recurring analysis job, and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use siem_engine::{CollectorClient, EventSource, RiskEngine, SiemStore, ThreatAnalysisJob};
use siem_server::api::{api_router, AppState};
use siem_server::config::SiemConfig;
use siem_server::db::Database;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Config file path from CLI args; SIEM_CONFIG env var is the fallback
    let args: Vec<String> = std::env::args().collect();
    let config_path: Option<PathBuf> = args
        .iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = SiemConfig::resolve(config_path).expect("Failed to load config");

    tracing::info!("📁 Database: {:?}", config.db_path);
    tracing::info!("📡 Event collector: {}", config.collector_base_url);

    let db = Database::open(&config.db_path).expect("Failed to open database");
    let store: Arc<dyn SiemStore> = Arc::new(db);
    let source: Arc<dyn EventSource> = Arc::new(
        CollectorClient::new(config.collector_base_url.as_str(), config.request_timeout())
            .expect("Failed to build collector client"),
    );
    let risk = Arc::new(RiskEngine::new(Arc::clone(&store)));
    let job = Arc::new(ThreatAnalysisJob::new(
        Arc::clone(&source),
        Arc::clone(&store),
        Arc::clone(&risk),
        config.working_hours.clone(),
        config.analysis_interval(),
    ));
    job.start();
    tracing::info!(
        "Analysis job scheduled every {}s",
        config.analysis_interval_secs
    );

    let state = Arc::new(AppState {
        store,
        risk,
        job: Arc::clone(&job),
        source,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api_router(state).layer(cors);

    tracing::info!(
        "🚀 Insider threat engine running at http://{}",
        config.bind_addr
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    job.stop();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");
    tracing::info!("Shutting down...");
}
