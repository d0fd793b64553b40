//! Review Assistant Gateway
//!
//! HTTP entry point for the review question-answering service.
//! Handles:
//! - Question answering over the review index (`POST /api/ask`)
//! - Health and readiness checks
//! - Serving the static frontend under `/app`

mod handlers;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use reviewqa_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    embeddings,
    llm::OllamaAnswerer,
    metrics,
    retrieval::VectorRetriever,
    telemetry, Answerer, Retriever, VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers.
///
/// Built once at startup; handlers only read through it.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<dyn Retriever>,
    pub answerer: Arc<dyn Answerer>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    telemetry::init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting Review Assistant Gateway v{}", VERSION
    );

    // Initialize metrics
    metrics::install_exporter(config.observability.metrics_port)?;

    // Connect to the vector store
    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);

    match repository.count_reviews().await {
        Ok(0) => warn!("Vector store is empty; run the ingestion binary to index reviews"),
        Ok(count) => info!(reviews = count, "Vector store ready"),
        Err(e) => warn!(error = %e, "Could not count indexed reviews"),
    }

    // Build retriever and answerer once; shared by every request
    let embedder = embeddings::create_embedder(&config.embedding)?;
    let retriever = VectorRetriever::new(Arc::new(repository), embedder, config.retrieval.top_k);

    // Stays up on mismatch; /api/ready reports it until the index is rebuilt
    if let Err(e) = retriever.check_embedding_model().await {
        warn!(error = %e, "Embedding model check failed");
    }

    let answerer = OllamaAnswerer::new(&config.llm)?;

    info!(
        top_k = retriever.top_k(),
        embedding_model = %config.embedding.model,
        llm_model = %answerer.model_name(),
        "Pipeline initialized"
    );

    let state = AppState {
        retriever: Arc::new(retriever),
        answerer: Arc::new(answerer),
    };

    // Build the router
    let app = create_router(state, &config.server.static_dir);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState, static_dir: &str) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/ask", post(handlers::ask::ask));

    // Frontend lives under /app so it never shadows /api
    let frontend = ServeDir::new(static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(handlers::root_redirect))
        .nest("/api", api_routes)
        .nest_service("/app", frontend)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
