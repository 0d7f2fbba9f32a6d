//! HTTP server for identity-document field extraction.

use crate::config::ServerConfig;
use crate::engine::{
    download_image, EngineError, ExtractEngine, ExtractRequest, ExtractResponse,
    SharedExtractEngine,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
struct AppState {
    engine: SharedExtractEngine,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize extraction engine
    info!("Initializing extraction engine...");
    let engine = ExtractEngine::new(&config.extractor)?;
    let engine = Arc::new(engine);
    info!("Extraction engine initialized successfully");

    let state = Arc::new(AppState { engine });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/extract", post(extract_handler))
        .route("/api/v1/extract", post(extract_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Parse address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health         - Health check");
    info!("  POST /extract        - Field extraction");
    info!("  POST /api/v1/extract - Field extraction (versioned API)");

    // Create listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Field extraction endpoint
async fn extract_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractRequest>,
) -> impl IntoResponse {
    let request_id = uuid::Uuid::new_v4().to_string();
    info!(request_id = %request_id, url = %request.url, "Processing extraction request");

    let start = Instant::now();

    // Download image
    let image = match download_image(&request.url).await {
        Ok(img) => img,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to download image");
            return error_response(&request_id, &e);
        }
    };

    let download_time = start.elapsed();
    info!(
        request_id = %request_id,
        width = image.width(),
        height = image.height(),
        download_ms = download_time.as_secs_f64() * 1000.0,
        "Image downloaded"
    );

    // Run the extraction pipeline
    let extract_start = Instant::now();
    let result = match state.engine.process(&image, &request_id) {
        Ok(r) => r,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Extraction failed");
            return error_response(&request_id, &e);
        }
    };

    let processing_time = extract_start.elapsed();
    let total_time = start.elapsed();

    info!(
        request_id = %request_id,
        fields = result.fields.len(),
        extract_ms = processing_time.as_secs_f64() * 1000.0,
        total_ms = total_time.as_secs_f64() * 1000.0,
        "Extraction completed"
    );

    let response = ExtractEngine::result_to_response(
        &result,
        image.width(),
        image.height(),
        processing_time.as_secs_f64() * 1000.0,
    );

    (StatusCode::OK, Json(response))
}

/// Map an engine failure onto an HTTP status: transport and decode problems
/// are bad requests, layout validation rejections are unprocessable photos
/// and carry the machine reason code, everything else is an internal fault.
fn error_response(request_id: &str, err: &EngineError) -> (StatusCode, Json<ExtractResponse>) {
    match err {
        EngineError::Download(_) | EngineError::ImageLoad(_) => (
            StatusCode::BAD_REQUEST,
            Json(ExtractResponse::error(request_id, err.to_string(), None)),
        ),
        EngineError::Pipeline(e) if e.is_validation_failure() => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ExtractResponse::error(
                request_id,
                err.to_string(),
                e.reason_code(),
            )),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExtractResponse::error(request_id, err.to_string(), None)),
        ),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
