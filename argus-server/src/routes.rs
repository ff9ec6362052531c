//! HTTP router: the preview endpoint plus liveness/health probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::preview::video_feed_handler;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/api/video-feed", get(video_feed_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping_handler() -> Json<Value> {
    info!("Ping endpoint called");
    Json(json!({
        "status": "ok",
        "message": "Argus monitoring service is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let mut health = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    let mut unhealthy = false;
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => {
            health["checks"]["database"] = json!({ "status": "healthy" });
        }
        Err(e) => {
            health["checks"]["database"] = json!({
                "status": "unhealthy",
                "error": e.to_string()
            });
            unhealthy = true;
        }
    }

    health["checks"]["cameras"] = json!({
        "status": "healthy",
        "enabled": state.directory.snapshot().len()
    });

    if unhealthy {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(Json(health))
    }
}
