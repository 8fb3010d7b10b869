use axum::{http::Method, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::AppState;

pub mod email;

pub fn routes() -> Router<Arc<AppState>> {
    // Mobile clients call from arbitrary origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(email::routes())
        .layer(cors)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "ETP Backend is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "emailService": "Active",
        "status": "healthy",
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "service": "email-service",
    }))
}
