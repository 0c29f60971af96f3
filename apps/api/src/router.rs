use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use chrono::Utc;
use serde_json::{json, Value};

use opd_queue_cell::{opd_routes, SharedEngine};
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, engine: SharedEngine) -> Router {
    let capacity = config.default_slot_capacity;

    Router::new()
        .route("/", get(|| async { "OPD Token Allocation API is running!" }))
        .route("/health", get(move || health_check(capacity)))
        .nest("/api", opd_routes(engine))
}

async fn health_check(default_slot_capacity: u32) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "default_slot_capacity": default_slot_capacity
    }))
}
