use axum::Json;
use serde_json::{Value, json};

pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "orderline",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    }))
}

pub async fn healthz() -> &'static str {
    "ok"
}
