//! JSON HTTP surface over [`OrderService`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::service::{OrderService, ServiceError};

pub fn router(service: OrderService) -> Router {
    Router::new()
        .route("/", get(orders))
        .route("/orders", get(orders))
        .route("/all_orders", get(all_orders))
        .route("/toggle_collected", post(toggle_collected))
        .route("/debug", get(debug_dump))
        .with_state(service)
}

/// Check numbers arrive as strings or bare numbers depending on the client.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChkNum {
    Text(String),
    Number(i64),
}

impl ChkNum {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    chk_num: ChkNum,
}

async fn orders(State(service): State<OrderService>) -> impl IntoResponse {
    Json(service.snapshot().as_ref().clone())
}

async fn all_orders(State(service): State<OrderService>) -> Response {
    match service.list_all().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("Failed to list orders: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to list orders"})),
            )
                .into_response()
        }
    }
}

async fn toggle_collected(
    State(service): State<OrderService>,
    Json(request): Json<ToggleRequest>,
) -> Response {
    let chk_num = request.chk_num.into_string();
    match service.toggle_collected(&chk_num).await {
        Ok(collected) => Json(json!({
            "success": true,
            "new_status": u8::from(collected),
        }))
        .into_response(),
        Err(ServiceError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Order not found"})),
        )
            .into_response(),
        Err(e) => {
            error!(chk_num = %chk_num, "Failed to toggle collected flag: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Internal error"})),
            )
                .into_response()
        }
    }
}

async fn debug_dump(State(service): State<OrderService>) -> Response {
    match service.list_all().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("Error in debug route: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
