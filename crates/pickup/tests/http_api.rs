use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use pickup::http::router;
use pickup::{OrderService, ViewProjector};
use pickup_db::OrderCache;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> (axum::Router, OrderCache, ViewProjector) {
    let cache = OrderCache::open_memory().await.unwrap();
    cache.ensure_table().await.unwrap();
    cache.upsert_if_changed("21", 50).await.unwrap();
    cache.upsert_if_changed("3", 60).await.unwrap();
    cache.upsert_if_changed("4", 70).await.unwrap();
    let projector = ViewProjector::new(cache.clone());
    projector.refresh().await.unwrap();
    let app = router(OrderService::new(cache.clone(), projector.clone()));
    (app, cache, projector)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn toggle_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/toggle_collected")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_orders_returns_snapshot() {
    let (app, _cache, _projector) = setup().await;

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"being_prepared": ["21"], "ready_to_collect": ["3"]})
    );
}

#[tokio::test]
async fn test_all_orders_lists_every_record() {
    let (app, _cache, _projector) = setup().await;

    let response = app
        .oneshot(Request::get("/all_orders").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["collected"] == 0));
}

#[tokio::test]
async fn test_toggle_collected_flips_and_rebuilds() {
    let (app, cache, projector) = setup().await;

    let response = app
        .clone()
        .oneshot(toggle_request(json!({"chk_num": "3"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": true, "new_status": 1}));
    assert!(cache.get("3").await.unwrap().unwrap().collected);
    assert!(projector.current().ready_to_collect.is_empty());

    let response = app
        .oneshot(toggle_request(json!({"chk_num": 3})))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"success": true, "new_status": 0}));
    assert_eq!(projector.current().ready_to_collect, vec!["3"]);
}

#[tokio::test]
async fn test_toggle_unknown_order_is_404() {
    let (app, cache, _projector) = setup().await;
    let before = cache.list_all().await.unwrap();

    let response = app
        .oneshot(toggle_request(json!({"chk_num": "999"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"success": false, "error": "Order not found"})
    );
    assert_eq!(cache.list_all().await.unwrap(), before);
}

#[tokio::test]
async fn test_debug_reports_store_failure() {
    let (app, cache, _projector) = setup().await;
    sqlx::query("DROP TABLE orders")
        .execute(cache.pool())
        .await
        .unwrap();

    let response = app
        .oneshot(Request::get("/debug").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
}
