//! Exercises the producer HTTP surface against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use jobq_server::{build_router, JobService};
use jobq_testing::InMemoryJobStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let store = Arc::new(InMemoryJobStore::new());
    let service = Arc::new(JobService::new(store));
    build_router(service)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_then_fetch_a_job() {
    let app = test_app();

    let create_req = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"job_type": "emails", "payload": {"to": "a@b"}, "queue_name": "default", "max_tries": 3}).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["status"], "pending");

    let get_req = Request::builder()
        .uri(format!("/api/v1/jobs/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["id"], id);
}

#[tokio::test]
async fn get_missing_job_is_404() {
    let app = test_app();
    let req = Request::builder().uri("/api/v1/jobs/999").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_create_rejects_over_100_jobs() {
    let app = test_app();
    let jobs: Vec<Value> = (0..101)
        .map(|_| json!({"job_type": "emails", "payload": {}, "queue_name": "default", "max_tries": 3}))
        .collect();

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs/bulk")
        .header("content-type", "application/json")
        .body(Body::from(json!({"jobs": jobs}).to_string()))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_rejects_limit_out_of_range() {
    let app = test_app();
    let req = Request::builder()
        .uri("/api/v1/jobs?limit=5000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_then_second_cancel_is_400() {
    let app = test_app();

    let create_req = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"job_type": "emails", "payload": {}, "queue_name": "default", "scheduled_at": null, "max_tries": 3}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(create_req).await.unwrap();
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let cancel_req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/jobs/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(cancel_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let second_cancel = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/jobs/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(second_cancel).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_rejects_a_status_field() {
    let app = test_app();

    let create_req = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"job_type": "emails", "payload": {}, "queue_name": "default", "max_tries": 3}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(create_req).await.unwrap();
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let update_req = Request::builder()
        .method("PUT")
        .uri(format!("/api/v1/jobs/{id}"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"status": "completed", "max_tries": 5}).to_string()))
        .unwrap();
    let response = app.oneshot(update_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_rejects_a_non_object_payload() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"job_type": "emails", "payload": [1, 2, 3], "queue_name": "default", "max_tries": 3}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = test_app();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
