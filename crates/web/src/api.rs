//! JSON API: scrape triggers and read endpoints for the persisted data.
//! Response bodies keep the same field names as the stored files.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
    }))
}

/// Scheduled page-scrape trigger. When a secret is configured the caller
/// must present it as a bearer token. The `x-cron-trigger` header marks
/// scheduler-originated calls; everything else is reported as manual.
pub async fn cron(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(secret) = &state.cron_secret {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == secret.as_str());
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "message": "unauthorized" })),
            )
                .into_response();
        }
    }

    let source = if headers.contains_key("x-cron-trigger") {
        "scheduled"
    } else {
        "manual"
    };

    match state.orchestrator.run_page_once().await {
        Ok((page, diff)) => Json(json!({
            "success": true,
            "message": "Page scraped successfully",
            "timestamp": Utc::now(),
            "dataCount": page.links.len(),
            "diff": diff,
            "source": source,
        }))
        .into_response(),
        Err(error) => {
            tracing::error!(%error, source, "cron page scrape failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Scrape failed",
                    "error": error.to_string(),
                    "timestamp": Utc::now(),
                    "source": source,
                })),
            )
                .into_response()
        }
    }
}

/// Manual portfolio scrape. Runs a full collection and returns the fresh
/// comparison report.
pub async fn scrape(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.run_portfolio_once().await {
        Ok(report) => Json(json!({
            "success": true,
            "message": "Scrape completed",
            "data": report,
            "timestamp": Utc::now(),
        }))
        .into_response(),
        Err(error) => {
            tracing::error!(%error, "portfolio scrape failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Scrape failed",
                    "error": error.to_string(),
                    "timestamp": Utc::now(),
                })),
            )
                .into_response()
        }
    }
}

/// Current and previous page captures plus their diff.
pub async fn data(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.page_data() {
        Ok(page_data) => Json(json!({
            "success": true,
            "hasData": page_data.current.is_some(),
            "current": page_data.current,
            "previous": page_data.previous,
            "diff": page_data.diff,
        }))
        .into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to read page data");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Failed to read data" })),
            )
                .into_response()
        }
    }
}

/// Comparison report recomputed from the stored snapshot history.
pub async fn comparison(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.portfolio_comparison() {
        Ok(Some(report)) => {
            Json(json!({ "success": true, "data": report })).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "No snapshot data available" })),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to build comparison");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Failed to build comparison" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{failing_app, page_app, portfolio_app, secured_page_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let app = portfolio_app(vec![]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json.get("version").is_some());
    }

    #[tokio::test]
    async fn test_scrape_returns_report() {
        let app = portfolio_app(vec![vec![("0xa", 100.0), ("0xb", 50.0)]]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/scrape")
                    .method("POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["totalValue"], 150.0);
        assert_eq!(json["data"]["addresses"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_failure_returns_500() {
        let app = failing_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/scrape")
                    .method("POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn test_comparison_404_without_snapshots() {
        let app = portfolio_app(vec![]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/comparison")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_comparison_after_scrape() {
        let app = portfolio_app(vec![vec![("0xa", 100.0)]]);
        app.clone()
            .oneshot(
                Request::builder()
                    .uri("/api/scrape")
                    .method("POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/comparison")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["totalValue"], 100.0);
    }

    #[tokio::test]
    async fn test_data_has_no_data_initially() {
        let app = page_app(vec![]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["hasData"], false);
        assert!(json["diff"].is_null());
    }

    #[tokio::test]
    async fn test_cron_scrapes_and_reports_manual_source() {
        let app = page_app(vec![vec!["/a", "/b"]]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cron")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["dataCount"], 2);
        assert_eq!(json["source"], "manual");
        assert_eq!(json["diff"]["type"], "initial");
    }

    #[tokio::test]
    async fn test_cron_header_marks_scheduled_source() {
        let app = page_app(vec![vec!["/a"]]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cron")
                    .header("x-cron-trigger", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["source"], "scheduled");
    }

    #[tokio::test]
    async fn test_cron_requires_bearer_when_secret_set() {
        let app = secured_page_app("hunter2", vec![vec!["/a"]]);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/cron")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cron")
                    .header("Authorization", "Bearer hunter2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cron_rejects_wrong_token() {
        let app = secured_page_app("hunter2", vec![vec!["/a"]]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cron")
                    .header("Authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_data_after_two_cron_runs_has_diff() {
        let app = page_app(vec![vec!["/a"], vec!["/a", "/b"]]);
        for _ in 0..2 {
            app.clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/cron")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/data")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["hasData"], true);
        assert_eq!(json["diff"]["type"], "comparison");
        assert_eq!(json["diff"]["summary"]["newCount"], 1);
    }
}
