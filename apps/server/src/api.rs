//! JSON inventory API for the companion Mini App page.
//!
//! One GET endpoint backed by the same cache the bot uses. CORS is wide
//! open so the static page can be served from anywhere.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracker_alerts::Database;

#[derive(Debug, Deserialize)]
struct InventoryQuery {
    chat_id: Option<i64>,
}

/// Inventory row shape consumed by the static page.
#[derive(Debug, Serialize)]
struct ApiItem {
    name: String,
    amount: i64,
    category: String,
    icon: String,
}

/// Build the API router.
pub fn router(db: Database) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/inventory", get(get_inventory))
        .layer(cors)
        .with_state(db)
}

async fn get_inventory(
    State(db): State<Database>,
    Query(query): Query<InventoryQuery>,
) -> Response {
    let Some(chat_id) = query.chat_id else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "no_id"}))).into_response();
    };

    match db.user_inventory(chat_id).await {
        Ok(rows) => {
            let items: Vec<ApiItem> = rows
                .into_iter()
                .map(|row| ApiItem {
                    name: row.name,
                    amount: row.amount,
                    category: row.category,
                    icon: row.icon,
                })
                .collect();
            Json(items).into_response()
        }
        Err(e) => {
            warn!(chat_id, error = %e, "Inventory query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "db"})),
            )
                .into_response()
        }
    }
}

/// Bind and serve the API until the task is aborted.
pub async fn serve(db: Database, port: u16) {
    let app = router(db);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind API port {}: {}", port, e);
            return;
        }
    };
    info!("Mini App API listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        warn!("API server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn test_db() -> Database {
        Database::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_chat_id_is_bad_request() {
        let app = router(test_db().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/inventory")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!({"error": "no_id"}));
    }

    #[tokio::test]
    async fn test_unknown_chat_is_empty_array() {
        let app = router(test_db().await);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/inventory?chat_id=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!([]));
    }

    #[tokio::test]
    async fn test_inventory_rows_round_trip() {
        use tracker_core::{Category, InventoryItem};

        let db = test_db().await;
        let items = vec![InventoryItem {
            market_hash_name: "Revolution Case".into(),
            name: "Revolution Case".into(),
            type_line: "Base Grade Container".into(),
            icon_url: "abc".to_string(),
            amount: 4,
            category: Category::Case,
        }];
        db.replace_user_inventory(42, &items, 730).await.unwrap();

        let app = router(db);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/inventory?chat_id=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed[0]["name"], "Revolution Case");
        assert_eq!(parsed[0]["amount"], 4);
        assert_eq!(parsed[0]["category"], "Cases");
    }
}
