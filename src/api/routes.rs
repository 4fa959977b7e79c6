use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{config, distcp, location, migration, strategy, AppState};
use crate::config::{Config, ConfigurationProvider};
use crate::services::metastore::MetastorePoolManager;
use crate::storage::RunStore;

/// Create router with application state
pub fn create_router_with_state(store: Arc<RunStore>, config: Config, provider: Arc<ConfigurationProvider>) -> Router {
    let state = AppState {
        store,
        config,
        provider,
        metastore: Arc::new(MetastorePoolManager::new()),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/config", get(config::get_config).put(config::update_config))
        .route("/api/config/reload", post(config::reload_config))
        .route(
            "/api/warehouse-plans/{database}",
            put(config::put_warehouse_plan).delete(config::delete_warehouse_plan),
        )
        .route("/api/strategies/select", post(strategy::select_strategy))
        .route("/api/strategies/recommendations", post(strategy::strategy_recommendations))
        .route("/api/locations/glm", post(location::translate_location))
        .route("/api/distcp/plan", post(distcp::generate_plan))
        .route("/api/distcp/script", post(distcp::generate_script))
        .route("/api/distcp/workbook", post(distcp::generate_workbook))
        .route(
            "/api/migrations",
            get(migration::list_migrations).post(migration::create_migration),
        )
        .route("/api/migrations/{id}", get(migration::get_migration))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategies::fixtures;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = RunStore::in_memory().await.unwrap();
        let config = Config {
            server: crate::config::ServerConfig {
                host: "127.0.0.1".into(),
                port: 3000,
            },
            storage: crate::config::StorageConfig { url: ":memory:".into() },
            logging: crate::config::LoggingConfig { level: "info".into() },
            mirror_config_path: None,
        };
        let provider = Arc::new(ConfigurationProvider::new(fixtures::config()));
        create_router_with_state(Arc::new(store), config, provider)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_warehouse_plan_lifecycle() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "PUT",
            "/api/warehouse-plans/sales",
            Some(json!({ "external_directory": "/lake/ext", "managed_directory": "/lake/managed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["warehouse"]["external_directory"], "/lake/ext");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/warehouse-plans/sales",
            Some(json!({ "external_directory": "/same", "managed_directory": "/same" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", "/api/warehouse-plans/sales", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "DELETE", "/api/warehouse-plans/sales", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_strategy_selection() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/strategies/select",
            Some(json!({ "preferred_strategy": "SQL", "include_data": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selection"]["strategy"], "SQL");

        let (status, body) = send(&app, "POST", "/api/strategies/recommendations", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["primary"], "SCHEMA_ONLY");
    }

    #[tokio::test]
    async fn test_migration_run_is_stored() {
        let app = app().await;
        let mut db = fixtures::db();
        db.add_table(fixtures::external_table("t1"));

        let (status, body) = send(&app, "POST", "/api/migrations", Some(serde_json::to_value(&db).unwrap())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["run"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["run"]["status"]["succeeded"], 1);

        let (_, body) = send(&app, "GET", "/api/migrations", None).await;
        assert_eq!(body["runs"].as_array().unwrap().len(), 1);

        let (status, body) = send(&app, "GET", &format!("/api/migrations/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["run"]["database"], "db1");

        let (status, _) = send(&app, "GET", "/api/migrations/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
