//! `api` crate: HTTP REST API layer over the engine.
//!
//! Exposes:
//!   GET|POST            /api/workflows
//!   GET|PUT|DELETE      /api/workflows/:name
//!   POST                /api/workflows/:name/operations
//!   GET|POST            /api/workflows/:name/tasks
//!   GET|PUT|DELETE      /api/workflows/:name/tasks/:task
//!   GET|POST            /api/workflows/:name/handlers
//!   GET|PUT|DELETE      /api/workflows/:name/handlers/:handler
//!   GET                 /api/instances
//!   GET                 /api/instances/:instance

pub mod error;
pub mod handlers;

use axum::{routing::get, routing::post, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use engine::Engine;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

pub fn router(engine: Engine) -> Router {
    use handlers::{event_handlers, instances, operations, tasks, workflows};

    Router::new()
        .route("/api/workflows", get(workflows::list).post(workflows::create))
        .route(
            "/api/workflows/:name",
            get(workflows::get).put(workflows::update).delete(workflows::delete),
        )
        .route("/api/workflows/:name/operations", post(operations::submit))
        .route("/api/workflows/:name/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/workflows/:name/tasks/:task",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route(
            "/api/workflows/:name/handlers",
            get(event_handlers::list).post(event_handlers::create),
        )
        .route(
            "/api/workflows/:name/handlers/:handler",
            get(event_handlers::get)
                .put(event_handlers::update)
                .delete(event_handlers::delete),
        )
        .route("/api/instances", get(instances::list))
        .route("/api/instances/:instance", get(instances::get))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { engine })
}

/// Bind `addr` and serve the API until the process stops.
pub async fn serve(addr: &str, engine: Engine) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(engine)).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use engine::{ContextualInputStore, EngineConfig, WorkflowRegistry};
    use transport::MockHttpClient;

    use super::*;

    fn app() -> Router {
        let inputs = Arc::new(ContextualInputStore::new());
        let registry = Arc::new(WorkflowRegistry::new(inputs.clone()));
        let engine = Engine::start(
            EngineConfig::default(),
            registry,
            inputs,
            Arc::new(MockHttpClient::returning("ok")),
        );
        router(engine)
    }

    fn order() -> Value {
        json!({
            "name": "order",
            "tasks": [
                { "name": "charge", "httpRequest": { "method": "GET", "url": "https://x/charge" } }
            ],
            "handlers": [
                {
                    "name": "kickoff",
                    "eventType": "WORKFLOW_SCHEDULED",
                    "commands": [ { "operation": "START_TASK", "taskName": "charge" } ]
                }
            ]
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> StatusCode {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn workflow_crud() {
        let app = app();
        assert_eq!(send(&app, "POST", "/api/workflows", Some(order())).await, StatusCode::CREATED);
        assert_eq!(send(&app, "GET", "/api/workflows", None).await, StatusCode::OK);
        assert_eq!(send(&app, "GET", "/api/workflows/order", None).await, StatusCode::OK);
        assert_eq!(send(&app, "PUT", "/api/workflows/order", Some(order())).await, StatusCode::OK);
        assert_eq!(send(&app, "DELETE", "/api/workflows/order", None).await, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, "GET", "/api/workflows/order", None).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_workflow_is_rejected() {
        let app = app();
        let mut bad = order();
        bad["handlers"][0]["commands"][0]["taskName"] = json!("refund");
        assert_eq!(send(&app, "POST", "/api/workflows", Some(bad)).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn task_and_handler_crud() {
        let app = app();
        send(&app, "POST", "/api/workflows", Some(order())).await;

        let refund = json!({ "name": "refund", "httpRequest": { "method": "POST", "url": "https://x/refund" } });
        assert_eq!(
            send(&app, "POST", "/api/workflows/order/tasks", Some(refund.clone())).await,
            StatusCode::CREATED
        );
        assert_eq!(send(&app, "GET", "/api/workflows/order/tasks/refund", None).await, StatusCode::OK);
        assert_eq!(
            send(&app, "PUT", "/api/workflows/order/tasks/refund", Some(refund)).await,
            StatusCode::OK
        );

        let on_failure = json!({
            "name": "on-failure",
            "eventType": "TASK_FAILED",
            "conditions": [ { "function": "TASK_NAME_EQUALS", "taskName": "charge" } ],
            "commands": [ { "operation": "START_TASK", "taskName": "refund" } ]
        });
        assert_eq!(
            send(&app, "POST", "/api/workflows/order/handlers", Some(on_failure)).await,
            StatusCode::CREATED
        );
        assert_eq!(send(&app, "GET", "/api/workflows/order/handlers", None).await, StatusCode::OK);

        let dangling = json!({
            "name": "dangling",
            "eventType": "TASK_COMPLETED",
            "commands": [ { "operation": "START_TASK", "taskName": "ship" } ]
        });
        assert_eq!(
            send(&app, "POST", "/api/workflows/order/handlers", Some(dangling)).await,
            StatusCode::BAD_REQUEST
        );

        assert_eq!(
            send(&app, "DELETE", "/api/workflows/order/handlers/on-failure", None).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            send(&app, "DELETE", "/api/workflows/order/tasks/refund", None).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            send(&app, "GET", "/api/workflows/order/tasks/refund", None).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn referenced_task_cannot_be_deleted() {
        let app = app();
        send(&app, "POST", "/api/workflows", Some(order())).await;

        assert_eq!(
            send(&app, "DELETE", "/api/workflows/order/tasks/charge", None).await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(send(&app, "GET", "/api/workflows/order/tasks/charge", None).await, StatusCode::OK);

        assert_eq!(
            send(&app, "DELETE", "/api/workflows/order/handlers/kickoff", None).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            send(&app, "DELETE", "/api/workflows/order/tasks/charge", None).await,
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            send(&app, "DELETE", "/api/workflows/ghost/tasks/charge", None).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn operations_are_accepted() {
        let app = app();
        send(&app, "POST", "/api/workflows", Some(order())).await;

        let schedule = json!({ "operation": "schedule", "inputs": [ { "key": "TOKEN", "value": "abc" } ] });
        assert_eq!(
            send(&app, "POST", "/api/workflows/order/operations", Some(schedule)).await,
            StatusCode::ACCEPTED
        );

        let cancel = json!({ "operation": "cancel", "instanceName": "order-1" });
        assert_eq!(
            send(&app, "POST", "/api/workflows/order/operations", Some(cancel)).await,
            StatusCode::ACCEPTED
        );
    }

    #[tokio::test]
    async fn operation_errors_map_to_status_codes() {
        let app = app();
        send(&app, "POST", "/api/workflows", Some(order())).await;

        let stop = json!({ "operation": "stop" });
        assert_eq!(
            send(&app, "POST", "/api/workflows/order/operations", Some(stop)).await,
            StatusCode::BAD_REQUEST
        );

        let schedule = json!({ "operation": "schedule" });
        assert_eq!(
            send(&app, "POST", "/api/workflows/ghost/operations", Some(schedule)).await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let app = app();
        assert_eq!(send(&app, "GET", "/api/instances", None).await, StatusCode::OK);
        assert_eq!(send(&app, "GET", "/api/instances/order-1", None).await, StatusCode::NOT_FOUND);
    }
}
