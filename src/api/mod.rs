//! JSON REST interface over the core operations.
//!
//! Every route lives under `/api` and is scoped to the owner named by the
//! `X-Owner-Id` header. Successful bodies are wrapped as `{"data": ...}`.

pub mod accounts;
pub mod error;
pub mod groups;
pub mod owner;
pub mod people;
pub mod settlements;
pub mod splits;
pub mod transactions;

use crate::config::Settings;
use axum::{Json, Router, http::StatusCode, routing::get};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult};
pub use owner::Owner;

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: Settings,
}

impl AppState {
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: Settings) -> Self {
        Self { db, settings }
    }

    /// Name shown for the owner wherever a party is rendered.
    #[must_use]
    pub fn owner_name(&self) -> &str {
        &self.settings.ledger.owner_display_name
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Success envelope for paged listings.
#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub data: Vec<T>,
    pub total: u64,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data })
}

pub(crate) fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(accounts::router())
        .merge(people::router())
        .merge(transactions::router())
        .merge(splits::router())
        .merge(settlements::router())
        .merge(groups::router());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod test_support {
    #![allow(clippy::unwrap_used)]

    use super::{AppState, router};
    use crate::{config::Settings, errors::Result, test_utils::setup_test_db};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub(crate) async fn test_app() -> Result<Router> {
        let db = setup_test_db().await?;
        Ok(router(Arc::new(AppState::new(db, Settings::default()))))
    }

    /// Sends a request as `owner` and returns the status and decoded body.
    pub(crate) async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        owner: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            builder = builder.header("X-Owner-Id", owner);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::test_support::{send, test_app};
    use crate::{errors::Result, test_utils::OWNER};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let app = test_app().await?;
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_owner_header() -> Result<()> {
        let app = test_app().await?;
        let (status, body) = send(&app, Method::GET, "/api/accounts", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation");
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_envelope() -> Result<()> {
        let app = test_app().await?;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/accounts",
            Some(OWNER),
            Some(json!({ "name": "Checking" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "validation");
        Ok(())
    }
}
