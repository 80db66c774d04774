use super::{
    AppState, Owner, created,
    error::{ApiJson, ApiPath, ApiQuery, ApiResult},
    ok,
};
use crate::core::account::{self, AccountView, NewAccount};
use axum::{Router, extract::State, response::IntoResponse, routing::get};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountQuery {
    #[serde(default)]
    include_archived: bool,
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiQuery(query): ApiQuery<AccountQuery>,
) -> ApiResult<impl IntoResponse> {
    let accounts = account::list_accounts(&state.db, owner.id(), query.include_archived).await?;
    Ok(ok(accounts
        .into_iter()
        .map(AccountView::from)
        .collect::<Vec<_>>()))
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiJson(request): ApiJson<NewAccount>,
) -> ApiResult<impl IntoResponse> {
    let model = account::create_account(&state.db, owner.id(), request).await?;
    Ok(created(AccountView::from(model)))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let model = account::get_account(&state.db, owner.id(), id).await?;
    Ok(ok(AccountView::from(model)))
}

async fn archive_account(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let model = account::archive_account(&state.db, owner.id(), id).await?;
    Ok(ok(AccountView::from(model)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/{id}", get(get_account).delete(archive_account))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::{
        api::test_support::{send, test_app},
        errors::Result,
        test_utils::{OTHER_OWNER, OWNER},
    };
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_account_lifecycle() -> Result<()> {
        let app = test_app().await?;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/accounts",
            Some(OWNER),
            Some(json!({
                "name": "Checking",
                "kind": "bank",
                "currency": "usd",
                "openingBalance": "250.50"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["currency"], "USD");
        assert_eq!(body["data"]["currentBalance"], "250.50");
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, _) = send(&app, Method::GET, &format!("/api/accounts/{id}"), Some(OTHER_OWNER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::DELETE, &format!("/api/accounts/{id}"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isArchived"], true);

        let (_, body) = send(&app, Method::GET, "/api/accounts", Some(OWNER), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
        let (_, body) = send(&app, Method::GET, "/api/accounts?includeArchived=true", Some(OWNER), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        Ok(())
    }
}
