use super::{
    AppState, Owner, created,
    error::{ApiJson, ApiPath, ApiQuery, ApiResult},
    ok,
};
use crate::core::{
    split::{self, SplitPolicy},
    transaction::{self, NewTransaction, TransactionFilter, TransactionView},
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiQuery(filter): ApiQuery<TransactionFilter>,
) -> ApiResult<impl IntoResponse> {
    let rows = transaction::list_transactions(&state.db, owner.id(), &filter).await?;
    Ok(ok(rows.into_iter().map(TransactionView::from).collect::<Vec<_>>()))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiJson(request): ApiJson<NewTransaction>,
) -> ApiResult<impl IntoResponse> {
    let model = transaction::create_transaction(&state.db, owner.id(), request).await?;
    Ok(created(TransactionView::from(model)))
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let model = transaction::get_transaction(&state.db, owner.id(), id).await?;
    Ok(ok(TransactionView::from(model)))
}

async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    transaction::delete_transaction(&state.db, owner.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn split_transaction(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiJson(policy): ApiJson<SplitPolicy>,
) -> ApiResult<impl IntoResponse> {
    let details =
        split::split_existing(&state.db, owner.id(), state.owner_name(), id, policy).await?;
    Ok(created(details))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/{id}",
            get(get_transaction).delete(delete_transaction),
        )
        .route("/transactions/{id}/split", post(split_transaction))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::{
        api::test_support::{send, test_app},
        errors::Result,
        test_utils::OWNER,
    };
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    async fn account(app: &axum::Router) -> i64 {
        let (_, body) = send(
            app,
            Method::POST,
            "/api/accounts",
            Some(OWNER),
            Some(json!({ "name": "Checking", "kind": "bank", "currency": "USD" })),
        )
        .await;
        body["data"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_create_list_and_delete() -> Result<()> {
        let app = test_app().await?;
        let account_id = account(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/transactions",
            Some(OWNER),
            Some(json!({
                "accountId": account_id,
                "type": "expense",
                "amount": "12.50",
                "description": "Lunch"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["splitType"], "none");
        let id = body["data"]["id"].as_i64().unwrap();

        let (_, body) = send(&app, Method::GET, &format!("/api/accounts/{account_id}"), Some(OWNER), None).await;
        assert_eq!(body["data"]["currentBalance"], "-12.50");

        let (status, _) = send(&app, Method::DELETE, &format!("/api/transactions/{id}"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, Method::GET, "/api/transactions", Some(OWNER), None).await;
        assert_eq!(body["data"], Value::Array(Vec::new()));
        let (_, body) = send(&app, Method::GET, "/api/transactions?includeDeleted=true", Some(OWNER), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let (_, body) = send(&app, Method::GET, &format!("/api/accounts/{account_id}"), Some(OWNER), None).await;
        assert_eq!(body["data"]["currentBalance"], "0.00");
        Ok(())
    }

    #[tokio::test]
    async fn test_split_existing_twice_conflicts() -> Result<()> {
        let app = test_app().await?;
        let account_id = account(&app).await;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/people",
            Some(OWNER),
            Some(json!({ "name": "Bob", "type": "friend" })),
        )
        .await;
        let bob = body["data"]["id"].as_i64().unwrap();
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/transactions",
            Some(OWNER),
            Some(json!({
                "accountId": account_id,
                "type": "expense",
                "amount": "30",
                "description": "Taxi"
            })),
        )
        .await;
        let id = body["data"]["id"].as_i64().unwrap();
        let policy = json!({ "splitType": "equal", "personIds": [null, bob] });

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/transactions/{id}/split"),
            Some(OWNER),
            Some(policy.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["childTransactions"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/transactions/{id}/split"),
            Some(OWNER),
            Some(policy),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "conflict");
        Ok(())
    }
}
