use super::{
    AppState, Owner, created,
    error::{ApiJson, ApiPath, ApiResult},
    ok,
};
use crate::core::{
    split::{self, NewSplit, SplitPolicy},
    transaction::TransactionView,
};
use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;

async fn create_split(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiJson(request): ApiJson<NewSplit>,
) -> ApiResult<impl IntoResponse> {
    let details = split::create_split(&state.db, owner.id(), state.owner_name(), request).await?;
    Ok(created(details))
}

async fn get_split(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let details = split::get_split_details(&state.db, owner.id(), state.owner_name(), id).await?;
    Ok(ok(details))
}

async fn update_split(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiJson(policy): ApiJson<SplitPolicy>,
) -> ApiResult<impl IntoResponse> {
    let details =
        split::update_split(&state.db, owner.id(), state.owner_name(), id, policy).await?;
    Ok(ok(details))
}

async fn remove_split(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let parent = split::remove_split(&state.db, owner.id(), id).await?;
    Ok(ok(TransactionView::from(parent)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/splits", post(create_split))
        .route(
            "/splits/{id}",
            get(get_split).put(update_split).delete(remove_split),
        )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::{
        api::test_support::{send, test_app},
        errors::Result,
        test_utils::OWNER,
    };
    use axum::{
        Router,
        http::{Method, StatusCode},
    };
    use serde_json::{Value, json};

    async fn seed(app: &Router) -> (i64, i64, i64) {
        let (_, body) = send(
            app,
            Method::POST,
            "/api/accounts",
            Some(OWNER),
            Some(json!({ "name": "Checking", "kind": "bank", "currency": "USD" })),
        )
        .await;
        let account = body["data"]["id"].as_i64().unwrap();
        let mut people = Vec::new();
        for name in ["Alice", "Bob"] {
            let (_, body) = send(
                app,
                Method::POST,
                "/api/people",
                Some(OWNER),
                Some(json!({ "name": name, "type": "friend" })),
            )
            .await;
            people.push(body["data"]["id"].as_i64().unwrap());
        }
        (account, people[0], people[1])
    }

    fn split_body(account: i64, people: Value, extra: Value) -> Value {
        let mut body = json!({
            "accountId": account,
            "type": "expense",
            "amount": "100",
            "description": "Dinner",
            "personIds": people,
        });
        for (key, value) in extra.as_object().unwrap() {
            body[key] = value.clone();
        }
        body
    }

    #[tokio::test]
    async fn test_equal_split_breakdown() -> Result<()> {
        let app = test_app().await?;
        let (account, alice, bob) = seed(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/splits",
            Some(OWNER),
            Some(split_body(account, json!([null, alice, bob]), json!({ "splitType": "equal" }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let amounts: Vec<&str> = body["data"]["splitBreakdown"]
            .as_array()
            .unwrap()
            .iter()
            .map(|share| share["amount"].as_str().unwrap())
            .collect();
        assert_eq!(amounts, ["33.34", "33.33", "33.33"]);
        assert_eq!(body["data"]["splitBreakdown"][0]["personName"], "You");
        assert_eq!(body["data"]["parentTransaction"]["splitType"], "equal");

        let id = body["data"]["parentTransaction"]["id"].as_i64().unwrap();
        let (status, body) = send(&app, Method::GET, &format!("/api/splits/{id}"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["childTransactions"].as_array().unwrap().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_sum_mismatch_is_reported() -> Result<()> {
        let app = test_app().await?;
        let (account, alice, bob) = seed(&app).await;
        let mut request = split_body(
            account,
            json!([null, alice, bob]),
            json!({ "splitType": "custom", "customAmounts": ["200", "200", "50"] }),
        );
        request["amount"] = json!("500");
        let (status, body) = send(&app, Method::POST, "/api/splits", Some(OWNER), Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "customAmounts");
        assert_eq!(
            body["error"]["message"],
            "custom amounts sum to 450.00, expected 500.00"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_client_split_body_is_accepted() -> Result<()> {
        let app = test_app().await?;
        let (account, alice, bob) = seed(&app).await;
        let request = json!({
            "accountId": account,
            "accountType": "bank",
            "type": "expense",
            "amount": 500,
            "currency": "USD",
            "description": "Cabin",
            "category": "travel",
            "notes": "two nights",
            "date": "2024-05-01",
            "splitType": "custom",
            "personIds": [null, alice, bob],
            "customAmounts": [200, 200, 100],
        });
        let (status, body) = send(&app, Method::POST, "/api/splits", Some(OWNER), Some(request)).await;
        assert_eq!(status, StatusCode::CREATED);
        let amounts: Vec<&str> = body["data"]["splitBreakdown"]
            .as_array()
            .unwrap()
            .iter()
            .map(|share| share["amount"].as_str().unwrap())
            .collect();
        assert_eq!(amounts, ["200.00", "200.00", "100.00"]);
        assert_eq!(body["data"]["parentTransaction"]["splitType"], "custom");
        Ok(())
    }

    #[tokio::test]
    async fn test_mismatched_account_type_is_rejected() -> Result<()> {
        let app = test_app().await?;
        let (account, alice, _) = seed(&app).await;
        let request = split_body(
            account,
            json!([null, alice]),
            json!({ "splitType": "equal", "accountType": "cash" }),
        );
        let (status, body) = send(&app, Method::POST, "/api/splits", Some(OWNER), Some(request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "accountType");
        Ok(())
    }

    #[tokio::test]
    async fn test_idempotent_replay_and_removal() -> Result<()> {
        let app = test_app().await?;
        let (account, alice, _) = seed(&app).await;
        let request = split_body(
            account,
            json!([alice]),
            json!({ "splitType": "equal", "idempotencyKey": "req-1" }),
        );
        let (_, first) = send(&app, Method::POST, "/api/splits", Some(OWNER), Some(request.clone())).await;
        let (status, second) = send(&app, Method::POST, "/api/splits", Some(OWNER), Some(request)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = first["data"]["parentTransaction"]["id"].as_i64().unwrap();
        assert_eq!(second["data"]["parentTransaction"]["id"].as_i64().unwrap(), id);

        let (status, body) = send(&app, Method::DELETE, &format!("/api/splits/{id}"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["splitType"], "none");
        let (status, _) = send(&app, Method::GET, &format!("/api/splits/{id}"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = send(&app, Method::GET, "/api/settlements/pending", Some(OWNER), None).await;
        assert_eq!(body["data"], Value::Array(Vec::new()));
        Ok(())
    }
}
