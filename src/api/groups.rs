use super::{
    AppState, Owner, created,
    error::{ApiJson, ApiPath, ApiQuery, ApiResult},
    ok,
};
use crate::core::{
    group::{self, GroupUpdate, NewGroup},
    party::PersonRef,
    transaction::TransactionView,
};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRequest {
    person_id: PersonRef,
}

async fn list_groups(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiQuery(query): ApiQuery<GroupQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        group::list_groups(&state.db, owner.id(), query.include_inactive).await?,
    ))
}

async fn create_group(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiJson(request): ApiJson<NewGroup>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(group::create_group(&state.db, owner.id(), request).await?))
}

async fn get_group(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(group::get_group(&state.db, owner.id(), id).await?))
}

async fn update_group(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<GroupUpdate>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(group::update_group(&state.db, owner.id(), id, update).await?))
}

async fn delete_group(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    group::delete_group(&state.db, owner.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<MemberRequest>,
) -> ApiResult<impl IntoResponse> {
    let view = group::add_member(&state.db, owner.id(), id, request.person_id.id()).await?;
    Ok(ok(view))
}

async fn remove_member(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath((id, person_id)): ApiPath<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        group::remove_member(&state.db, owner.id(), id, person_id).await?,
    ))
}

async fn group_transactions(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let rows = group::group_transactions(&state.db, owner.id(), id).await?;
    Ok(ok(rows.into_iter().map(TransactionView::from).collect::<Vec<_>>()))
}

async fn summary(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        group::group_summary(&state.db, owner.id(), state.owner_name(), id).await?,
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/{id}",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/groups/{id}/summary", get(summary))
        .route("/groups/{id}/members", post(add_member))
        .route("/groups/{id}/members/{person_id}", delete(remove_member))
        .route("/groups/{id}/transactions", get(group_transactions))
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
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_budget_summary() -> Result<()> {
        let app = test_app().await?;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/accounts",
            Some(OWNER),
            Some(json!({ "name": "Card", "kind": "bank", "currency": "USD" })),
        )
        .await;
        let account = body["data"]["id"].as_i64().unwrap();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/groups",
            Some(OWNER),
            Some(json!({ "name": "Lisbon", "type": "trip", "currency": "USD", "budget": "1000" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let group = body["data"]["id"].as_i64().unwrap();

        for amount in ["300", "250"] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/transactions",
                Some(OWNER),
                Some(json!({
                    "accountId": account,
                    "type": "expense",
                    "amount": amount,
                    "description": "Hotel",
                    "groupId": group
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, Method::GET, &format!("/api/groups/{group}/summary"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["transactionCount"], 2);
        assert_eq!(data["totalSpent"], "550.00");
        assert_eq!(data["budgetVsActual"]["difference"], "450.00");
        let percentage = Decimal::from_str(data["budgetVsActual"]["percentage"].as_str().unwrap()).unwrap();
        assert_eq!(percentage, Decimal::from(55));

        let (_, body) = send(&app, Method::GET, &format!("/api/groups/{group}/transactions"), Some(OWNER), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_membership_routes() -> Result<()> {
        let app = test_app().await?;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/people",
            Some(OWNER),
            Some(json!({ "name": "Carol", "type": "family" })),
        )
        .await;
        let carol = body["data"]["id"].as_i64().unwrap();
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/groups",
            Some(OWNER),
            Some(json!({ "name": "House", "type": "event", "currency": "EUR" })),
        )
        .await;
        let group = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/groups/{group}/members"),
            Some(OWNER),
            Some(json!({ "personId": carol })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["members"][0]["name"], "Carol");

        let uri = format!("/api/groups/{group}/members/{carol}");
        let (status, body) = send(&app, Method::DELETE, &uri, Some(OWNER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["members"].as_array().unwrap().is_empty());
        let (status, _) = send(&app, Method::DELETE, &uri, Some(OWNER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_client_group_body_creates_members() -> Result<()> {
        let app = test_app().await?;
        let mut people = Vec::new();
        for name in ["Dev", "Esi"] {
            let (_, body) = send(
                &app,
                Method::POST,
                "/api/people",
                Some(OWNER),
                Some(json!({ "name": name, "type": "friend" })),
            )
            .await;
            people.push(body["data"]["id"].as_i64().unwrap());
        }
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/groups",
            Some(OWNER),
            Some(json!({
                "name": "Ski week",
                "type": "trip",
                "startDate": "2025-01-10",
                "endDate": "2025-01-17",
                "budget": 800,
                "currency": "USD",
                "members": people,
                "notes": "chalet"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let names: Vec<&str> = body["data"]["members"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Dev", "Esi"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_tagged_income_is_not_spending() -> Result<()> {
        let app = test_app().await?;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/accounts",
            Some(OWNER),
            Some(json!({ "name": "Card", "accountType": "bank", "currency": "USD" })),
        )
        .await;
        let account = body["data"]["id"].as_i64().unwrap();
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/groups",
            Some(OWNER),
            Some(json!({ "name": "Fest", "type": "event", "currency": "USD" })),
        )
        .await;
        let group = body["data"]["id"].as_i64().unwrap();

        for (kind, amount) in [("expense", "80"), ("income", "30")] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/transactions",
                Some(OWNER),
                Some(json!({
                    "accountId": account,
                    "accountType": "bank",
                    "type": kind,
                    "amount": amount,
                    "description": "Tickets",
                    "groupId": group
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = send(&app, Method::GET, &format!("/api/groups/{group}/summary"), Some(OWNER), None).await;
        assert_eq!(body["data"]["totalSpent"], "80.00");
        assert_eq!(body["data"]["transactionCount"], 2);
        Ok(())
    }
}
