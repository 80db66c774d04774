use super::{
    AppState, Owner, created,
    error::{ApiJson, ApiPath, ApiQuery, ApiResult},
    ok,
};
use crate::core::person::{self, NewPerson, PersonUpdate};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeopleQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SpendingQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    #[serde(default)]
    amount: Decimal,
    category: Option<String>,
}

async fn list_people(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiQuery(query): ApiQuery<PeopleQuery>,
) -> ApiResult<impl IntoResponse> {
    let people = person::list_people(&state.db, owner.id(), query.include_inactive).await?;
    Ok(ok(people))
}

async fn create_person(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiJson(request): ApiJson<NewPerson>,
) -> ApiResult<impl IntoResponse> {
    Ok(created(
        person::create_person(&state.db, owner.id(), request).await?,
    ))
}

async fn get_person(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(person::get_person(&state.db, owner.id(), id).await?))
}

async fn update_person(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiJson(update): ApiJson<PersonUpdate>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        person::update_person(&state.db, owner.id(), id, update).await?,
    ))
}

async fn delete_person(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    person::delete_person(&state.db, owner.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn spending(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<SpendingQuery>,
) -> ApiResult<impl IntoResponse> {
    let summary = person::spending_summary(&state.db, owner.id(), id, query.from, query.to).await?;
    Ok(ok(summary))
}

async fn spending_limits(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<impl IntoResponse> {
    let today = Utc::now().date_naive();
    let check = person::check_limits(
        &state.db,
        owner.id(),
        id,
        query.amount,
        query.category.as_deref(),
        today,
    )
    .await?;
    Ok(ok(check))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/people", get(list_people).post(create_person))
        .route(
            "/people/{id}",
            get(get_person).put(update_person).delete(delete_person),
        )
        .route("/people/{id}/spending", get(spending))
        .route("/people/{id}/spending/limits", get(spending_limits))
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
    use serde_json::json;

    #[tokio::test]
    async fn test_person_routes() -> Result<()> {
        let app = test_app().await?;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/people",
            Some(OWNER),
            Some(json!({
                "name": "Alice",
                "type": "friend",
                "overallLimit": "100",
                "limitPeriod": "monthly",
                "limitCurrency": "USD"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/people/{id}"),
            Some(OWNER),
            Some(json!({ "name": "Alicia" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Alicia");

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/people/{id}/spending/limits?amount=120"),
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["anyBreached"], true);
        assert_eq!(body["data"]["limits"][0]["spent"], "0.00");

        let (status, _) = send(&app, Method::DELETE, &format!("/api/people/{id}"), Some(OWNER), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, Method::GET, "/api/people", Some(OWNER), None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_person_is_not_found() -> Result<()> {
        let app = test_app().await?;
        let (status, body) = send(&app, Method::GET, "/api/people/42/spending", Some(OWNER), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "not_found");
        Ok(())
    }
}
