use super::{
    AppState, Owner, PagedResponse, created,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    ok,
};
use crate::core::settlement::{self, NewSettlement, SettlementDate};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    limit: Option<u64>,
    skip: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleRequest {
    #[serde(default)]
    settlement_date: Option<SettlementDate>,
}

/// The settle body is optional; an empty one means "now".
fn parse_settle_body(body: &Bytes) -> ApiResult<SettleRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SettleRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest {
        message: format!("Invalid settle request: {e}"),
    })
}

async fn create_settlement(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiJson(request): ApiJson<NewSettlement>,
) -> ApiResult<impl IntoResponse> {
    let view =
        settlement::create_settlement(&state.db, owner.id(), state.owner_name(), request).await?;
    Ok(created(view))
}

async fn pending_balances(
    State(state): State<Arc<AppState>>,
    owner: Owner,
) -> ApiResult<impl IntoResponse> {
    let balances =
        settlement::pending_balances(&state.db, owner.id(), state.owner_name()).await?;
    Ok(ok(balances))
}

async fn pending_list(
    State(state): State<Arc<AppState>>,
    owner: Owner,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        settlement::pending_list(&state.db, owner.id(), state.owner_name()).await?,
    ))
}

async fn history(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let ledger = &state.settings.ledger;
    let limit = query
        .limit
        .unwrap_or(ledger.history_page_size)
        .clamp(1, ledger.max_history_page_size.max(1));
    let page = settlement::history(
        &state.db,
        owner.id(),
        state.owner_name(),
        limit,
        query.skip.unwrap_or(0),
    )
    .await?;
    Ok(Json(PagedResponse {
        data: page.settlements,
        total: page.total,
    }))
}

async fn get_settlement(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        settlement::get_settlement(&state.db, owner.id(), state.owner_name(), id).await?,
    ))
}

async fn settle(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request = parse_settle_body(&body)?;
    let view = settlement::settle(
        &state.db,
        owner.id(),
        state.owner_name(),
        id,
        request.settlement_date,
    )
    .await?;
    Ok(ok(view))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    owner: Owner,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(ok(
        settlement::cancel(&state.db, owner.id(), state.owner_name(), id).await?,
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settlements", post(create_settlement))
        .route("/settlements/pending", get(pending_balances))
        .route("/settlements/pending-list", get(pending_list))
        .route("/settlements/history", get(history))
        .route("/settlements/{id}", get(get_settlement).delete(cancel))
        .route("/settlements/{id}/settle", put(settle))
}
