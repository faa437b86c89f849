//! Change Log API Handlers

use axum::{
    Json,
    extract::{Query, State},
};

use crate::core::ServerState;
use crate::tracking::types::{ChainVerification, ChangeLogListResponse, ChangeLogQuery};
use crate::utils::AppResult;

/// GET /api/change-log - filtered, paginated ledger entries
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ChangeLogQuery>,
) -> AppResult<Json<ChangeLogListResponse>> {
    let page = state.ledger.query(&query).await?;
    Ok(Json(page))
}

/// GET /api/change-log/verify - walk the hash chain and report breaks
pub async fn verify_chain(State(state): State<ServerState>) -> AppResult<Json<ChainVerification>> {
    let verification = state.ledger.verify_chain().await?;
    Ok(Json(verification))
}
