//! Operator endpoints

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::state::AppState;
use super::super::types::{ApiResult, TransitionRequest, api_error, ok};
use crate::payout::PayoutView;

/// Apply one payout status change
#[utoipa::path(
    post,
    path = "/admin/payouts/{id}/transition",
    params(("id" = String, Path, description = "Payout id")),
    request_body = TransitionRequest,
    responses(
        (status = 200, body = PayoutView),
        (status = 404, description = "Unknown payout"),
        (status = 409, description = "Transition not allowed from the current status"),
        (status = 422, description = "Insufficient balance for a retry")
    ),
    security(("internal_secret" = [])),
    tag = "Operator"
)]
pub async fn transition_payout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<PayoutView> {
    let view = state
        .payouts
        .transition(&id, req.status, req.reason)
        .await
        .map_err(api_error)?;
    ok(StatusCode::OK, view)
}

/// Send a pending payout to the provider
#[utoipa::path(
    post,
    path = "/admin/payouts/{id}/dispatch",
    params(("id" = String, Path, description = "Payout id")),
    responses(
        (status = 200, body = PayoutView),
        (status = 409, description = "Payout is not pending"),
        (status = 503, description = "Provider unavailable; payout failed")
    ),
    security(("internal_secret" = [])),
    tag = "Operator"
)]
pub async fn dispatch_payout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PayoutView> {
    let view = state.payouts.dispatch(&id).await.map_err(api_error)?;
    ok(StatusCode::OK, view)
}
