//! Provider webhooks
//!
//! Bodies are read as raw bytes so that malformed JSON is still
//! acknowledged. The response never depends on the processing outcome.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};

use super::super::state::AppState;
use super::super::types::ProviderAck;

/// STK push result
#[utoipa::path(
    post,
    path = "/webhooks/mpesa/stk-callback",
    request_body(content = String, content_type = "application/json", description = "Body.stkCallback"),
    responses((status = 200, body = ProviderAck)),
    tag = "Webhooks"
)]
pub async fn stk_callback(State(state): State<Arc<AppState>>, body: Bytes) -> Json<ProviderAck> {
    let outcome = state.callbacks.handle_stk_callback(&body).await;
    tracing::debug!(?outcome, "STK callback processed");
    Json(ProviderAck::accepted())
}

/// B2C payout result
#[utoipa::path(
    post,
    path = "/webhooks/mpesa/b2c-result",
    request_body(content = String, content_type = "application/json", description = "Result"),
    responses((status = 200, body = ProviderAck)),
    tag = "Webhooks"
)]
pub async fn b2c_result(State(state): State<Arc<AppState>>, body: Bytes) -> Json<ProviderAck> {
    let outcome = state.payouts.handle_b2c_result(&body).await;
    tracing::debug!(?outcome, "B2C result processed");
    Json(ProviderAck::accepted())
}

/// B2C queue timeout
#[utoipa::path(
    post,
    path = "/webhooks/mpesa/b2c-timeout",
    request_body(content = String, content_type = "application/json", description = "Result"),
    responses((status = 200, body = ProviderAck)),
    tag = "Webhooks"
)]
pub async fn b2c_timeout(State(state): State<Arc<AppState>>, body: Bytes) -> Json<ProviderAck> {
    state.payouts.handle_b2c_timeout(&body);
    Json(ProviderAck::accepted())
}
