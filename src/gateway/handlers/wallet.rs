//! User wallet endpoints

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use super::super::auth::AuthUser;
use super::super::state::AppState;
use super::super::types::{
    ApiResult, DepositRequest, TransactionsQuery, WithdrawRequest, api_error, ok,
};
use crate::deposit::types::{DepositInitiated, DepositStatusView};
use crate::error::PaymentError;
use crate::payout::PayoutView;
use crate::wallet::{BalanceView, LedgerEntry, Page, PageRequest};

/// Explicit phone, else the one carried by the token
fn resolve_phone(explicit: Option<String>, user: &AuthUser) -> Result<String, PaymentError> {
    explicit
        .filter(|p| !p.trim().is_empty())
        .or_else(|| user.phone.clone())
        .ok_or_else(|| PaymentError::Validation("phone is required".into()))
}

/// Start an STK push deposit
#[utoipa::path(
    post,
    path = "/wallet/deposit",
    request_body = DepositRequest,
    responses(
        (status = 202, description = "Push sent; awaiting payer confirmation", body = DepositInitiated),
        (status = 400, description = "Amount or phone rejected"),
        (status = 503, description = "Provider unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn initiate_deposit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<DepositInitiated> {
    let phone = resolve_phone(req.phone, &user).map_err(api_error)?;
    let initiated = state
        .deposits
        .initiate(user.user_id, &phone, req.amount)
        .await
        .map_err(api_error)?;
    ok(StatusCode::ACCEPTED, initiated)
}

/// Status of one deposit request
#[utoipa::path(
    get,
    path = "/wallet/deposits/{checkout_request_id}",
    params(("checkout_request_id" = String, Path, description = "Provider CheckoutRequestID")),
    responses(
        (status = 200, body = DepositStatusView),
        (status = 404, description = "Unknown deposit")
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn get_deposit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(checkout_request_id): Path<String>,
) -> ApiResult<DepositStatusView> {
    let view = state
        .deposits
        .status(user.user_id, &checkout_request_id)
        .await
        .map_err(api_error)?;
    ok(StatusCode::OK, view)
}

/// Available, reserved and total balance
#[utoipa::path(
    get,
    path = "/wallet/balance",
    responses((status = 200, body = BalanceView)),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<BalanceView> {
    let view = state.wallet.balance(user.user_id).await.map_err(api_error)?;
    ok(StatusCode::OK, view)
}

/// Ledger history, newest first
#[utoipa::path(
    get,
    path = "/wallet/transactions",
    params(TransactionsQuery),
    responses((status = 200, description = "Page of ledger entries with total count")),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult<Page<LedgerEntry>> {
    let page = PageRequest::new(query.page, query.per_page);
    let entries = state
        .wallet
        .history(user.user_id, page)
        .await
        .map_err(api_error)?;
    ok(StatusCode::OK, entries)
}

/// Withdraw to M-Pesa
#[utoipa::path(
    post,
    path = "/wallet/withdraw",
    request_body = WithdrawRequest,
    responses(
        (status = 202, description = "Payout reserved and sent", body = PayoutView),
        (status = 400, description = "Amount or phone rejected"),
        (status = 422, description = "Insufficient balance"),
        (status = 503, description = "Provider unavailable; reservation released")
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<WithdrawRequest>,
) -> ApiResult<PayoutView> {
    let phone = resolve_phone(req.phone, &user).map_err(api_error)?;
    let view = state
        .payouts
        .request_withdrawal(user.user_id, &phone, req.amount)
        .await
        .map_err(api_error)?;
    ok(StatusCode::ACCEPTED, view)
}

/// One of the caller's payouts
#[utoipa::path(
    get,
    path = "/wallet/payouts/{id}",
    params(("id" = String, Path, description = "Payout id")),
    responses(
        (status = 200, body = PayoutView),
        (status = 404, description = "Unknown payout")
    ),
    security(("bearer_auth" = [])),
    tag = "Wallet"
)]
pub async fn get_payout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<PayoutView> {
    let view = state.payouts.get(user.user_id, &id).await.map_err(api_error)?;
    ok(StatusCode::OK, view)
}
