//! Request bodies and query strings

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::payout::PayoutStatus;

/// `POST /wallet/deposit`
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Whole KES
    #[schema(example = 500)]
    pub amount: i64,
    /// Payer phone; defaults to the phone in the caller's token
    #[schema(example = "+254700000000")]
    pub phone: Option<String>,
}

/// `POST /wallet/withdraw`
#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    /// Whole KES, fee included
    #[schema(example = 1000)]
    pub amount: i64,
    /// Recipient phone; defaults to the phone in the caller's token
    #[schema(example = "0700000000")]
    pub phone: Option<String>,
}

/// `GET /wallet/transactions`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionsQuery {
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Page size (default 20, max 100)
    pub per_page: Option<u32>,
}

/// `POST /admin/payouts/{id}/transition`
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub status: PayoutStatus,
    pub reason: Option<String>,
}
