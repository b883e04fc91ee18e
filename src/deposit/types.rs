//! Deposit core types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::DepositStatus;
use crate::money::Amount;
use crate::wallet::models::{EntryDraft, EntryStatus, EntryType};

/// One STK push attempt, keyed by the provider's `CheckoutRequestID`.
///
/// Created `pending` when the push is accepted; mutated exactly once by the
/// callback processor; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundPaymentRequest {
    /// `CheckoutRequestID`
    pub correlation_id: String,
    /// `MerchantRequestID`, informational
    pub secondary_correlation_id: String,
    pub user_id: i64,
    pub phone: String,
    /// Requested amount while `pending`; the credited amount once completed
    pub amount: Decimal,
    pub currency: String,
    pub status: DepositStatus,
    pub provider_receipt: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    /// Callback body as received, kept for audit
    #[serde(skip_serializing)]
    pub raw_callback_payload: Option<String>,
    pub ledger_entry_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InboundPaymentRequest {
    pub fn new_pending(
        correlation_id: String,
        secondary_correlation_id: String,
        user_id: i64,
        phone: String,
        amount: Amount,
        currency: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            correlation_id,
            secondary_correlation_id,
            user_id,
            phone,
            amount: amount.value(),
            currency: currency.to_string(),
            status: DepositStatus::Pending,
            provider_receipt: None,
            result_code: None,
            result_desc: None,
            raw_callback_payload: None,
            ledger_entry_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Successful resolution of a pending request, applied atomically with the
/// wallet credit.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositSettlement {
    pub correlation_id: String,
    pub amount: Amount,
    pub provider_receipt: Option<String>,
    pub result_code: i64,
    pub result_desc: String,
    pub raw_payload: String,
}

impl DepositSettlement {
    /// Completed deposit entry keyed by the provider receipt
    pub fn entry_draft(&self) -> EntryDraft {
        let description = match &self.provider_receipt {
            Some(receipt) => format!("M-Pesa deposit {}", receipt),
            None => format!("M-Pesa deposit {}", self.correlation_id),
        };
        EntryDraft::new(EntryType::Deposit, EntryStatus::Completed, description)
            .with_provider_ref(self.provider_receipt.clone())
    }
}

/// Failed resolution of a pending request; no ledger mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositFailure {
    pub correlation_id: String,
    pub result_code: i64,
    pub result_desc: String,
    pub raw_payload: String,
}

/// `POST /wallet/deposit` response body
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepositInitiated {
    #[schema(example = "ws_CO_191220191020363925")]
    pub checkout_request_id: String,
    pub message: String,
    #[schema(example = "500.00")]
    pub amount: String,
    #[schema(example = "KES")]
    pub currency: String,
}

/// `GET /wallet/deposits/{id}` response body
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepositStatusView {
    pub checkout_request_id: String,
    pub status: DepositStatus,
    pub amount: String,
    pub currency: String,
    pub provider_receipt: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&InboundPaymentRequest> for DepositStatusView {
    fn from(r: &InboundPaymentRequest) -> Self {
        Self {
            checkout_request_id: r.correlation_id.clone(),
            status: r.status,
            amount: crate::money::format_amount(r.amount),
            currency: r.currency.clone(),
            provider_receipt: r.provider_receipt.clone(),
            result_code: r.result_code,
            result_desc: r.result_desc.clone(),
            created_at: r.created_at,
            completed_at: r.completed_at,
        }
    }
}
