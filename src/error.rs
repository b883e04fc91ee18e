//! Payment Error Types
//!
//! One taxonomy for every caller-facing failure of the reconciliation core.
//! Callback-facing paths log these and still acknowledge the provider.

use thiserror::Error;

/// Payment error types
///
/// `code()` is the stable machine-readable identifier returned to API callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    /// Bad amount or input, rejected before any external call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Token, push or payout call failed; no state was created
    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A non-pending record was observed again
    #[error("Duplicate callback: {0}")]
    DuplicateCallback(String),

    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Another caller already owns the provider call for this payout
    #[error("Payout dispatch already in flight: {0}")]
    DispatchInFlight(String),

    #[error("User not authenticated")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            PaymentError::NotFound(_) => "NOT_FOUND",
            PaymentError::DuplicateCallback(_) => "DUPLICATE_CALLBACK",
            PaymentError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            PaymentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            PaymentError::DispatchInFlight(_) => "DISPATCH_IN_FLIGHT",
            PaymentError::Unauthorized => "UNAUTHORIZED",
            PaymentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            PaymentError::Validation(_) => 400,
            PaymentError::Unauthorized => 401,
            PaymentError::NotFound(_) => 404,
            PaymentError::DuplicateCallback(_)
            | PaymentError::InvalidTransition { .. }
            | PaymentError::DispatchInFlight(_) => 409,
            PaymentError::InsufficientFunds => 422,
            PaymentError::Internal(_) => 500,
            PaymentError::ProviderUnavailable(_) => 503,
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        PaymentError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Internal(format!("database: {}", e))
    }
}

impl From<crate::money::MoneyError> for PaymentError {
    fn from(e: crate::money::MoneyError) -> Self {
        PaymentError::Validation(e.to_string())
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
