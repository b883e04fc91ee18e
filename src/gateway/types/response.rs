//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - `ProviderAck`: Acknowledgment body for provider webhooks

use axum::{Json, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::PaymentError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// Render a payment error with its HTTP status and numeric code
pub fn api_error(e: PaymentError) -> ApiError {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let msg = match &e {
        // Storage details stay in the logs
        PaymentError::Internal(detail) => {
            tracing::error!(error = %detail, "Request failed");
            "Internal error".to_string()
        }
        other => other.to_string(),
    };
    (
        status,
        Json(ApiResponse::<()>::error(error_codes::for_error(&e), msg)),
    )
}

pub fn ok<T>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((status, Json(ApiResponse::success(data))))
}

// ============================================================================
// Provider acknowledgment
// ============================================================================

/// Body returned to the provider for every webhook delivery
#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderAck {
    #[serde(rename = "ResultCode")]
    #[schema(example = 0)]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    #[schema(example = "Accepted")]
    pub result_desc: String,
}

impl ProviderAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    use crate::error::PaymentError;

    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const INVALID_TRANSITION: i32 = 1003;
    pub const DUPLICATE: i32 = 1004;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;

    pub fn for_error(e: &PaymentError) -> i32 {
        match e {
            PaymentError::Validation(_) => INVALID_PARAMETER,
            PaymentError::InsufficientFunds => INSUFFICIENT_BALANCE,
            PaymentError::InvalidTransition { .. } => INVALID_TRANSITION,
            PaymentError::DuplicateCallback(_) | PaymentError::DispatchInFlight(_) => DUPLICATE,
            PaymentError::Unauthorized => AUTH_FAILED,
            PaymentError::NotFound(_) => NOT_FOUND,
            PaymentError::ProviderUnavailable(_) => SERVICE_UNAVAILABLE,
            PaymentError::Internal(_) => INTERNAL_ERROR,
        }
    }
}
