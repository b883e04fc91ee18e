//! Gateway types module
//!
//! ## Input Types
//! - [`requests`]: JSON bodies and query strings accepted by the handlers
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ProviderAck`]: Webhook acknowledgment
//!
//! ## Submodules
//! - [`requests`]: Request types
//! - [`response`]: Response types and error codes

pub mod requests;
pub mod response;

pub use requests::{DepositRequest, TransitionRequest, TransactionsQuery, WithdrawRequest};
pub use response::{ApiError, ApiResponse, ApiResult, ProviderAck, api_error, error_codes, ok};
