//! M-Pesa (Daraja) provider client
//!
//! - [`token`]: process-scoped OAuth token cache
//! - [`client`]: STK push and B2C payout requests
//! - [`callback`]: asynchronous result bodies
//! - [`phone`], [`password`]: request field derivation

pub mod callback;
pub mod client;
pub mod error;
pub mod password;
pub mod phone;
pub mod token;
pub mod types;

use async_trait::async_trait;

pub use client::MpesaClient;
pub use error::{CallbackParseError, ProviderError};

/// Provider accepted an STK push; the outcome arrives by callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAccepted {
    /// `CheckoutRequestID`
    pub correlation_id: String,
    /// `MerchantRequestID`
    pub secondary_correlation_id: String,
    pub customer_message: String,
}

/// Provider accepted a B2C payout; the outcome arrives by callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutAccepted {
    pub conversation_id: String,
    pub originator_conversation_id: String,
}

/// Outbound calls to the mobile-money provider.
///
/// Amounts are whole currency units; phones are normalised MSISDNs.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn initiate_push(
        &self,
        phone: &str,
        amount: u64,
        reference: &str,
    ) -> Result<PushAccepted, ProviderError>;

    /// `reference` becomes the `OriginatorConversationID`
    async fn initiate_payout(
        &self,
        phone: &str,
        amount: u64,
        reference: &str,
    ) -> Result<PayoutAccepted, ProviderError>;
}
