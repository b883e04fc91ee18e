//! Deposit initiation
//!
//! Validate, push, then record. Nothing is persisted unless the provider
//! accepted the push; a storage failure after acceptance is logged as
//! unreconciled and surfaced as an internal error.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::types::{DepositInitiated, DepositStatusView, InboundPaymentRequest};
use crate::error::{PaymentError, PaymentResult};
use crate::money::AmountLimits;
use crate::mpesa::PaymentProvider;
use crate::mpesa::phone::normalize_msisdn;
use crate::store::DepositStore;

const DEFAULT_CUSTOMER_MESSAGE: &str = "Check your phone and enter your M-Pesa PIN to complete the deposit";

pub struct DepositService {
    provider: Arc<dyn PaymentProvider>,
    deposits: Arc<dyn DepositStore>,
    limits: AmountLimits,
    currency: String,
}

impl DepositService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        deposits: Arc<dyn DepositStore>,
        limits: AmountLimits,
        currency: &str,
    ) -> Self {
        Self {
            provider,
            deposits,
            limits,
            currency: currency.to_string(),
        }
    }

    /// Issue an STK push for `amount` whole units and record it `pending`.
    pub async fn initiate(
        &self,
        user_id: i64,
        phone: &str,
        amount: i64,
    ) -> PaymentResult<DepositInitiated> {
        let amount = self.limits.check_whole(amount)?;
        let phone = normalize_msisdn(phone)?;
        let units = amount.whole_units()?;

        let accepted = self
            .provider
            .initiate_push(&phone, units, &account_reference(user_id))
            .await
            .map_err(|e| {
                warn!(user_id, amount = %amount, error = %e, "STK push failed");
                PaymentError::from(e)
            })?;

        let request = InboundPaymentRequest::new_pending(
            accepted.correlation_id.clone(),
            accepted.secondary_correlation_id,
            user_id,
            phone,
            amount,
            &self.currency,
        );
        if let Err(e) = self.deposits.insert_request(&request).await {
            error!(
                checkout_request_id = %request.correlation_id,
                user_id,
                amount = %amount,
                error = %e,
                "Push accepted but request not recorded; deposit is unreconciled"
            );
            return Err(PaymentError::Internal(format!(
                "failed to record deposit request: {}",
                e
            )));
        }

        info!(
            checkout_request_id = %request.correlation_id,
            user_id,
            amount = %amount,
            "Deposit initiated"
        );
        let message = if accepted.customer_message.is_empty() {
            DEFAULT_CUSTOMER_MESSAGE.to_string()
        } else {
            accepted.customer_message
        };
        Ok(DepositInitiated {
            checkout_request_id: request.correlation_id,
            message,
            amount: amount.to_string(),
            currency: self.currency.clone(),
        })
    }

    /// Status of one of the caller's deposit requests
    pub async fn status(
        &self,
        user_id: i64,
        checkout_request_id: &str,
    ) -> PaymentResult<DepositStatusView> {
        self.deposits
            .get_request(checkout_request_id)
            .await?
            .filter(|r| r.user_id == user_id)
            .map(|r| DepositStatusView::from(&r))
            .ok_or_else(|| PaymentError::NotFound(format!("deposit {}", checkout_request_id)))
    }
}

/// `AccountReference` shown on the payer's prompt (12 characters at most)
fn account_reference(user_id: i64) -> String {
    let mut reference = format!("WALLET{}", user_id);
    reference.truncate(12);
    reference
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_reference_fits_provider_limit() {
        assert_eq!(account_reference(42), "WALLET42");
        assert_eq!(account_reference(1234567890123).len(), 12);
    }
}
