//! STK callback processor
//!
//! Turns one provider callback into at most one ledger mutation:
//!
//! 1. parse (failures are swallowed)
//! 2. look up the request by `CheckoutRequestID` (unknown ids are discarded)
//! 3. idempotency gate: only a `pending` request moves
//! 4. success: complete + credit + ledger entry as one unit, then emit
//! 5. failure: mark failed, then emit
//!
//! The caller always acknowledges the provider, whatever the outcome.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::{DepositStatus, is_transition_valid};
use super::types::{DepositFailure, DepositSettlement, InboundPaymentRequest};
use crate::error::{PaymentError, PaymentResult};
use crate::events::{EventBus, PaymentEvent};
use crate::money::Amount;
use crate::mpesa::callback::{StkResult, parse_stk_callback};
use crate::store::{DepositStore, SettleOutcome};

/// What a callback did; logged and asserted on, never shown to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Success applied: request completed and wallet credited
    Applied,
    /// Failure applied: request marked failed
    Rejected,
    /// No request with this correlation id
    Unknown,
    /// Request already resolved; nothing written
    Duplicate,
    /// Body could not be parsed
    Malformed,
    /// Storage failed; the request is still pending
    Unreconciled,
}

pub struct CallbackProcessor {
    deposits: Arc<dyn DepositStore>,
    events: EventBus,
}

impl CallbackProcessor {
    pub fn new(deposits: Arc<dyn DepositStore>, events: EventBus) -> Self {
        Self { deposits, events }
    }

    pub async fn handle_stk_callback(&self, body: &[u8]) -> CallbackOutcome {
        let parsed = match parse_stk_callback(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, bytes = body.len(), "Malformed STK callback ignored");
                return CallbackOutcome::Malformed;
            }
        };
        info!(
            checkout_request_id = %parsed.correlation_id,
            result_code = parsed.result_code,
            "STK callback received"
        );

        let raw = String::from_utf8_lossy(body).into_owned();
        let correlation_id = parsed.correlation_id.clone();
        match self.apply(parsed, raw).await {
            Ok(outcome) => outcome,
            Err(PaymentError::DuplicateCallback(reason)) => {
                warn!(checkout_request_id = %correlation_id, reason = %reason, "Duplicate STK callback ignored");
                CallbackOutcome::Duplicate
            }
            Err(e) => {
                error!(
                    checkout_request_id = %correlation_id,
                    error = %e,
                    "STK callback not applied; request stays pending and is unreconciled"
                );
                CallbackOutcome::Unreconciled
            }
        }
    }

    async fn apply(&self, parsed: StkResult, raw: String) -> PaymentResult<CallbackOutcome> {
        let Some(request) = self.deposits.get_request(&parsed.correlation_id).await? else {
            warn!(checkout_request_id = %parsed.correlation_id, "Callback for unknown request discarded");
            return Ok(CallbackOutcome::Unknown);
        };
        let target = if parsed.is_success() {
            DepositStatus::Completed
        } else {
            DepositStatus::Failed
        };
        // Fast path only; the store re-checks inside the atomic unit
        if !is_transition_valid(request.status, target) {
            warn!(
                checkout_request_id = %parsed.correlation_id,
                status = %request.status,
                "Callback for resolved request discarded"
            );
            return Ok(CallbackOutcome::Duplicate);
        }

        if parsed.is_success() {
            self.apply_success(&request, parsed, raw).await
        } else {
            self.apply_failure(parsed, raw).await
        }
    }

    async fn apply_success(
        &self,
        request: &InboundPaymentRequest,
        parsed: StkResult,
        raw: String,
    ) -> PaymentResult<CallbackOutcome> {
        let amount = credited_amount(request, parsed.amount)?;
        if let Some(payer) = parsed.phone.as_deref() {
            if payer != request.phone {
                warn!(
                    checkout_request_id = %request.correlation_id,
                    requested_phone = %request.phone,
                    payer_phone = %payer,
                    "Deposit paid from a different phone"
                );
            }
        }
        let transaction_date = parsed.transaction_date.clone();
        let settlement = DepositSettlement {
            correlation_id: parsed.correlation_id,
            amount,
            provider_receipt: parsed.receipt,
            result_code: parsed.result_code,
            result_desc: parsed.result_desc,
            raw_payload: raw,
        };

        match self.deposits.settle_success(&settlement).await? {
            SettleOutcome::Applied { request, entry } => {
                info!(
                    checkout_request_id = %request.correlation_id,
                    user_id = request.user_id,
                    amount = %amount,
                    receipt = ?request.provider_receipt,
                    transaction_date = ?transaction_date,
                    ledger_entry_id = ?entry.as_ref().map(|e| &e.id),
                    "Deposit completed"
                );
                self.events.emit(PaymentEvent::deposit_completed(&request));
                Ok(CallbackOutcome::Applied)
            }
            SettleOutcome::AlreadyResolved(status) => {
                warn!(checkout_request_id = %settlement.correlation_id, status = %status, "Lost race to a concurrent callback");
                Ok(CallbackOutcome::Duplicate)
            }
            SettleOutcome::NotFound => Ok(CallbackOutcome::Unknown),
        }
    }

    async fn apply_failure(&self, parsed: StkResult, raw: String) -> PaymentResult<CallbackOutcome> {
        let failure = DepositFailure {
            correlation_id: parsed.correlation_id,
            result_code: parsed.result_code,
            result_desc: parsed.result_desc,
            raw_payload: raw,
        };

        match self.deposits.settle_failure(&failure).await? {
            SettleOutcome::Applied { request, .. } => {
                info!(
                    checkout_request_id = %request.correlation_id,
                    user_id = request.user_id,
                    result_code = failure.result_code,
                    result_desc = %failure.result_desc,
                    "Deposit failed"
                );
                self.events.emit(PaymentEvent::deposit_failed(&request));
                Ok(CallbackOutcome::Rejected)
            }
            SettleOutcome::AlreadyResolved(status) => {
                warn!(checkout_request_id = %failure.correlation_id, status = %status, "Lost race to a concurrent callback");
                Ok(CallbackOutcome::Duplicate)
            }
            SettleOutcome::NotFound => Ok(CallbackOutcome::Unknown),
        }
    }
}

/// The callback amount when it is a valid amount, otherwise the requested one.
fn credited_amount(
    request: &InboundPaymentRequest,
    reported: Option<Decimal>,
) -> PaymentResult<Amount> {
    let requested = Amount::new(request.amount)?;
    let Some(reported) = reported else {
        return Ok(requested);
    };
    match Amount::new(reported) {
        Ok(amount) => {
            if amount != requested {
                warn!(
                    checkout_request_id = %request.correlation_id,
                    requested = %requested,
                    reported = %amount,
                    "Callback amount differs from requested amount; crediting callback amount"
                );
            }
            Ok(amount)
        }
        Err(e) => {
            warn!(
                checkout_request_id = %request.correlation_id,
                reported = %reported,
                error = %e,
                "Callback amount unusable; crediting requested amount"
            );
            Ok(requested)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> InboundPaymentRequest {
        InboundPaymentRequest::new_pending(
            "CHK1".into(),
            "M1".into(),
            1,
            "254700000000".into(),
            Amount::new(dec!(500)).unwrap(),
            "KES",
        )
    }

    #[test]
    fn test_credited_amount_prefers_callback() {
        assert_eq!(credited_amount(&request(), None).unwrap().value(), dec!(500));
        assert_eq!(
            credited_amount(&request(), Some(dec!(499))).unwrap().value(),
            dec!(499)
        );
        assert_eq!(
            credited_amount(&request(), Some(dec!(0))).unwrap().value(),
            dec!(500)
        );
        assert_eq!(
            credited_amount(&request(), Some(dec!(1.005))).unwrap().value(),
            dec!(500)
        );
    }
}
