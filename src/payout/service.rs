//! Payout flow
//!
//! Reserve, dispatch to the provider, then resolve through the result
//! callback or an operator. Every status write goes through
//! [`PayoutStore::apply_transition`], which re-checks the expected current
//! status inside the same atomic unit as the balance change.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::{PayoutStatus, is_transition_valid};
use super::types::{OutboundPayout, PayoutTransition, PayoutView};
use crate::deposit::processor::CallbackOutcome;
use crate::error::{PaymentError, PaymentResult};
use crate::events::{EventBus, PaymentEvent};
use crate::money::{Amount, AmountLimits};
use crate::mpesa::PaymentProvider;
use crate::mpesa::callback::{B2cResult, parse_b2c_result};
use crate::mpesa::phone::normalize_msisdn;
use crate::store::{DispatchClaim, PayoutStore, TransitionOutcome, WalletStore, new_record_id};

pub struct PayoutService {
    provider: Arc<dyn PaymentProvider>,
    wallets: Arc<dyn WalletStore>,
    payouts: Arc<dyn PayoutStore>,
    events: EventBus,
    limits: AmountLimits,
    fee: Decimal,
    currency: String,
}

impl PayoutService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        wallets: Arc<dyn WalletStore>,
        payouts: Arc<dyn PayoutStore>,
        events: EventBus,
        limits: AmountLimits,
        fee: Decimal,
        currency: &str,
    ) -> Self {
        Self {
            provider,
            wallets,
            payouts,
            events,
            limits,
            fee,
            currency: currency.to_string(),
        }
    }

    /// Reserve `amount` whole units and send `amount - fee` to `phone`.
    ///
    /// A provider failure releases the reservation (`pending -> failed`) and
    /// surfaces `ProviderUnavailable`.
    pub async fn request_withdrawal(
        &self,
        user_id: i64,
        phone: &str,
        amount: i64,
    ) -> PaymentResult<PayoutView> {
        let amount = self.limits.check_whole(amount)?;
        let net = self.net_amount(amount)?;
        net.whole_units()?;
        let phone = normalize_msisdn(phone)?;

        let wallet = self.wallets.ensure_wallet(user_id, &self.currency).await?;
        let payout = OutboundPayout::new_pending(
            new_record_id(),
            user_id,
            wallet.id,
            phone,
            amount,
            self.fee,
            &self.currency,
        );
        let reserved = self.payouts.create_reserved(&payout).await?;
        info!(
            payout_id = %reserved.id,
            user_id,
            amount = %amount,
            fee = %self.fee,
            "Withdrawal reserved"
        );

        self.dispatch_reserved(&reserved.id).await
    }

    /// Send a `pending` payout to the provider (used after an operator retry).
    pub async fn dispatch(&self, id: &str) -> PaymentResult<PayoutView> {
        self.dispatch_reserved(id).await
    }

    /// Claim the reservation, then make its single provider call.
    async fn dispatch_reserved(&self, id: &str) -> PaymentResult<PayoutView> {
        let payout = match self.payouts.claim_dispatch(id).await? {
            DispatchClaim::Claimed(payout) => payout,
            DispatchClaim::InFlight => {
                warn!(payout_id = %id, "Dispatch rejected; provider call already in flight");
                return Err(PaymentError::DispatchInFlight(format!("payout {}", id)));
            }
            DispatchClaim::StatusMismatch(status) => {
                warn!(payout_id = %id, status = %status, "Dispatch rejected");
                return Err(PaymentError::invalid_transition(
                    status,
                    PayoutStatus::Processing,
                ));
            }
            DispatchClaim::NotFound => {
                return Err(PaymentError::NotFound(format!("payout {}", id)));
            }
        };

        let units = Amount::new(payout.net_amount)?.whole_units()?;
        match self
            .provider
            .initiate_payout(&payout.phone, units, &payout.id)
            .await
        {
            Ok(accepted) => {
                info!(
                    payout_id = %payout.id,
                    conversation_id = %accepted.conversation_id,
                    amount = units,
                    "Payout issued"
                );
                let transition = PayoutTransition::new(PayoutStatus::Pending, PayoutStatus::Processing)
                    .with_conversation(accepted.conversation_id, accepted.originator_conversation_id);
                match self.apply(&payout.id, &transition).await {
                    Ok(updated) => Ok(PayoutView::from(&updated)),
                    Err(e) => {
                        error!(
                            payout_id = %payout.id,
                            error = %e,
                            "Payout accepted by provider but not recorded; payout is unreconciled"
                        );
                        Err(e)
                    }
                }
            }
            Err(provider_error) => {
                warn!(payout_id = %payout.id, error = %provider_error, "Payout request failed");
                let transition = PayoutTransition::new(PayoutStatus::Pending, PayoutStatus::Failed)
                    .with_reason(provider_error.to_string());
                if let Err(e) = self.apply(&payout.id, &transition).await {
                    error!(
                        payout_id = %payout.id,
                        error = %e,
                        "Failed to release reservation after provider error"
                    );
                }
                Err(provider_error.into())
            }
        }
    }

    /// Operator-driven status change through the same validated path
    pub async fn transition(
        &self,
        id: &str,
        to: PayoutStatus,
        reason: Option<String>,
    ) -> PaymentResult<PayoutView> {
        let payout = self.load(id).await?;
        if !is_transition_valid(payout.status, to) {
            warn!(payout_id = %id, from = %payout.status, to = %to, "Invalid payout transition rejected");
            return Err(PaymentError::invalid_transition(payout.status, to));
        }

        let mut transition = PayoutTransition::new(payout.status, to);
        if let Some(reason) = reason {
            transition = transition.with_reason(reason);
        }
        let updated = self.apply(id, &transition).await?;
        info!(payout_id = %id, from = %payout.status, to = %to, "Payout transitioned by operator");
        Ok(PayoutView::from(&updated))
    }

    /// The caller's payout
    pub async fn get(&self, user_id: i64, id: &str) -> PaymentResult<PayoutView> {
        self.payouts
            .get_payout(id)
            .await?
            .filter(|p| p.user_id == user_id)
            .map(|p| PayoutView::from(&p))
            .ok_or_else(|| PaymentError::NotFound(format!("payout {}", id)))
    }

    /// Apply a B2C result callback. Only `processing` payouts are resolved.
    pub async fn handle_b2c_result(&self, body: &[u8]) -> CallbackOutcome {
        let parsed = match parse_b2c_result(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, bytes = body.len(), "Malformed B2C result ignored");
                return CallbackOutcome::Malformed;
            }
        };
        info!(
            conversation_id = %parsed.conversation_id,
            result_type = ?parsed.result_type,
            result_code = parsed.result_code,
            "B2C result received"
        );

        let conversation_id = parsed.conversation_id.clone();
        match self.resolve(parsed).await {
            Ok(outcome) => outcome,
            Err(PaymentError::DuplicateCallback(reason)) => {
                warn!(conversation_id = %conversation_id, reason = %reason, "Duplicate B2C result ignored");
                CallbackOutcome::Duplicate
            }
            Err(e) => {
                error!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "B2C result not applied; payout stays processing and is unreconciled"
                );
                CallbackOutcome::Unreconciled
            }
        }
    }

    /// Queue timeouts are logged only; the payout keeps its status.
    pub fn handle_b2c_timeout(&self, body: &[u8]) {
        match parse_b2c_result(body) {
            Ok(parsed) => warn!(
                conversation_id = %parsed.conversation_id,
                originator_conversation_id = ?parsed.originator_conversation_id,
                result_desc = %parsed.result_desc,
                "B2C queue timeout; payout left unresolved"
            ),
            Err(e) => warn!(error = %e, "Malformed B2C timeout ignored"),
        }
    }

    async fn resolve(&self, parsed: B2cResult) -> PaymentResult<CallbackOutcome> {
        let Some(payout) = self.find_for_result(&parsed).await? else {
            warn!(conversation_id = %parsed.conversation_id, "B2C result for unknown payout discarded");
            return Ok(CallbackOutcome::Unknown);
        };
        if payout.status != PayoutStatus::Processing {
            warn!(
                payout_id = %payout.id,
                status = %payout.status,
                "B2C result for non-processing payout discarded"
            );
            return Ok(CallbackOutcome::Duplicate);
        }

        let success = parsed.is_success();
        let (to, outcome) = if success {
            (PayoutStatus::Succeeded, CallbackOutcome::Applied)
        } else {
            (PayoutStatus::Failed, CallbackOutcome::Rejected)
        };
        if let Some(reported) = parsed.amount {
            if success && reported != payout.net_amount {
                warn!(
                    payout_id = %payout.id,
                    requested = %payout.net_amount,
                    reported = %reported,
                    receiver = ?parsed.receiver,
                    "B2C amount differs from requested net amount"
                );
            }
        }

        let mut transition = PayoutTransition::new(PayoutStatus::Processing, to)
            .with_result(parsed.result_code, parsed.result_desc);
        if success {
            transition = transition.with_transaction_id(parsed.transaction_id);
        }

        match self.payouts.apply_transition(&payout.id, &transition).await? {
            TransitionOutcome::Applied(updated) => {
                info!(
                    payout_id = %updated.id,
                    user_id = updated.user_id,
                    status = %updated.status,
                    transaction_id = ?updated.transaction_id,
                    "Payout resolved"
                );
                self.emit_outcome(&updated);
                Ok(outcome)
            }
            TransitionOutcome::StatusMismatch(status) => {
                warn!(payout_id = %payout.id, status = %status, "Lost race to a concurrent B2C result");
                Ok(CallbackOutcome::Duplicate)
            }
            TransitionOutcome::NotFound => Ok(CallbackOutcome::Unknown),
        }
    }

    /// By `ConversationID`, falling back to `OriginatorConversationID`, which
    /// carries the payout id.
    async fn find_for_result(&self, parsed: &B2cResult) -> PaymentResult<Option<OutboundPayout>> {
        if let Some(payout) = self.payouts.find_by_conversation(&parsed.conversation_id).await? {
            return Ok(Some(payout));
        }
        match &parsed.originator_conversation_id {
            Some(originator) => {
                let payout = self.payouts.get_payout(originator).await?;
                Ok(payout.filter(|p| {
                    p.conversation_id
                        .as_deref()
                        .is_none_or(|id| id == parsed.conversation_id)
                }))
            }
            None => Ok(None),
        }
    }

    async fn apply(&self, id: &str, transition: &PayoutTransition) -> PaymentResult<OutboundPayout> {
        match self.payouts.apply_transition(id, transition).await? {
            TransitionOutcome::Applied(updated) => {
                self.emit_outcome(&updated);
                Ok(updated)
            }
            TransitionOutcome::StatusMismatch(current) => {
                warn!(payout_id = %id, from = %current, to = %transition.to, "Invalid payout transition rejected");
                Err(PaymentError::invalid_transition(current, transition.to))
            }
            TransitionOutcome::NotFound => Err(PaymentError::NotFound(format!("payout {}", id))),
        }
    }

    async fn load(&self, id: &str) -> PaymentResult<OutboundPayout> {
        self.payouts
            .get_payout(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("payout {}", id)))
    }

    fn emit_outcome(&self, payout: &OutboundPayout) {
        if let Some(event) = PaymentEvent::payout_outcome(payout) {
            self.events.emit(event);
        }
    }

    fn net_amount(&self, amount: Amount) -> PaymentResult<Amount> {
        amount.checked_sub(self.fee).ok_or_else(|| {
            PaymentError::Validation(format!(
                "Amount {} does not cover the withdrawal fee {}",
                amount, self.fee
            ))
        })
    }
}
