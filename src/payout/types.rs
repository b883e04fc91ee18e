//! Payout core types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::PayoutStatus;
use crate::money::{Amount, format_amount};
use crate::wallet::models::{EntryDraft, EntryStatus, EntryType};

/// Outbound B2C payout (withdrawal).
///
/// `amount` is the gross amount reserved from the wallet; the provider is
/// asked to send `net_amount = amount - fee`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPayout {
    pub id: String,
    pub user_id: i64,
    pub wallet_id: String,
    pub phone: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
    pub currency: String,
    pub status: PayoutStatus,
    pub conversation_id: Option<String>,
    pub originator_conversation_id: Option<String>,
    pub transaction_id: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    /// Withdrawal entry for the current reservation
    pub ledger_entry_id: Option<String>,
    /// When the provider call for the current reservation was claimed
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OutboundPayout {
    /// New `pending` payout; `fee` must already be below `amount`.
    pub fn new_pending(
        id: String,
        user_id: i64,
        wallet_id: String,
        phone: String,
        amount: Amount,
        fee: Decimal,
        currency: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            wallet_id,
            phone,
            amount: amount.value(),
            fee,
            net_amount: amount.value() - fee,
            currency: currency.to_string(),
            status: PayoutStatus::Pending,
            conversation_id: None,
            originator_conversation_id: None,
            transaction_id: None,
            result_code: None,
            result_desc: None,
            ledger_entry_id: None,
            dispatched_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Pending withdrawal entry for a fresh reservation
    pub fn withdrawal_draft(&self) -> EntryDraft {
        EntryDraft::new(
            EntryType::Withdrawal,
            EntryStatus::Pending,
            format!("M-Pesa withdrawal {} to {}", self.id, self.phone),
        )
    }

    /// Completed reversal entry returning the gross amount to `balance`
    pub fn reversal_draft(&self, to: PayoutStatus) -> EntryDraft {
        let description = match to {
            PayoutStatus::Reversed => format!("Reversal of withdrawal {}", self.id),
            _ => format!("Release of failed withdrawal {}", self.id),
        };
        EntryDraft::new(EntryType::Reversal, EntryStatus::Completed, description)
    }

    /// Copy the transition's outcome onto the record.
    ///
    /// A retry (`failed -> pending`) starts over: provider ids, results and
    /// the dispatch claim from the previous attempt are cleared.
    pub fn record_transition(&mut self, transition: &PayoutTransition, now: DateTime<Utc>) {
        self.status = transition.to;
        self.updated_at = now;
        if transition.effect() == Some(LedgerEffect::Reserve) {
            self.conversation_id = None;
            self.originator_conversation_id = None;
            self.transaction_id = None;
            self.result_code = None;
            self.result_desc = None;
            self.completed_at = None;
            self.dispatched_at = None;
            return;
        }
        if let Some(id) = &transition.conversation_id {
            self.conversation_id = Some(id.clone());
        }
        if let Some(id) = &transition.originator_conversation_id {
            self.originator_conversation_id = Some(id.clone());
        }
        if let Some(id) = &transition.transaction_id {
            self.transaction_id = Some(id.clone());
        }
        if transition.result_code.is_some() {
            self.result_code = transition.result_code;
        }
        if let Some(desc) = &transition.result_desc {
            self.result_desc = Some(desc.clone());
        }
        if transition.to != PayoutStatus::Processing {
            self.completed_at = Some(now);
        }
    }
}

/// Balance side effect that accompanies a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// Status only
    None,
    /// Payout confirmed: clear `locked_balance`, withdrawal entry completed
    Settle,
    /// Payout failed: `locked_balance -> balance`, withdrawal entry failed,
    /// reversal entry appended
    Release,
    /// Succeeded payout reversed: `balance += amount`, reversal entry appended
    Refund,
    /// Operator retry: `balance -> locked_balance`, new withdrawal entry
    Reserve,
}

/// Side effect for a transition; `None` when the pair is not in the table.
pub fn ledger_effect(from: PayoutStatus, to: PayoutStatus) -> Option<LedgerEffect> {
    use PayoutStatus::*;
    if !super::state::is_transition_valid(from, to) {
        return None;
    }
    Some(match (from, to) {
        (Pending, Processing) => LedgerEffect::None,
        (Processing, Succeeded) => LedgerEffect::Settle,
        (Pending, Failed) | (Processing, Failed) => LedgerEffect::Release,
        (Succeeded, Reversed) => LedgerEffect::Refund,
        (Failed, Pending) => LedgerEffect::Reserve,
        _ => return None,
    })
}

/// A requested status change, applied by the store only while the payout is
/// still in `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutTransition {
    pub from: PayoutStatus,
    pub to: PayoutStatus,
    pub conversation_id: Option<String>,
    pub originator_conversation_id: Option<String>,
    pub transaction_id: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
}

impl PayoutTransition {
    pub fn new(from: PayoutStatus, to: PayoutStatus) -> Self {
        Self {
            from,
            to,
            conversation_id: None,
            originator_conversation_id: None,
            transaction_id: None,
            result_code: None,
            result_desc: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: String, originator: String) -> Self {
        self.conversation_id = Some(conversation_id);
        self.originator_conversation_id = Some(originator);
        self
    }

    pub fn with_result(mut self, code: i64, desc: impl Into<String>) -> Self {
        self.result_code = Some(code);
        self.result_desc = Some(desc.into());
        self
    }

    /// Free-text reason without a provider result code
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.result_desc = Some(reason.into());
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn effect(&self) -> Option<LedgerEffect> {
        ledger_effect(self.from, self.to)
    }
}

/// `GET /wallet/payouts/{id}` and withdrawal response body
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PayoutView {
    pub id: String,
    pub status: PayoutStatus,
    #[schema(example = "1000.00")]
    pub amount: String,
    #[schema(example = "0.00")]
    pub fee: String,
    #[schema(example = "1000.00")]
    pub net_amount: String,
    pub currency: String,
    pub conversation_id: Option<String>,
    pub transaction_id: Option<String>,
    pub result_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&OutboundPayout> for PayoutView {
    fn from(p: &OutboundPayout) -> Self {
        Self {
            id: p.id.clone(),
            status: p.status,
            amount: format_amount(p.amount),
            fee: format_amount(p.fee),
            net_amount: format_amount(p.net_amount),
            currency: p.currency.clone(),
            conversation_id: p.conversation_id.clone(),
            transaction_id: p.transaction_id.clone(),
            result_desc: p.result_desc.clone(),
            created_at: p.created_at,
            completed_at: p.completed_at,
        }
    }
}
