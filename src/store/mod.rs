//! Durable storage ports
//!
//! The correlation store, wallet ledger and payout records live behind these
//! traits. Each method that changes more than one row is one atomic unit:
//! either every write lands or none does.
//!
//! Implementations:
//! - [`postgres::PgStore`]: production, one SQL transaction per atomic unit
//! - [`memory::MemoryStore`]: tests and credential-less development

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::deposit::state::DepositStatus;
use crate::deposit::types::{DepositFailure, DepositSettlement, InboundPaymentRequest};
use crate::error::{PaymentError, PaymentResult};
use crate::money::Amount;
use crate::payout::state::PayoutStatus;
use crate::payout::types::{OutboundPayout, PayoutTransition};
use crate::wallet::models::{EntryDraft, LedgerEntry, Page, PageRequest, Wallet};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// New sortable record id
pub fn new_record_id() -> String {
    ulid::Ulid::new().to_string()
}

// Conflict errors, worded the same on every backend

pub(crate) fn duplicate_request(correlation_id: &str) -> PaymentError {
    PaymentError::Internal(format!("correlation id {} already exists", correlation_id))
}

pub(crate) fn duplicate_payout(id: &str) -> PaymentError {
    PaymentError::Internal(format!("payout {} already exists", id))
}

pub(crate) fn receipt_taken(receipt: Option<&str>) -> PaymentError {
    PaymentError::DuplicateCallback(format!("receipt {:?} already credited", receipt))
}

pub(crate) fn provider_ref_taken(provider_ref: Option<&str>) -> PaymentError {
    PaymentError::DuplicateCallback(format!("provider_ref {:?} already recorded", provider_ref))
}

/// Result of resolving a pending deposit request
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// The gate was open; the record moved to a terminal status. `entry` is
    /// the credited ledger entry for a successful settlement.
    Applied {
        request: InboundPaymentRequest,
        entry: Option<LedgerEntry>,
    },
    /// The record had already left `pending`; nothing was written
    AlreadyResolved(DepositStatus),
    NotFound,
}

/// Result of a guarded payout status change
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(OutboundPayout),
    /// The payout was no longer in the expected status; nothing was written
    StatusMismatch(PayoutStatus),
    NotFound,
}

/// Result of claiming a `pending` payout for a provider call
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchClaim {
    /// This caller owns the provider call for the current reservation
    Claimed(OutboundPayout),
    /// Still `pending`, but another caller already holds the claim
    InFlight,
    StatusMismatch(PayoutStatus),
    NotFound,
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Get or create the wallet for `(user_id, currency)`
    async fn ensure_wallet(&self, user_id: i64, currency: &str) -> PaymentResult<Wallet>;

    async fn get_wallet(&self, user_id: i64, currency: &str) -> PaymentResult<Option<Wallet>>;

    /// `balance += amount` and append one entry. Fails if the wallet is unknown.
    async fn credit(
        &self,
        wallet_id: &str,
        amount: Amount,
        entry: EntryDraft,
    ) -> PaymentResult<LedgerEntry>;

    /// `balance -= amount` and append one entry. Rejects if `balance < amount`.
    async fn debit(
        &self,
        wallet_id: &str,
        amount: Amount,
        entry: EntryDraft,
    ) -> PaymentResult<LedgerEntry>;

    /// History ordered `created_at` descending, with the total row count
    async fn list_entries(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> PaymentResult<Page<LedgerEntry>>;
}

#[async_trait]
pub trait DepositStore: Send + Sync {
    /// Persist a new `pending` request. Fails on a duplicate correlation id.
    async fn insert_request(&self, request: &InboundPaymentRequest) -> PaymentResult<()>;

    async fn get_request(&self, correlation_id: &str)
    -> PaymentResult<Option<InboundPaymentRequest>>;

    /// Gate + complete + credit + ledger append + link, as one unit.
    /// The request's `amount` becomes the credited amount.
    ///
    /// Only a `pending` record is touched. A receipt already present in the
    /// ledger aborts the whole unit with `DuplicateCallback`.
    async fn settle_success(&self, settlement: &DepositSettlement) -> PaymentResult<SettleOutcome>;

    /// Gate + mark failed, as one unit. No ledger mutation.
    async fn settle_failure(&self, failure: &DepositFailure) -> PaymentResult<SettleOutcome>;
}

#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Insert a `pending` payout and reserve its gross amount
    /// (`balance -> locked_balance`, pending withdrawal entry), as one unit.
    async fn create_reserved(&self, payout: &OutboundPayout) -> PaymentResult<OutboundPayout>;

    async fn get_payout(&self, id: &str) -> PaymentResult<Option<OutboundPayout>>;

    async fn find_by_conversation(
        &self,
        conversation_id: &str,
    ) -> PaymentResult<Option<OutboundPayout>>;

    /// Set `dispatched_at` on a `pending` payout that has none. At most one
    /// caller wins per reservation; a retry (`failed -> pending`) clears it.
    async fn claim_dispatch(&self, id: &str) -> PaymentResult<DispatchClaim>;

    /// Compare-and-set `transition.from -> transition.to` together with the
    /// transition's ledger effect, as one unit.
    async fn apply_transition(
        &self,
        id: &str,
        transition: &PayoutTransition,
    ) -> PaymentResult<TransitionOutcome>;
}

/// Everything the service needs from one backend
#[async_trait]
pub trait PaymentStore: WalletStore + DepositStore + PayoutStore {
    fn backend_name(&self) -> &'static str;

    /// Cheap liveness check for `/health`
    async fn ping(&self) -> PaymentResult<()>;
}
