//! In-memory store
//!
//! One mutex guards every map, so each trait method observes and mutates a
//! consistent snapshot. Atomic units validate first and write last: an error
//! returned mid-way leaves nothing behind.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use super::{
    DepositStore, DispatchClaim, PaymentStore, PayoutStore, SettleOutcome, TransitionOutcome,
    WalletStore, duplicate_payout, duplicate_request, new_record_id, provider_ref_taken,
    receipt_taken,
};
use crate::deposit::state::{DepositStatus, is_transition_valid};
use crate::deposit::types::{DepositFailure, DepositSettlement, InboundPaymentRequest};
use crate::error::{PaymentError, PaymentResult};
use crate::money::Amount;
use crate::payout::state::PayoutStatus;
use crate::payout::types::{LedgerEffect, OutboundPayout, PayoutTransition};
use crate::wallet::models::{
    EntryDraft, EntryStatus, LedgerEntry, PROVIDER_MPESA, Page, PageRequest, Wallet,
};

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, Wallet>,
    wallet_index: HashMap<(i64, String), String>,
    /// Insertion order; history reads walk it backwards
    entries: Vec<LedgerEntry>,
    provider_refs: HashSet<(String, String)>,
    requests: HashMap<String, InboundPaymentRequest>,
    payouts: HashMap<String, OutboundPayout>,
    conversations: HashMap<String, String>,
}

impl Inner {
    fn wallet_for(&mut self, user_id: i64, currency: &str) -> Wallet {
        let key = (user_id, currency.to_string());
        if let Some(wallet) = self.wallet_index.get(&key).and_then(|id| self.wallets.get(id)) {
            return wallet.clone();
        }
        let wallet = Wallet::new(new_record_id(), user_id, currency);
        self.wallet_index.insert(key, wallet.id.clone());
        self.wallets.insert(wallet.id.clone(), wallet.clone());
        wallet
    }

    fn ref_taken(&self, draft: &EntryDraft) -> bool {
        draft
            .provider_ref
            .as_ref()
            .is_some_and(|r| self.provider_refs.contains(&(draft.provider.clone(), r.clone())))
    }

    /// Append an entry whose wallet change the caller has already applied.
    fn append(&mut self, draft: EntryDraft, wallet: &Wallet, amount: Decimal) -> LedgerEntry {
        if let Some(r) = &draft.provider_ref {
            self.provider_refs.insert((draft.provider.clone(), r.clone()));
        }
        let entry = draft.into_entry(new_record_id(), wallet, amount);
        self.entries.push(entry.clone());
        entry
    }

    fn entry_mut(&mut self, id: Option<&str>) -> Option<&mut LedgerEntry> {
        let id = id?;
        self.entries.iter_mut().rev().find(|e| e.id == id)
    }

    fn save_wallet(&mut self, mut wallet: Wallet) -> Wallet {
        wallet.updated_at = Utc::now();
        self.wallets.insert(wallet.id.clone(), wallet.clone());
        wallet
    }
}

/// Process-local store for tests and credential-less development
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger rows for one user, oldest first
    pub async fn entries_for(&self, user_id: i64) -> Vec<LedgerEntry> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn ensure_wallet(&self, user_id: i64, currency: &str) -> PaymentResult<Wallet> {
        let mut inner = self.inner.lock().await;
        Ok(inner.wallet_for(user_id, currency))
    }

    async fn get_wallet(&self, user_id: i64, currency: &str) -> PaymentResult<Option<Wallet>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .wallet_index
            .get(&(user_id, currency.to_string()))
            .and_then(|id| inner.wallets.get(id))
            .cloned())
    }

    async fn credit(
        &self,
        wallet_id: &str,
        amount: Amount,
        entry: EntryDraft,
    ) -> PaymentResult<LedgerEntry> {
        let mut inner = self.inner.lock().await;
        let mut wallet = inner
            .wallets
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet {}", wallet_id)))?;
        if inner.ref_taken(&entry) {
            return Err(provider_ref_taken(entry.provider_ref.as_deref()));
        }
        wallet.balance += amount.value();
        let wallet = inner.save_wallet(wallet);
        Ok(inner.append(entry, &wallet, amount.value()))
    }

    async fn debit(
        &self,
        wallet_id: &str,
        amount: Amount,
        entry: EntryDraft,
    ) -> PaymentResult<LedgerEntry> {
        let mut inner = self.inner.lock().await;
        let mut wallet = inner
            .wallets
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet {}", wallet_id)))?;
        if wallet.balance < amount.value() {
            return Err(PaymentError::InsufficientFunds);
        }
        if inner.ref_taken(&entry) {
            return Err(provider_ref_taken(entry.provider_ref.as_deref()));
        }
        wallet.balance -= amount.value();
        let wallet = inner.save_wallet(wallet);
        Ok(inner.append(entry, &wallet, amount.value()))
    }

    async fn list_entries(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> PaymentResult<Page<LedgerEntry>> {
        let inner = self.inner.lock().await;
        let mine: Vec<&LedgerEntry> = inner
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .collect();
        let total = mine.len() as u64;
        let rows = mine
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(rows, page, total))
    }
}

#[async_trait]
impl DepositStore for MemoryStore {
    async fn insert_request(&self, request: &InboundPaymentRequest) -> PaymentResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.requests.contains_key(&request.correlation_id) {
            return Err(duplicate_request(&request.correlation_id));
        }
        inner
            .requests
            .insert(request.correlation_id.clone(), request.clone());
        Ok(())
    }

    async fn get_request(
        &self,
        correlation_id: &str,
    ) -> PaymentResult<Option<InboundPaymentRequest>> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.get(correlation_id).cloned())
    }

    async fn settle_success(&self, settlement: &DepositSettlement) -> PaymentResult<SettleOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(mut request) = inner.requests.get(&settlement.correlation_id).cloned() else {
            return Ok(SettleOutcome::NotFound);
        };
        if !is_transition_valid(request.status, DepositStatus::Completed) {
            return Ok(SettleOutcome::AlreadyResolved(request.status));
        }
        let draft = settlement.entry_draft();
        if inner.ref_taken(&draft) {
            return Err(receipt_taken(settlement.provider_receipt.as_deref()));
        }

        let mut wallet = inner.wallet_for(request.user_id, &request.currency);
        wallet.balance += settlement.amount.value();
        let wallet = inner.save_wallet(wallet);
        let entry = inner.append(draft, &wallet, settlement.amount.value());

        let now = Utc::now();
        request.status = DepositStatus::Completed;
        request.amount = settlement.amount.value();
        request.provider_receipt = settlement.provider_receipt.clone();
        request.result_code = Some(settlement.result_code);
        request.result_desc = Some(settlement.result_desc.clone());
        request.raw_callback_payload = Some(settlement.raw_payload.clone());
        request.ledger_entry_id = Some(entry.id.clone());
        request.updated_at = now;
        request.completed_at = Some(now);
        inner
            .requests
            .insert(request.correlation_id.clone(), request.clone());

        Ok(SettleOutcome::Applied {
            request,
            entry: Some(entry),
        })
    }

    async fn settle_failure(&self, failure: &DepositFailure) -> PaymentResult<SettleOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(request) = inner.requests.get_mut(&failure.correlation_id) else {
            return Ok(SettleOutcome::NotFound);
        };
        if !is_transition_valid(request.status, DepositStatus::Failed) {
            return Ok(SettleOutcome::AlreadyResolved(request.status));
        }
        let now = Utc::now();
        request.status = DepositStatus::Failed;
        request.result_code = Some(failure.result_code);
        request.result_desc = Some(failure.result_desc.clone());
        request.raw_callback_payload = Some(failure.raw_payload.clone());
        request.updated_at = now;
        request.completed_at = Some(now);
        Ok(SettleOutcome::Applied {
            request: request.clone(),
            entry: None,
        })
    }
}

#[async_trait]
impl PayoutStore for MemoryStore {
    async fn create_reserved(&self, payout: &OutboundPayout) -> PaymentResult<OutboundPayout> {
        let mut inner = self.inner.lock().await;
        if inner.payouts.contains_key(&payout.id) {
            return Err(duplicate_payout(&payout.id));
        }
        let mut wallet = inner
            .wallets
            .get(&payout.wallet_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet {}", payout.wallet_id)))?;
        if wallet.balance < payout.amount {
            return Err(PaymentError::InsufficientFunds);
        }
        wallet.balance -= payout.amount;
        wallet.locked_balance += payout.amount;
        let wallet = inner.save_wallet(wallet);
        let entry = inner.append(payout.withdrawal_draft(), &wallet, payout.amount);

        let mut stored = payout.clone();
        stored.ledger_entry_id = Some(entry.id);
        inner.payouts.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_payout(&self, id: &str) -> PaymentResult<Option<OutboundPayout>> {
        let inner = self.inner.lock().await;
        Ok(inner.payouts.get(id).cloned())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: &str,
    ) -> PaymentResult<Option<OutboundPayout>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .conversations
            .get(conversation_id)
            .and_then(|id| inner.payouts.get(id))
            .cloned())
    }

    async fn claim_dispatch(&self, id: &str) -> PaymentResult<DispatchClaim> {
        let mut inner = self.inner.lock().await;
        let Some(payout) = inner.payouts.get_mut(id) else {
            return Ok(DispatchClaim::NotFound);
        };
        if payout.status != PayoutStatus::Pending {
            return Ok(DispatchClaim::StatusMismatch(payout.status));
        }
        if payout.dispatched_at.is_some() {
            return Ok(DispatchClaim::InFlight);
        }
        let now = Utc::now();
        payout.dispatched_at = Some(now);
        payout.updated_at = now;
        Ok(DispatchClaim::Claimed(payout.clone()))
    }

    async fn apply_transition(
        &self,
        id: &str,
        transition: &PayoutTransition,
    ) -> PaymentResult<TransitionOutcome> {
        let effect = transition
            .effect()
            .ok_or_else(|| PaymentError::invalid_transition(transition.from, transition.to))?;

        let mut inner = self.inner.lock().await;
        let Some(mut payout) = inner.payouts.get(id).cloned() else {
            return Ok(TransitionOutcome::NotFound);
        };
        if payout.status != transition.from {
            return Ok(TransitionOutcome::StatusMismatch(payout.status));
        }
        if let Some(conv) = &transition.conversation_id {
            if inner
                .conversations
                .get(conv)
                .is_some_and(|owner| owner != &payout.id)
            {
                return Err(PaymentError::Internal(format!(
                    "conversation id {} belongs to another payout",
                    conv
                )));
            }
        }

        let mut wallet = inner
            .wallets
            .get(&payout.wallet_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet {}", payout.wallet_id)))?;
        let amount = payout.amount;

        // Validate everything before the first write
        match effect {
            LedgerEffect::Settle | LedgerEffect::Release if wallet.locked_balance < amount => {
                return Err(PaymentError::Internal(format!(
                    "wallet {} locked balance below payout {}",
                    wallet.id, payout.id
                )));
            }
            LedgerEffect::Reserve if wallet.balance < amount => {
                return Err(PaymentError::InsufficientFunds);
            }
            LedgerEffect::Settle
                if transition
                    .transaction_id
                    .as_ref()
                    .is_some_and(|tx| inner.provider_refs.contains(&(PROVIDER_MPESA.to_string(), tx.clone()))) =>
            {
                return Err(provider_ref_taken(transition.transaction_id.as_deref()));
            }
            _ => {}
        }

        let now = Utc::now();
        match effect {
            LedgerEffect::None => {}
            LedgerEffect::Settle => {
                wallet.locked_balance -= amount;
                inner.save_wallet(wallet);
                if let Some(tx) = &transition.transaction_id {
                    inner
                        .provider_refs
                        .insert((PROVIDER_MPESA.to_string(), tx.clone()));
                }
                if let Some(entry) = inner.entry_mut(payout.ledger_entry_id.as_deref()) {
                    entry.status = EntryStatus::Completed;
                    entry.completed_at = Some(now);
                    if transition.transaction_id.is_some() {
                        entry.provider_ref = transition.transaction_id.clone();
                    }
                }
            }
            LedgerEffect::Release => {
                wallet.locked_balance -= amount;
                wallet.balance += amount;
                let wallet = inner.save_wallet(wallet);
                if let Some(entry) = inner.entry_mut(payout.ledger_entry_id.as_deref()) {
                    entry.status = EntryStatus::Failed;
                }
                inner.append(payout.reversal_draft(transition.to), &wallet, amount);
            }
            LedgerEffect::Refund => {
                wallet.balance += amount;
                let wallet = inner.save_wallet(wallet);
                inner.append(payout.reversal_draft(transition.to), &wallet, amount);
            }
            LedgerEffect::Reserve => {
                wallet.balance -= amount;
                wallet.locked_balance += amount;
                let wallet = inner.save_wallet(wallet);
                let entry = inner.append(payout.withdrawal_draft(), &wallet, amount);
                payout.ledger_entry_id = Some(entry.id);
                if let Some(conv) = payout.conversation_id.take() {
                    inner.conversations.remove(&conv);
                }
            }
        }

        payout.record_transition(transition, now);
        if let Some(conv) = &payout.conversation_id {
            inner.conversations.insert(conv.clone(), payout.id.clone());
        }
        inner.payouts.insert(payout.id.clone(), payout.clone());
        Ok(TransitionOutcome::Applied(payout))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> PaymentResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::models::EntryType;
    use rust_decimal_macros::dec;

    fn amount(v: Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    fn pending_request(id: &str, user_id: i64) -> InboundPaymentRequest {
        InboundPaymentRequest::new_pending(
            id.into(),
            format!("M-{}", id),
            user_id,
            "254700000000".into(),
            amount(dec!(500)),
            "KES",
        )
    }

    fn settlement(id: &str, receipt: &str) -> DepositSettlement {
        DepositSettlement {
            correlation_id: id.into(),
            amount: amount(dec!(500)),
            provider_receipt: Some(receipt.into()),
            result_code: 0,
            result_desc: "ok".into(),
            raw_payload: "{}".into(),
        }
    }

    #[tokio::test]
    async fn test_settle_success_is_gated() {
        let store = MemoryStore::new();
        store.insert_request(&pending_request("CHK1", 1)).await.unwrap();

        let first = store.settle_success(&settlement("CHK1", "QK123")).await.unwrap();
        let SettleOutcome::Applied { request, entry } = first else {
            panic!("expected applied, got {:?}", first);
        };
        assert_eq!(request.status, DepositStatus::Completed);
        let entry = entry.unwrap();
        assert_eq!(request.ledger_entry_id.as_deref(), Some(entry.id.as_str()));

        let second = store.settle_success(&settlement("CHK1", "QK123")).await.unwrap();
        assert_eq!(second, SettleOutcome::AlreadyResolved(DepositStatus::Completed));

        let wallet = store.get_wallet(1, "KES").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(500));
        assert_eq!(store.entries_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_reused_receipt_rolls_back_whole_unit() {
        let store = MemoryStore::new();
        store.insert_request(&pending_request("CHK1", 1)).await.unwrap();
        store.insert_request(&pending_request("CHK2", 1)).await.unwrap();
        store.settle_success(&settlement("CHK1", "QK123")).await.unwrap();

        let err = store.settle_success(&settlement("CHK2", "QK123")).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_CALLBACK");

        let untouched = store.get_request("CHK2").await.unwrap().unwrap();
        assert_eq!(untouched.status, DepositStatus::Pending);
        let wallet = store.get_wallet(1, "KES").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(500));
    }

    #[tokio::test]
    async fn test_unknown_correlation_id() {
        let store = MemoryStore::new();
        assert_eq!(
            store.settle_success(&settlement("NOPE", "R")).await.unwrap(),
            SettleOutcome::NotFound
        );
        let failure = DepositFailure {
            correlation_id: "NOPE".into(),
            result_code: 1032,
            result_desc: "cancelled".into(),
            raw_payload: "{}".into(),
        };
        assert_eq!(
            store.settle_failure(&failure).await.unwrap(),
            SettleOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_duplicate_correlation_id_rejected() {
        let store = MemoryStore::new();
        store.insert_request(&pending_request("CHK9", 1)).await.unwrap();
        let err = store
            .insert_request(&pending_request("CHK9", 2))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal error: correlation id CHK9 already exists"
        );
        assert_eq!(store.get_request("CHK9").await.unwrap().unwrap().user_id, 1);
    }

    #[tokio::test]
    async fn test_credit_and_debit() {
        let store = MemoryStore::new();
        let wallet = store.ensure_wallet(9, "KES").await.unwrap();
        let draft = EntryDraft::new(EntryType::Deposit, EntryStatus::Completed, "seed");
        store.credit(&wallet.id, amount(dec!(100)), draft).await.unwrap();

        let too_much = EntryDraft::new(EntryType::Fee, EntryStatus::Completed, "fee");
        let err = store.debit(&wallet.id, amount(dec!(100.01)), too_much).await;
        assert_eq!(err, Err(PaymentError::InsufficientFunds));

        let fee = EntryDraft::new(EntryType::Fee, EntryStatus::Completed, "fee");
        store.debit(&wallet.id, amount(dec!(40)), fee).await.unwrap();
        let wallet = store.get_wallet(9, "KES").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(60));

        let missing = EntryDraft::new(EntryType::Deposit, EntryStatus::Completed, "x");
        assert!(matches!(
            store.credit("nope", amount(dec!(1)), missing).await,
            Err(PaymentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = MemoryStore::new();
        let wallet = store.ensure_wallet(3, "KES").await.unwrap();
        for i in 1..=5 {
            let draft = EntryDraft::new(EntryType::Deposit, EntryStatus::Completed, format!("d{}", i));
            store.credit(&wallet.id, amount(dec!(10)), draft).await.unwrap();
        }
        let page = store
            .list_entries(3, PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_more);
        assert_eq!(page.entries[0].description, "d5");
        assert_eq!(page.entries[1].description, "d4");
    }

    async fn funded_payout(store: &MemoryStore) -> OutboundPayout {
        let wallet = store.ensure_wallet(5, "KES").await.unwrap();
        let draft = EntryDraft::new(EntryType::Deposit, EntryStatus::Completed, "seed");
        store.credit(&wallet.id, amount(dec!(1000)), draft).await.unwrap();
        let payout = OutboundPayout::new_pending(
            new_record_id(),
            5,
            wallet.id,
            "254700000000".into(),
            amount(dec!(600)),
            Decimal::ZERO,
            "KES",
        );
        store.create_reserved(&payout).await.unwrap()
    }

    #[tokio::test]
    async fn test_payout_release_restores_balance() {
        let store = MemoryStore::new();
        let payout = funded_payout(&store).await;
        let wallet = store.get_wallet(5, "KES").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(400));
        assert_eq!(wallet.locked_balance, dec!(600));

        let t = PayoutTransition::new(PayoutStatus::Pending, PayoutStatus::Failed);
        let out = store.apply_transition(&payout.id, &t).await.unwrap();
        assert!(matches!(out, TransitionOutcome::Applied(_)));

        let wallet = store.get_wallet(5, "KES").await.unwrap().unwrap();
        assert_eq!(wallet.balance, dec!(1000));
        assert_eq!(wallet.locked_balance, Decimal::ZERO);

        // The same transition again is a status mismatch, not a second release
        let again = store.apply_transition(&payout.id, &t).await.unwrap();
        assert_eq!(again, TransitionOutcome::StatusMismatch(PayoutStatus::Failed));
    }

    #[tokio::test]
    async fn test_dispatch_claim_is_single_use_per_reservation() {
        let store = MemoryStore::new();
        let payout = funded_payout(&store).await;

        let DispatchClaim::Claimed(claimed) = store.claim_dispatch(&payout.id).await.unwrap() else {
            panic!("first claim must win");
        };
        assert!(claimed.dispatched_at.is_some());
        assert_eq!(
            store.claim_dispatch(&payout.id).await.unwrap(),
            DispatchClaim::InFlight
        );

        let fail = PayoutTransition::new(PayoutStatus::Pending, PayoutStatus::Failed);
        store.apply_transition(&payout.id, &fail).await.unwrap();
        assert_eq!(
            store.claim_dispatch(&payout.id).await.unwrap(),
            DispatchClaim::StatusMismatch(PayoutStatus::Failed)
        );

        // Retry opens a fresh claim
        let retry = PayoutTransition::new(PayoutStatus::Failed, PayoutStatus::Pending);
        store.apply_transition(&payout.id, &retry).await.unwrap();
        assert!(matches!(
            store.claim_dispatch(&payout.id).await.unwrap(),
            DispatchClaim::Claimed(_)
        ));
        assert_eq!(
            store.claim_dispatch("missing").await.unwrap(),
            DispatchClaim::NotFound
        );
    }

    #[tokio::test]
    async fn test_invalid_transition_rejected_before_lookup() {
        let store = MemoryStore::new();
        let t = PayoutTransition::new(PayoutStatus::Succeeded, PayoutStatus::Processing);
        let err = store.apply_transition("any", &t).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_reservation_rejects_overdraft() {
        let store = MemoryStore::new();
        let wallet = store.ensure_wallet(6, "KES").await.unwrap();
        let payout = OutboundPayout::new_pending(
            new_record_id(),
            6,
            wallet.id,
            "254700000000".into(),
            amount(dec!(50)),
            Decimal::ZERO,
            "KES",
        );
        assert_eq!(
            store.create_reserved(&payout).await,
            Err(PaymentError::InsufficientFunds)
        );
        assert!(store.get_payout(&payout.id).await.unwrap().is_none());
        assert!(store.entries_for(6).await.is_empty());
    }
}
