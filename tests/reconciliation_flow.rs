//! End-to-end reconciliation scenarios through the public API
//!
//! In-memory store, a counting provider and a collecting event sink.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pesa_wallet::deposit::{CallbackOutcome, CallbackProcessor, DepositService, DepositStatus};
use pesa_wallet::events::{EventBus, EventError, EventSink, PaymentEvent};
use pesa_wallet::money::AmountLimits;
use pesa_wallet::mpesa::{PayoutAccepted, PaymentProvider, ProviderError, PushAccepted};
use pesa_wallet::payout::{PayoutService, PayoutStatus, is_transition_valid};
use pesa_wallet::store::{DepositStore, MemoryStore, WalletStore};
use pesa_wallet::wallet::models::{PageRequest, total_pages};

// ============================================================================
// Doubles
// ============================================================================

#[derive(Default)]
struct CountingProvider {
    pushes: AtomicUsize,
    payouts: AtomicUsize,
}

#[async_trait]
impl PaymentProvider for CountingProvider {
    async fn initiate_push(
        &self,
        _phone: &str,
        _amount: u64,
        _reference: &str,
    ) -> Result<PushAccepted, ProviderError> {
        let n = self.pushes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PushAccepted {
            correlation_id: format!("CHK{}", n),
            secondary_correlation_id: format!("MR{}", n),
            customer_message: String::new(),
        })
    }

    async fn initiate_payout(
        &self,
        _phone: &str,
        _amount: u64,
        reference: &str,
    ) -> Result<PayoutAccepted, ProviderError> {
        let n = self.payouts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PayoutAccepted {
            conversation_id: format!("AG_{}", n),
            originator_conversation_id: reference.to_string(),
        })
    }
}

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<PaymentEvent>>,
}

impl CollectingSink {
    async fn names(&self, expected: usize) -> Vec<&'static str> {
        for _ in 0..200 {
            if self.events.lock().unwrap().len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    fn name(&self) -> &'static str {
        "collecting"
    }

    async fn publish(&self, event: &PaymentEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct System {
    store: Arc<MemoryStore>,
    provider: Arc<CountingProvider>,
    sink: Arc<CollectingSink>,
    deposits: DepositService,
    callbacks: CallbackProcessor,
    payouts: PayoutService,
}

fn system() -> System {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(CountingProvider::default());
    let sink = Arc::new(CollectingSink::default());
    let (bus, _handle) = EventBus::start(64, vec![sink.clone()]);
    let limits = AmountLimits::new(10, 150_000);
    System {
        deposits: DepositService::new(provider.clone(), store.clone(), limits, "KES"),
        callbacks: CallbackProcessor::new(store.clone(), bus.clone()),
        payouts: PayoutService::new(
            provider.clone(),
            store.clone(),
            store.clone(),
            bus,
            limits,
            Decimal::ZERO,
            "KES",
        ),
        store,
        provider,
        sink,
    }
}

fn stk_success(checkout_id: &str, amount: u64, receipt: &str) -> Vec<u8> {
    serde_json::json!({"Body": {"stkCallback": {
        "MerchantRequestID": "MR1",
        "CheckoutRequestID": checkout_id,
        "ResultCode": 0,
        "ResultDesc": "The service request is processed successfully.",
        "CallbackMetadata": {"Item": [
            {"Name": "Amount", "Value": amount},
            {"Name": "MpesaReceiptNumber", "Value": receipt},
            {"Name": "PhoneNumber", "Value": 254700000000u64}
        ]}
    }}})
    .to_string()
    .into_bytes()
}

async fn balance(store: &MemoryStore, user_id: i64) -> Decimal {
    store
        .get_wallet(user_id, "KES")
        .await
        .unwrap()
        .map(|w| w.balance)
        .unwrap_or_default()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn deposit_is_credited_exactly_once() {
    let sys = system();
    let initiated = sys.deposits.initiate(1, "+254700000000", 500).await.unwrap();
    assert_eq!(initiated.checkout_request_id, "CHK1");

    let body = stk_success("CHK1", 500, "QK123");
    assert_eq!(sys.callbacks.handle_stk_callback(&body).await, CallbackOutcome::Applied);
    assert_eq!(sys.callbacks.handle_stk_callback(&body).await, CallbackOutcome::Duplicate);

    assert_eq!(balance(&sys.store, 1).await, dec!(500.00));
    let history = sys.store.list_entries(1, PageRequest::default()).await.unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.entries[0].provider_ref.as_deref(), Some("QK123"));

    let request = sys.store.get_request("CHK1").await.unwrap().unwrap();
    assert_eq!(request.status, DepositStatus::Completed);
    assert_eq!(sys.sink.names(1).await, vec!["deposit_completed"]);
}

#[tokio::test]
async fn concurrent_redeliveries_pass_the_gate_once() {
    let sys = Arc::new(system());
    sys.deposits.initiate(2, "0712345678", 2500).await.unwrap();
    let body = Arc::new(stk_success("CHK1", 2500, "QKRACE"));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let sys = sys.clone();
            let body = body.clone();
            tokio::spawn(async move { sys.callbacks.handle_stk_callback(&body).await })
        })
        .collect();
    let mut applied = 0;
    for task in tasks {
        if task.await.unwrap() == CallbackOutcome::Applied {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(balance(&sys.store, 2).await, dec!(2500));
    assert_eq!(sys.store.entries_for(2).await.len(), 1);
}

#[tokio::test]
async fn cancelled_push_emits_failure_without_ledger_change() {
    let sys = system();
    sys.deposits.initiate(3, "0700000000", 100).await.unwrap();
    let body = br#"{"Body":{"stkCallback":{"MerchantRequestID":"MR1","CheckoutRequestID":"CHK1",
        "ResultCode":1032,"ResultDesc":"Request cancelled by user"}}}"#;

    assert_eq!(sys.callbacks.handle_stk_callback(body).await, CallbackOutcome::Rejected);
    let request = sys.store.get_request("CHK1").await.unwrap().unwrap();
    assert_eq!(request.status, DepositStatus::Failed);
    assert!(sys.store.entries_for(3).await.is_empty());
    assert_eq!(sys.sink.names(1).await, vec!["deposit_failed"]);
}

#[tokio::test]
async fn out_of_range_deposits_never_call_the_provider() {
    let sys = system();
    assert!(sys.deposits.initiate(1, "0700000000", 9).await.is_err());
    assert!(sys.deposits.initiate(1, "0700000000", 150_001).await.is_err());
    assert_eq!(sys.provider.pushes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn payout_lifecycle_through_operator_path() {
    let sys = system();
    sys.deposits.initiate(4, "0700000000", 1000).await.unwrap();
    sys.callbacks
        .handle_stk_callback(&stk_success("CHK1", 1000, "QKFUND"))
        .await;

    let payout = sys.payouts.request_withdrawal(4, "0700000000", 1000).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);
    assert_eq!(sys.provider.payouts.load(Ordering::SeqCst), 1);

    let done = sys
        .payouts
        .transition(&payout.id, PayoutStatus::Succeeded, None)
        .await
        .unwrap();
    assert_eq!(done.status, PayoutStatus::Succeeded);
    assert_eq!(balance(&sys.store, 4).await, Decimal::ZERO);

    assert!(
        sys.payouts
            .transition(&payout.id, PayoutStatus::Processing, None)
            .await
            .is_err()
    );

    let reversed = sys
        .payouts
        .transition(&payout.id, PayoutStatus::Reversed, None)
        .await
        .unwrap();
    assert_eq!(reversed.status, PayoutStatus::Reversed);
    assert_eq!(balance(&sys.store, 4).await, dec!(1000));
}

#[test]
fn transition_table_matches_the_machine() {
    use PayoutStatus::*;
    assert!(is_transition_valid(Pending, Processing));
    assert!(is_transition_valid(Processing, Succeeded));
    assert!(is_transition_valid(Succeeded, Reversed));
    assert!(is_transition_valid(Failed, Pending));
    assert!(!is_transition_valid(Succeeded, Processing));
    for to in PayoutStatus::ALL {
        assert!(!is_transition_valid(Reversed, to));
    }
}

#[test]
fn pagination_arithmetic() {
    assert_eq!(total_pages(101, 20), 6);
    assert_eq!(total_pages(0, 20), 0);
}
