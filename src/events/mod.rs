//! Outcome events
//!
//! Fire-and-forget: [`EventBus::emit`] never blocks and never fails the
//! caller. A background dispatcher fans events out to sinks; a sink error is
//! logged and the event is not retried. The ledger stays the source of truth.

pub mod sinks;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::deposit::types::InboundPaymentRequest;
use crate::payout::state::PayoutStatus;
use crate::payout::types::OutboundPayout;

pub use sinks::{LogSink, WebhookSink};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    DepositCompleted {
        checkout_request_id: String,
        user_id: i64,
        phone: String,
        amount: Decimal,
        currency: String,
        receipt: Option<String>,
        ledger_entry_id: Option<String>,
    },
    DepositFailed {
        checkout_request_id: String,
        user_id: i64,
        phone: String,
        amount: Decimal,
        currency: String,
        result_code: Option<i64>,
        result_desc: Option<String>,
    },
    PayoutSucceeded {
        payout_id: String,
        user_id: i64,
        phone: String,
        amount: Decimal,
        net_amount: Decimal,
        currency: String,
        transaction_id: Option<String>,
    },
    PayoutFailed {
        payout_id: String,
        user_id: i64,
        phone: String,
        amount: Decimal,
        currency: String,
        result_code: Option<i64>,
        result_desc: Option<String>,
    },
    PayoutReversed {
        payout_id: String,
        user_id: i64,
        phone: String,
        amount: Decimal,
        currency: String,
    },
}

impl PaymentEvent {
    fn new(kind: EventKind) -> Self {
        Self {
            event_id: ulid::Ulid::new().to_string(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    pub fn deposit_completed(request: &InboundPaymentRequest) -> Self {
        Self::new(EventKind::DepositCompleted {
            checkout_request_id: request.correlation_id.clone(),
            user_id: request.user_id,
            phone: request.phone.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: request.provider_receipt.clone(),
            ledger_entry_id: request.ledger_entry_id.clone(),
        })
    }

    pub fn deposit_failed(request: &InboundPaymentRequest) -> Self {
        Self::new(EventKind::DepositFailed {
            checkout_request_id: request.correlation_id.clone(),
            user_id: request.user_id,
            phone: request.phone.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            result_code: request.result_code,
            result_desc: request.result_desc.clone(),
        })
    }

    /// Event for a payout that just reached `succeeded`, `failed` or
    /// `reversed`; `None` for intermediate statuses.
    pub fn payout_outcome(payout: &OutboundPayout) -> Option<Self> {
        let kind = match payout.status {
            PayoutStatus::Succeeded => EventKind::PayoutSucceeded {
                payout_id: payout.id.clone(),
                user_id: payout.user_id,
                phone: payout.phone.clone(),
                amount: payout.amount,
                net_amount: payout.net_amount,
                currency: payout.currency.clone(),
                transaction_id: payout.transaction_id.clone(),
            },
            PayoutStatus::Failed => EventKind::PayoutFailed {
                payout_id: payout.id.clone(),
                user_id: payout.user_id,
                phone: payout.phone.clone(),
                amount: payout.amount,
                currency: payout.currency.clone(),
                result_code: payout.result_code,
                result_desc: payout.result_desc.clone(),
            },
            PayoutStatus::Reversed => EventKind::PayoutReversed {
                payout_id: payout.id.clone(),
                user_id: payout.user_id,
                phone: payout.phone.clone(),
                amount: payout.amount,
                currency: payout.currency.clone(),
            },
            PayoutStatus::Pending | PayoutStatus::Processing => return None,
        };
        Some(Self::new(kind))
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::DepositCompleted { .. } => "deposit_completed",
            EventKind::DepositFailed { .. } => "deposit_failed",
            EventKind::PayoutSucceeded { .. } => "payout_succeeded",
            EventKind::PayoutFailed { .. } => "payout_failed",
            EventKind::PayoutReversed { .. } => "payout_reversed",
        }
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Event transport failed: {0}")]
    Transport(String),

    #[error("Event consumer answered HTTP {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, event: &PaymentEvent) -> Result<(), EventError>;
}

/// Bounded, non-blocking event channel
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<PaymentEvent>,
}

impl EventBus {
    /// Spawn the dispatcher. It exits once every bus clone is dropped.
    pub fn start(capacity: usize, sinks: Vec<Arc<dyn EventSink>>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(dispatch(rx, sinks));
        (Self { tx }, handle)
    }

    /// Queue an event; a full or closed channel drops it with a warning.
    pub fn emit(&self, event: PaymentEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    event = event.name(),
                    event_id = %event.event_id,
                    "Event channel full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(
                    event = event.name(),
                    event_id = %event.event_id,
                    "Event dispatcher stopped, event dropped"
                );
            }
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<PaymentEvent>, sinks: Vec<Arc<dyn EventSink>>) {
    while let Some(event) = rx.recv().await {
        for sink in &sinks {
            if let Err(e) = sink.publish(&event).await {
                warn!(
                    sink = sink.name(),
                    event = event.name(),
                    event_id = %event.event_id,
                    error = %e,
                    "Event publish failed"
                );
            }
        }
    }
    debug!("Event dispatcher stopped");
}

/// Sinks for tests
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Keeps every published event
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<PaymentEvent>>,
    }

    impl RecordingSink {
        pub fn events(&self) -> Vec<PaymentEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Wait until at least `count` events arrived (or one second passed)
        pub async fn wait_for(&self, count: usize) -> Vec<PaymentEvent> {
            for _ in 0..200 {
                let events = self.events();
                if events.len() >= count {
                    return events;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.events()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn publish(&self, event: &PaymentEvent) -> Result<(), EventError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Always fails
    pub struct BrokenSink;

    #[async_trait]
    impl EventSink for BrokenSink {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn publish(&self, _event: &PaymentEvent) -> Result<(), EventError> {
            Err(EventError::Transport("connection refused".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{BrokenSink, RecordingSink};
    use super::*;
    use crate::money::Amount;
    use rust_decimal_macros::dec;

    fn request() -> InboundPaymentRequest {
        let mut r = InboundPaymentRequest::new_pending(
            "CHK1".into(),
            "M1".into(),
            1,
            "254700000000".into(),
            Amount::new(dec!(500)).unwrap(),
            "KES",
        );
        r.result_code = Some(1032);
        r.result_desc = Some("Request cancelled by user".into());
        r
    }

    #[test]
    fn test_event_json_shape() {
        let event = PaymentEvent::deposit_failed(&request());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deposit_failed");
        assert_eq!(json["checkout_request_id"], "CHK1");
        assert_eq!(json["result_code"], 1032);
        assert_eq!(json["amount"], "500");
        assert_eq!(json["event_id"].as_str().unwrap().len(), 26);
    }

    #[test]
    fn test_payout_outcome_only_for_final_statuses() {
        let mut payout = OutboundPayout::new_pending(
            "p1".into(),
            1,
            "w1".into(),
            "254700000000".into(),
            Amount::new(dec!(100)).unwrap(),
            dec!(0),
            "KES",
        );
        assert!(PaymentEvent::payout_outcome(&payout).is_none());
        payout.status = PayoutStatus::Succeeded;
        assert_eq!(
            PaymentEvent::payout_outcome(&payout).unwrap().name(),
            "payout_succeeded"
        );
        payout.status = PayoutStatus::Reversed;
        assert_eq!(
            PaymentEvent::payout_outcome(&payout).unwrap().name(),
            "payout_reversed"
        );
    }

    #[tokio::test]
    async fn test_broken_sink_does_not_stop_delivery() {
        let recording = Arc::new(RecordingSink::default());
        let (bus, _handle) = EventBus::start(8, vec![Arc::new(BrokenSink), recording.clone()]);
        bus.emit(PaymentEvent::deposit_completed(&request()));
        bus.emit(PaymentEvent::deposit_failed(&request()));
        let events = recording.wait_for(2).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "deposit_completed");
    }

    #[tokio::test]
    async fn test_emit_on_full_channel_drops_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let bus = EventBus { tx };
        bus.emit(PaymentEvent::deposit_completed(&request()));
        // Second event does not fit; emit must return immediately
        bus.emit(PaymentEvent::deposit_completed(&request()));
    }

    #[tokio::test]
    async fn test_emit_after_dispatcher_stopped() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let bus = EventBus { tx };
        bus.emit(PaymentEvent::deposit_failed(&request()));
    }
}
