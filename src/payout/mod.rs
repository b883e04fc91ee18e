//! Payouts (B2C withdrawals)
//!
//! [`state`] holds the transition table, [`types`] the record and the ledger
//! effect of each transition, and [`service::PayoutService`] drives the flow
//! for API callers, operators and result callbacks alike.

pub mod service;
pub mod state;
pub mod types;


pub use service::PayoutService;
pub use state::{PayoutStatus, is_transition_valid};
pub use types::{OutboundPayout, PayoutView};
