//! Deposits (STK push)
//!
//! [`service::DepositService`] issues the push and records the pending
//! request; [`processor::CallbackProcessor`] applies the asynchronous result
//! exactly once.

pub mod processor;
pub mod service;
pub mod state;
pub mod types;


pub use processor::{CallbackOutcome, CallbackProcessor};
pub use service::DepositService;
pub use state::DepositStatus;
