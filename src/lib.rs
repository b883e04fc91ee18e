//! Pesa Wallet - M-Pesa wallet reconciliation core
//!
//! Deposits arrive as STK push results, withdrawals leave as B2C payouts, and
//! every provider callback is applied to the ledger at most once.
//!
//! # Modules
//!
//! - [`mpesa`] - Provider client, token cache and callback parsing
//! - [`deposit`] - Deposit initiation and the STK callback processor
//! - [`payout`] - Payout state machine and flow
//! - [`wallet`] - Balances and ledger entries
//! - [`store`] - Storage ports with PostgreSQL and in-memory backends
//! - [`events`] - Post-commit outcome events
//! - [`gateway`] - HTTP surface
//! - [`money`] - Amount validation and formatting
//! - [`config`], [`logging`], [`error`], [`db`] - Ambient stack

pub mod config;
pub mod db;
pub mod deposit;
pub mod error;
pub mod events;
pub mod gateway;
pub mod logging;
pub mod money;
pub mod mpesa;
pub mod payout;
pub mod store;
pub mod wallet;

// Convenient re-exports at crate root
pub use error::{PaymentError, PaymentResult};
pub use money::{Amount, AmountLimits};
