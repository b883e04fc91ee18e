//! Wallet ledger
//!
//! Balances plus an append-only entry log. Writes happen inside the store's
//! atomic units; this module owns the model and the read side.

pub mod models;
pub mod service;

pub use models::{BalanceView, EntryStatus, EntryType, LedgerEntry, Page, PageRequest, Wallet};
pub use service::WalletService;
