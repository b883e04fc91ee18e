//! Wallet and ledger data models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::money::format_amount;

/// Provider tag written on ledger entries that reference an external receipt
pub const PROVIDER_MPESA: &str = "mpesa";

// ============================================================================
// Wallet
// ============================================================================

/// One balance per `(user_id, currency)`.
///
/// `balance` and `locked_balance` never go negative; `locked_balance` holds
/// withdrawal funds reserved until the payout settles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    pub id: String,
    pub user_id: i64,
    pub currency: String,
    pub balance: Decimal,
    pub locked_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(id: String, user_id: i64, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            currency: currency.to_string(),
            balance: Decimal::ZERO,
            locked_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `GET /wallet/balance` body
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BalanceView {
    #[schema(example = "KES")]
    pub currency: String,
    #[schema(example = "500.00")]
    pub available: String,
    /// Funds reserved for in-flight withdrawals
    #[schema(example = "0.00")]
    pub pending: String,
    #[schema(example = "500.00")]
    pub total: String,
}

impl BalanceView {
    pub fn from_wallet(wallet: &Wallet) -> Self {
        Self {
            currency: wallet.currency.clone(),
            available: format_amount(wallet.balance),
            pending: format_amount(wallet.locked_balance),
            total: format_amount(wallet.balance + wallet.locked_balance),
        }
    }

    pub fn empty(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            available: format_amount(Decimal::ZERO),
            pending: format_amount(Decimal::ZERO),
            total: format_amount(Decimal::ZERO),
        }
    }
}

// ============================================================================
// Ledger Entry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    Fee,
    Reversal,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Withdrawal => "withdrawal",
            EntryType::Fee => "fee",
            EntryType::Reversal => "reversal",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(EntryType::Deposit),
            "withdrawal" => Ok(EntryType::Withdrawal),
            "fee" => Ok(EntryType::Fee),
            "reversal" => Ok(EntryType::Reversal),
            _ => Err(format!("Invalid entry type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "completed" => Ok(EntryStatus::Completed),
            "failed" => Ok(EntryStatus::Failed),
            _ => Err(format!("Invalid entry status: {}", s)),
        }
    }
}

/// Immutable record of one balance-affecting event.
///
/// `(provider, provider_ref)` is unique when `provider_ref` is present.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: i64,
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub status: EntryStatus,
    #[schema(value_type = String, example = "500.00")]
    pub amount: Decimal,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields the caller chooses when appending an entry; the store fills ids,
/// amount and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub description: String,
}

impl EntryDraft {
    pub fn new(entry_type: EntryType, status: EntryStatus, description: impl Into<String>) -> Self {
        Self {
            entry_type,
            status,
            provider: PROVIDER_MPESA.to_string(),
            provider_ref: None,
            description: description.into(),
        }
    }

    pub fn with_provider_ref(mut self, provider_ref: Option<String>) -> Self {
        self.provider_ref = provider_ref;
        self
    }

    /// Materialize into an entry against `wallet`
    pub fn into_entry(self, id: String, wallet: &Wallet, amount: Decimal) -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            id,
            user_id: wallet.user_id,
            wallet_id: wallet.id.clone(),
            entry_type: self.entry_type,
            completed_at: (self.status == EntryStatus::Completed).then_some(now),
            status: self.status,
            amount,
            provider: self.provider,
            provider_ref: self.provider_ref,
            description: self.description,
            created_at: now,
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Normalized page request (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Defaults `page` to 1 and `per_page` to 20, clamping `per_page` to `[1, 100]`.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    pub fn limit(&self) -> u64 {
        self.per_page as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// `ceil(total / per_page)`; zero rows means zero pages.
pub fn total_pages(total: u64, per_page: u32) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub entries: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(entries: Vec<T>, request: PageRequest, total: u64) -> Self {
        let pages = total_pages(total, request.per_page);
        Self {
            entries,
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages: pages,
            has_more: (request.page as u64) < pages,
        }
    }
}
