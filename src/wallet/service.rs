//! Balance and history queries

use std::sync::Arc;

use super::models::{BalanceView, LedgerEntry, Page, PageRequest};
use crate::error::PaymentResult;
use crate::store::WalletStore;

pub struct WalletService {
    wallets: Arc<dyn WalletStore>,
    currency: String,
}

impl WalletService {
    pub fn new(wallets: Arc<dyn WalletStore>, currency: &str) -> Self {
        Self {
            wallets,
            currency: currency.to_string(),
        }
    }

    /// Zeros for a user who never funded a wallet
    pub async fn balance(&self, user_id: i64) -> PaymentResult<BalanceView> {
        Ok(match self.wallets.get_wallet(user_id, &self.currency).await? {
            Some(wallet) => BalanceView::from_wallet(&wallet),
            None => BalanceView::empty(&self.currency),
        })
    }

    pub async fn history(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> PaymentResult<Page<LedgerEntry>> {
        self.wallets.list_entries(user_id, page).await
    }
}
