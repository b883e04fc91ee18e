use std::sync::Arc;

use crate::config::{GatewayConfig, LimitsConfig};
use crate::deposit::{CallbackProcessor, DepositService};
use crate::events::EventBus;
use crate::money::AmountLimits;
use crate::mpesa::PaymentProvider;
use crate::payout::PayoutService;
use crate::store::PaymentStore;
use crate::wallet::WalletService;

/// Gateway shared state
pub struct AppState {
    /// Backend behind every service, kept for health checks
    pub store: Arc<dyn PaymentStore>,
    pub wallet: WalletService,
    pub deposits: DepositService,
    pub callbacks: CallbackProcessor,
    pub payouts: PayoutService,
    pub jwt_secret: String,
    pub internal_secret: String,
}

impl AppState {
    pub fn new<S: PaymentStore + 'static>(
        store: Arc<S>,
        provider: Arc<dyn PaymentProvider>,
        events: EventBus,
        limits: &LimitsConfig,
        gateway: &GatewayConfig,
    ) -> Self {
        let currency = limits.currency.as_str();
        Self {
            wallet: WalletService::new(store.clone(), currency),
            deposits: DepositService::new(
                provider.clone(),
                store.clone(),
                AmountLimits::new(limits.deposit_min, limits.deposit_max),
                currency,
            ),
            callbacks: CallbackProcessor::new(store.clone(), events.clone()),
            payouts: PayoutService::new(
                provider,
                store.clone(),
                store.clone(),
                events,
                AmountLimits::new(limits.withdraw_min, limits.withdraw_max),
                limits.withdraw_fee,
                currency,
            ),
            store,
            jwt_secret: gateway.jwt_secret.clone(),
            internal_secret: gateway.internal_secret.clone(),
        }
    }
}
