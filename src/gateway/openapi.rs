//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::deposit::types::{DepositInitiated, DepositStatusView};
use crate::gateway::auth::INTERNAL_SECRET_HEADER;
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{DepositRequest, ProviderAck, TransitionRequest, WithdrawRequest};
use crate::payout::{PayoutStatus, PayoutView};
use crate::wallet::{BalanceView, EntryStatus, EntryType, LedgerEntry};

/// JWT bearer for users, shared secret header for operators
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("HS256 token; `sub` is the user id"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "internal_secret",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    INTERNAL_SECRET_HEADER,
                    "Operator shared secret",
                ))),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pesa Wallet API",
        version = "1.0.0",
        description = "M-Pesa wallet: STK push deposits, B2C withdrawals and an idempotent ledger.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::initiate_deposit,
        crate::gateway::handlers::get_deposit,
        crate::gateway::handlers::get_balance,
        crate::gateway::handlers::get_transactions,
        crate::gateway::handlers::withdraw,
        crate::gateway::handlers::get_payout,
        crate::gateway::handlers::stk_callback,
        crate::gateway::handlers::b2c_result,
        crate::gateway::handlers::b2c_timeout,
        crate::gateway::handlers::transition_payout,
        crate::gateway::handlers::dispatch_payout,
    ),
    components(
        schemas(
            HealthResponse,
            DepositRequest,
            DepositInitiated,
            DepositStatusView,
            BalanceView,
            LedgerEntry,
            EntryType,
            EntryStatus,
            WithdrawRequest,
            PayoutView,
            PayoutStatus,
            TransitionRequest,
            ProviderAck,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Wallet", description = "Deposits, withdrawals, balance and history (JWT required)"),
        (name = "Webhooks", description = "Provider callbacks (always acknowledged)"),
        (name = "Operator", description = "Payout administration (X-Internal-Secret required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Pesa Wallet API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_endpoints_registered() {
        let spec = ApiDoc::openapi();
        let paths = spec.paths.paths;
        for path in [
            "/health",
            "/wallet/deposit",
            "/wallet/deposits/{checkout_request_id}",
            "/wallet/balance",
            "/wallet/transactions",
            "/wallet/withdraw",
            "/wallet/payouts/{id}",
            "/webhooks/mpesa/stk-callback",
            "/webhooks/mpesa/b2c-result",
            "/webhooks/mpesa/b2c-timeout",
            "/admin/payouts/{id}/transition",
            "/admin/payouts/{id}/dispatch",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_security_schemes_registered() {
        let spec = ApiDoc::openapi();
        let json = spec.to_json().unwrap();
        assert!(json.contains("bearer_auth"));
        assert!(json.contains("X-Internal-Secret"));
    }
}
