//! HTTP gateway
//!
//! ```text
//! /wallet/*            JWT       deposits, withdrawals, balance, history
//! /webhooks/mpesa/*    none      provider callbacks, always 200 Accepted
//! /admin/*             secret    payout transitions and dispatch
//! /health, /docs
//! ```

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Build the full router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // User Routes - Protected by JWT
    // ==========================================================================
    let wallet_routes = Router::new()
        .route("/deposit", post(handlers::initiate_deposit))
        .route("/deposits/{checkout_request_id}", get(handlers::get_deposit))
        .route("/balance", get(handlers::get_balance))
        .route("/transactions", get(handlers::get_transactions))
        .route("/withdraw", post(handlers::withdraw))
        .route("/payouts/{id}", get(handlers::get_payout))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    // ==========================================================================
    // Provider Webhooks (no auth, always acknowledged)
    // ==========================================================================
    let webhook_routes = Router::new()
        .route("/stk-callback", post(handlers::stk_callback))
        .route("/b2c-result", post(handlers::b2c_result))
        .route("/b2c-timeout", post(handlers::b2c_timeout));

    // ==========================================================================
    // Operator Routes - Protected by X-Internal-Secret
    // ==========================================================================
    let admin_routes = Router::new()
        .route("/payouts/{id}/transition", post(handlers::transition_payout))
        .route("/payouts/{id}/dispatch", post(handlers::dispatch_payout))
        .layer(from_fn_with_state(
            state.clone(),
            auth::internal_auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/wallet", wallet_routes)
        .nest("/webhooks/mpesa", webhook_routes)
        .nest("/admin", admin_routes)
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {} (is the port in use?)", addr, e))?;

    tracing::info!(addr = %addr, "Gateway listening");
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
