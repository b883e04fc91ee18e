//! Table definitions
//!
//! Amounts are `NUMERIC(20, 2)`; status columns hold the lowercase enum
//! names. Uniqueness constraints carry the idempotency guarantees:
//! `(provider, provider_ref)` stops a receipt from being credited twice.

use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id              TEXT PRIMARY KEY,
        user_id         BIGINT NOT NULL,
        currency        TEXT NOT NULL,
        balance         NUMERIC(20, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
        locked_balance  NUMERIC(20, 2) NOT NULL DEFAULT 0 CHECK (locked_balance >= 0),
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (user_id, currency)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        seq             BIGSERIAL,
        id              TEXT PRIMARY KEY,
        user_id         BIGINT NOT NULL,
        wallet_id       TEXT NOT NULL REFERENCES wallets (id),
        entry_type      TEXT NOT NULL,
        status          TEXT NOT NULL,
        amount          NUMERIC(20, 2) NOT NULL CHECK (amount > 0),
        provider        TEXT NOT NULL,
        provider_ref    TEXT,
        description     TEXT NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at    TIMESTAMPTZ,
        UNIQUE (provider, provider_ref)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_ledger_entries_user_created
        ON ledger_entries (user_id, created_at DESC, seq DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inbound_payment_requests (
        correlation_id            TEXT PRIMARY KEY,
        secondary_correlation_id  TEXT NOT NULL,
        user_id                   BIGINT NOT NULL,
        phone                     TEXT NOT NULL,
        amount                    NUMERIC(20, 2) NOT NULL CHECK (amount > 0),
        currency                  TEXT NOT NULL,
        status                    TEXT NOT NULL,
        provider_receipt          TEXT,
        result_code               BIGINT,
        result_desc               TEXT,
        raw_callback_payload      TEXT,
        ledger_entry_id           TEXT REFERENCES ledger_entries (id),
        created_at                TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at                TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at              TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_inbound_payment_requests_user
        ON inbound_payment_requests (user_id, created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS outbound_payouts (
        id                          TEXT PRIMARY KEY,
        user_id                     BIGINT NOT NULL,
        wallet_id                   TEXT NOT NULL REFERENCES wallets (id),
        phone                       TEXT NOT NULL,
        amount                      NUMERIC(20, 2) NOT NULL CHECK (amount > 0),
        fee                         NUMERIC(20, 2) NOT NULL CHECK (fee >= 0),
        net_amount                  NUMERIC(20, 2) NOT NULL CHECK (net_amount > 0),
        currency                    TEXT NOT NULL,
        status                      TEXT NOT NULL,
        conversation_id             TEXT UNIQUE,
        originator_conversation_id  TEXT,
        transaction_id              TEXT,
        result_code                 BIGINT,
        result_desc                 TEXT,
        ledger_entry_id             TEXT REFERENCES ledger_entries (id),
        dispatched_at               TIMESTAMPTZ,
        created_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at                TIMESTAMPTZ
    )
    "#,
];

/// Run every statement; each is idempotent.
pub async fn apply(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "Database schema ready");
    Ok(())
}
