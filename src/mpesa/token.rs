//! Access token cache
//!
//! Populated on first use, re-read under the shared lock, refreshed under
//! the exclusive lock after a second expiry check so racing callers collapse
//! into one provider round trip.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use super::error::ProviderError;

/// A freshly issued credential and the lifetime the provider stated for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub expires_in: Duration,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<IssuedToken, ProviderError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct AccessTokenCache {
    slot: RwLock<Option<CachedToken>>,
    safety_margin: Duration,
}

impl AccessTokenCache {
    pub fn new(safety_margin: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            safety_margin,
        }
    }

    /// Cached token, or a new one from `source` when absent or expired.
    pub async fn get<S>(&self, source: &S) -> Result<String, ProviderError>
    where
        S: TokenSource + ?Sized,
    {
        {
            let slot = self.slot.read().await;
            if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Instant::now())) {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.slot.write().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let issued = source.fetch().await?;
        let lifetime = issued.expires_in.saturating_sub(self.safety_margin);
        debug!(lifetime_secs = lifetime.as_secs(), "Provider access token refreshed");
        *slot = Some(CachedToken {
            value: issued.value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(issued.value)
    }

    /// Drop the cached token; the next `get` refreshes.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}
