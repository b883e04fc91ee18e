use thiserror::Error;

use crate::error::PaymentError;

/// Failure talking to the provider. Every variant means no provider-side
/// state can be assumed.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP transport failed: {0}")]
    Transport(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Provider rejected request ({code}): {description}")]
    Rejected { code: String, description: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

impl From<ProviderError> for PaymentError {
    fn from(e: ProviderError) -> Self {
        PaymentError::ProviderUnavailable(e.to_string())
    }
}

/// Callback body that could not be understood
#[derive(Debug, Error)]
pub enum CallbackParseError {
    #[error("Invalid callback JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Callback field {0} is missing or empty")]
    MissingField(&'static str),
}
