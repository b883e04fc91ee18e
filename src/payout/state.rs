//! Payout FSM State Definitions
//!
//! ```text
//! PENDING → PROCESSING → SUCCEEDED → REVERSED
//!    ↓           ↓
//!  FAILED ←──────┘
//!    ↓
//!  PENDING (operator retry)
//! ```
//!
//! `is_transition_valid` is consulted before every status write, whether the
//! write comes from an operator or from a provider callback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outbound payout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    /// Funds reserved, provider not yet accepted the request
    Pending,
    /// Provider accepted; awaiting the result callback
    Processing,
    Succeeded,
    /// Funds released back to the wallet; retry re-enters `Pending`
    Failed,
    /// Terminal: a succeeded payout was reversed and refunded
    Reversed,
}

impl PayoutStatus {
    pub const ALL: [PayoutStatus; 5] = [
        PayoutStatus::Pending,
        PayoutStatus::Processing,
        PayoutStatus::Succeeded,
        PayoutStatus::Failed,
        PayoutStatus::Reversed,
    ];

    /// Allowed destinations from this status
    pub fn allowed_next(&self) -> &'static [PayoutStatus] {
        match self {
            PayoutStatus::Pending => &[PayoutStatus::Processing, PayoutStatus::Failed],
            PayoutStatus::Processing => &[PayoutStatus::Succeeded, PayoutStatus::Failed],
            PayoutStatus::Succeeded => &[PayoutStatus::Reversed],
            PayoutStatus::Failed => &[PayoutStatus::Pending],
            PayoutStatus::Reversed => &[],
        }
    }

    /// Check if this status has no outgoing transitions
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Check if funds are reserved in `locked_balance`
    #[inline]
    pub fn holds_reservation(&self) -> bool {
        matches!(self, PayoutStatus::Pending | PayoutStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Succeeded => "succeeded",
            PayoutStatus::Failed => "failed",
            PayoutStatus::Reversed => "reversed",
        }
    }
}

/// Pure transition check against the payout table
pub fn is_transition_valid(from: PayoutStatus, to: PayoutStatus) -> bool {
    from.allowed_next().contains(&to)
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PayoutStatus::Pending),
            "processing" => Ok(PayoutStatus::Processing),
            "succeeded" => Ok(PayoutStatus::Succeeded),
            "failed" => Ok(PayoutStatus::Failed),
            "reversed" => Ok(PayoutStatus::Reversed),
            _ => Err(format!("Invalid payout status: {}", s)),
        }
    }
}
