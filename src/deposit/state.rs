//! Deposit request status
//!
//! `pending → completed` or `pending → failed`, exactly once. Terminal
//! records are immutable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Completed,
    Failed,
}

impl DepositStatus {
    pub const ALL: [DepositStatus; 3] = [
        DepositStatus::Pending,
        DepositStatus::Completed,
        DepositStatus::Failed,
    ];

    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Completed => "completed",
            DepositStatus::Failed => "failed",
        }
    }
}

/// Only a pending request may move, and only to a terminal status.
pub fn is_transition_valid(from: DepositStatus, to: DepositStatus) -> bool {
    from == DepositStatus::Pending && to.is_terminal()
}

/// The status a request must hold to move to `to`. Stores gate their
/// conditional writes on it.
pub fn required_source(to: DepositStatus) -> PaymentResult<DepositStatus> {
    DepositStatus::ALL
        .into_iter()
        .find(|from| is_transition_valid(*from, to))
        .ok_or_else(|| PaymentError::invalid_transition("any", to))
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(DepositStatus::Pending),
            "completed" => Ok(DepositStatus::Completed),
            "failed" => Ok(DepositStatus::Failed),
            _ => Err(format!("Invalid deposit status: {}", s)),
        }
    }
}
