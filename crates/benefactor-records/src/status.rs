//! Payment lifecycle shared by donations and orders.
//!
//! ```text
//!             ┌────────────► completed
//!   pending ──┤
//!             └────────────► cancelled
//! ```
//!
//! Both outcomes are terminal.

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};

/// Payment status of a donation or order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether moving from `self` to `next` is a legal step
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Cancelled)
        )
    }

    /// Validate a transition.
    ///
    /// Returns `Ok(true)` when the status changes, `Ok(false)` when `next`
    /// equals the current status (a redelivered webhook), and an error for
    /// anything else.
    pub fn transition(self, next: Self) -> Result<bool> {
        if self == next {
            return Ok(false);
        }
        if self.can_transition_to(next) {
            Ok(true)
        } else {
            Err(RecordError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(RecordError::Validation(format!("unknown status '{other}'"))),
        }
    }
}
