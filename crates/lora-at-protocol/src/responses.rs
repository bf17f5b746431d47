//! Decoded results of the network-level operations.
//!
//! The vendor modules turn raw reply tokens into these types; the driver only
//! ever sees outcomes, never vendor literals.

use crate::error::{ProtocolError, ProtocolResult};

/// Result of a join attempt.
///
/// A refused join is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The network accepted the join.
    Joined,
    /// The module or the network refused the join.
    Refused {
        /// Reply line explaining the refusal.
        reason: String,
    },
}

impl JoinOutcome {
    /// Check if the join succeeded.
    pub fn is_joined(&self) -> bool {
        matches!(self, JoinOutcome::Joined)
    }

    /// Get the refusal reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            JoinOutcome::Joined => None,
            JoinOutcome::Refused { reason } => Some(reason),
        }
    }
}

/// Result of an uplink transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The uplink went out. Any downlink lines received in the same exchange
    /// are included, still in the dialect's payload encoding.
    Sent {
        /// Downlink payload lines.
        downlinks: Vec<String>,
    },
    /// The module reported an error.
    Rejected {
        /// The error token.
        reason: String,
    },
}

impl SendOutcome {
    /// Check if the uplink went out.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    /// Get the downlink lines if the uplink went out.
    pub fn downlinks(&self) -> Option<&[String]> {
        match self {
            SendOutcome::Sent { downlinks } => Some(downlinks),
            SendOutcome::Rejected { .. } => None,
        }
    }
}

/// Factory identity of a radio module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Full EUI as printed by the module.
    pub eui: String,
    /// Trailing characters of the EUI, used as a display name.
    pub short: String,
}

impl DeviceIdentity {
    /// Build an identity from an EUI, keeping `short_len` trailing characters
    /// as the short form.
    pub fn new(eui: impl Into<String>, short_len: usize) -> Self {
        let eui = eui.into();
        let skip = eui.chars().count().saturating_sub(short_len);
        let short = eui.chars().skip(skip).collect();
        DeviceIdentity { eui, short }
    }

    /// Build an identity from the reply to an identity query.
    pub fn from_reply(
        command: &'static str,
        reply: &[String],
        short_len: usize,
    ) -> ProtocolResult<DeviceIdentity> {
        let eui = reply
            .first()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .ok_or(ProtocolError::EmptyReply(command))?;
        Ok(DeviceIdentity::new(eui, short_len))
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.eui, self.short)
    }
}
