//! Reply-completion policies.
//!
//! Commands on the same serial line legitimately produce different numbers of
//! reply lines. Each command kind maps to a [`WaitPolicy`] that decides when the
//! tokens collected since the command was written form a complete reply.

use std::time::Duration;

/// Condition a reply buffer must satisfy before the waiting command resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCondition {
    /// Any token at all completes the reply.
    AnyResponse,
    /// Two-phase reply: one token is expected, two if the first token equals
    /// `ack`. The buffer must hold *exactly* that many tokens.
    LengthMatches {
        /// Acknowledgement literal announcing a delayed second line.
        ack: &'static str,
    },
    /// The reply is complete once any token equals one of the terminal literals.
    UntilTerminal {
        /// Final-status literals (e.g. `OK`, `ERROR`).
        terminals: &'static [&'static str],
    },
    /// Fire-and-forget: resolves without looking at the buffer.
    AlwaysTrue,
}

impl ReplyCondition {
    /// Number of tokens a [`ReplyCondition::LengthMatches`] reply must hold,
    /// given what has arrived so far.
    pub fn expected_len(ack: &str, tokens: &[String]) -> usize {
        match tokens.first() {
            Some(first) if first == ack => 2,
            _ => 1,
        }
    }

    /// Check whether `tokens` form a complete reply.
    pub fn is_satisfied(&self, tokens: &[String]) -> bool {
        match self {
            ReplyCondition::AnyResponse => !tokens.is_empty(),
            ReplyCondition::LengthMatches { ack } => {
                tokens.len() == Self::expected_len(ack, tokens)
            }
            ReplyCondition::UntilTerminal { terminals } => tokens
                .iter()
                .any(|t| terminals.iter().any(|term| t == term)),
            ReplyCondition::AlwaysTrue => true,
        }
    }

    /// Whether the buffer has to be inspected at all.
    pub fn needs_reply(&self) -> bool {
        !matches!(self, ReplyCondition::AlwaysTrue)
    }
}

/// A reply condition together with its polling cadence and time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// When the reply is complete.
    pub condition: ReplyCondition,
    /// How often the reply buffer is checked.
    pub poll_interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl WaitPolicy {
    /// Create a policy.
    pub const fn new(condition: ReplyCondition, poll_interval: Duration, timeout: Duration) -> Self {
        WaitPolicy {
            condition,
            poll_interval,
            timeout,
        }
    }

    /// Policy that resolves immediately.
    pub const fn immediate() -> Self {
        WaitPolicy::new(ReplyCondition::AlwaysTrue, Duration::ZERO, Duration::ZERO)
    }
}
