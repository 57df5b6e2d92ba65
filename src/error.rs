//! Error taxonomy shared across the intake, delivery, and relay layers.
//!
//! Configuration problems (`ConfigError`, `ResolveError`) are fatal to the
//! operation that hit them; validation problems are always surfaced back to
//! the submitter; delivery failures are classified so the resolver can decide
//! whether to try the next strategy. Anything else is caught at the handler
//! boundary and turned into a generic user-visible failure.

pub use crate::config::ConfigError;
pub use crate::resolver::ResolveError;

/// Malformed user-submitted input. Always recoverable: surfaced to the
/// submitter, never propagated further.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// Message shown to the submitter; names the offending field.
    pub fn user_message(&self) -> String {
        format!("The {} you provided is invalid: {}.", self.field, self.reason)
    }
}

/// How a failed delivery attempt is classified, by inspecting the remote
/// error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Blocked, or direct messages closed. The next strategy may still work.
    RecipientUnreachable,
    /// The target is not a messageable account. Fatal; no further strategies.
    InvalidRecipient,
    /// Anything else. The next strategy is still worth trying.
    Unknown,
}

impl Classification {
    /// Actionable wording when known, generic otherwise.
    pub fn user_explanation(self) -> &'static str {
        match self {
            Self::RecipientUnreachable => {
                "their direct messages are closed or the bot is blocked"
            }
            Self::InvalidRecipient => "the configured operator account cannot receive messages",
            Self::Unknown => "delivery failed",
        }
    }
}
