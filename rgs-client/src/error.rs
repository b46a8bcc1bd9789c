//! Error Taxonomy
//!
//! One error type for every layer, classified by how the caller must react:
//!
//! | Class | Variants | Reaction |
//! |-------|----------|----------|
//! | transient | `Network` | retry reads; mutating calls only with their idempotency key |
//! | terminal | `SessionNotFound`, `SessionExpired` | re-create the session |
//! | user-correctable | `InvalidWager`, `InsufficientBalance` | show verbatim |
//! | protocol violation | `RoundInProgress`, `OutOfOrderAcknowledgement`, `EventsPending` | abort the round, log |
//! | trust-critical | `FairnessVerificationMismatch` | surface to the player |

use serde::{Deserialize, Serialize};

use crate::core::money::MoneyError;
use crate::core::rng::InvalidSeedKey;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RgsError>;

/// Stake style wire error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Invalid request or wager.
    #[serde(rename = "ERR_VAL")]
    Validation,
    /// Insufficient player balance.
    #[serde(rename = "ERR_IPB")]
    InsufficientBalance,
    /// Invalid (unknown) session.
    #[serde(rename = "ERR_IS")]
    InvalidSession,
    /// Session token expired.
    #[serde(rename = "ERR_ATE")]
    SessionExpired,
    /// Bet or bonus not found.
    #[serde(rename = "ERR_BNF")]
    NotFound,
    /// A round is still active on the session.
    #[serde(rename = "ERR_ROUND_ACTIVE")]
    RoundActive,
    /// Event acknowledged out of order.
    #[serde(rename = "ERR_EVENT_ORDER")]
    EventOrder,
    /// Round ended with events unacknowledged.
    #[serde(rename = "ERR_EVENTS_PENDING")]
    EventsPending,
    /// General server error.
    #[serde(rename = "ERR_GEN")]
    General,
    /// Planned maintenance.
    #[serde(rename = "ERR_MAINTENANCE")]
    Maintenance,
}

impl ErrorCode {
    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "ERR_VAL",
            ErrorCode::InsufficientBalance => "ERR_IPB",
            ErrorCode::InvalidSession => "ERR_IS",
            ErrorCode::SessionExpired => "ERR_ATE",
            ErrorCode::NotFound => "ERR_BNF",
            ErrorCode::RoundActive => "ERR_ROUND_ACTIVE",
            ErrorCode::EventOrder => "ERR_EVENT_ORDER",
            ErrorCode::EventsPending => "ERR_EVENTS_PENDING",
            ErrorCode::General => "ERR_GEN",
            ErrorCode::Maintenance => "ERR_MAINTENANCE",
        }
    }

    /// HTTP status the code is served with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::InvalidSession | ErrorCode::SessionExpired => 401,
            ErrorCode::NotFound => 404,
            ErrorCode::RoundActive | ErrorCode::EventOrder | ErrorCode::EventsPending => 409,
            ErrorCode::General => 500,
            ErrorCode::Maintenance => 503,
            _ => 400,
        }
    }
}

/// Client and server errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RgsError {
    /// Transport failure or timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// Session could not be created.
    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    /// Session unknown to the server.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session expired server-side.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Wager outside the bet configuration.
    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    /// Balance does not cover the debit.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// A round is already in flight for this session.
    #[error("Round in progress: {0}")]
    RoundInProgress(String),

    /// Event index acknowledged out of order.
    #[error("Out of order acknowledgement: {0}")]
    OutOfOrderAcknowledgement(String),

    /// Round ended before every event was acknowledged.
    #[error("Events pending: {0}")]
    EventsPending(String),

    /// Revealed data does not match what was committed or served.
    #[error("Fairness verification mismatch: {0}")]
    FairnessVerificationMismatch(String),

    /// Unknown bonus id.
    #[error("Bonus not found: {0}")]
    BonusNotFound(String),

    /// Request rejected for another reason.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Server-side failure.
    #[error("Server error {code}: {message}")]
    Server {
        /// Wire code.
        code: String,
        /// Server message.
        message: String,
    },

    /// Response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Client misconfiguration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RgsError {
    /// Map a wire status to an error.
    pub fn from_status(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match serde_json::from_value::<ErrorCode>(serde_json::Value::String(code.to_string())) {
            Ok(ErrorCode::Validation) => RgsError::InvalidWager(message),
            Ok(ErrorCode::InsufficientBalance) => RgsError::InsufficientBalance(message),
            Ok(ErrorCode::InvalidSession) => RgsError::SessionNotFound(message),
            Ok(ErrorCode::SessionExpired) => RgsError::SessionExpired(message),
            Ok(ErrorCode::NotFound) => RgsError::BonusNotFound(message),
            Ok(ErrorCode::RoundActive) => RgsError::RoundInProgress(message),
            Ok(ErrorCode::EventOrder) => RgsError::OutOfOrderAcknowledgement(message),
            Ok(ErrorCode::EventsPending) => RgsError::EventsPending(message),
            _ => RgsError::Server { code: code.to_string(), message },
        }
    }

    /// Wire code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RgsError::InvalidWager(_) | RgsError::InvalidRequest(_) => ErrorCode::Validation,
            RgsError::InsufficientBalance(_) => ErrorCode::InsufficientBalance,
            RgsError::SessionNotFound(_) => ErrorCode::InvalidSession,
            RgsError::SessionExpired(_) => ErrorCode::SessionExpired,
            RgsError::BonusNotFound(_) => ErrorCode::NotFound,
            RgsError::RoundInProgress(_) => ErrorCode::RoundActive,
            RgsError::OutOfOrderAcknowledgement(_) => ErrorCode::EventOrder,
            RgsError::EventsPending(_) => ErrorCode::EventsPending,
            RgsError::Server { code, .. } if code == ErrorCode::Maintenance.as_str() => ErrorCode::Maintenance,
            _ => ErrorCode::General,
        }
    }

    /// Message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            RgsError::Network(m)
            | RgsError::SessionCreation(m)
            | RgsError::SessionNotFound(m)
            | RgsError::SessionExpired(m)
            | RgsError::InvalidWager(m)
            | RgsError::InsufficientBalance(m)
            | RgsError::RoundInProgress(m)
            | RgsError::OutOfOrderAcknowledgement(m)
            | RgsError::EventsPending(m)
            | RgsError::FairnessVerificationMismatch(m)
            | RgsError::BonusNotFound(m)
            | RgsError::InvalidRequest(m)
            | RgsError::Protocol(m)
            | RgsError::Config(m) => m.clone(),
            RgsError::Server { message, .. } => message.clone(),
        }
    }

    /// Transient; safe to retry for reads or keyed mutations.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RgsError::Network(_))
    }

    /// The session is gone and must be re-created.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RgsError::SessionNotFound(_) | RgsError::SessionExpired(_))
    }

    /// The player can fix this (lower the bet, top up).
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, RgsError::InvalidWager(_) | RgsError::InsufficientBalance(_))
    }

    /// Client bug: abort the round, never retry blindly.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            RgsError::RoundInProgress(_) | RgsError::OutOfOrderAcknowledgement(_) | RgsError::EventsPending(_)
        )
    }

    /// Must be shown to the player, not only logged.
    pub fn is_trust_critical(&self) -> bool {
        matches!(self, RgsError::FairnessVerificationMismatch(_))
    }
}

impl From<reqwest::Error> for RgsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RgsError::Protocol(err.to_string())
        } else {
            RgsError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for RgsError {
    fn from(err: url::ParseError) -> Self {
        RgsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RgsError {
    fn from(err: serde_json::Error) -> Self {
        RgsError::Protocol(err.to_string())
    }
}

impl From<MoneyError> for RgsError {
    fn from(err: MoneyError) -> Self {
        RgsError::InvalidWager(err.to_string())
    }
}

impl From<InvalidSeedKey> for RgsError {
    fn from(err: InvalidSeedKey) -> Self {
        RgsError::Server { code: ErrorCode::General.as_str().to_string(), message: err.to_string() }
    }
}

impl From<tokio::time::error::Elapsed> for RgsError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        RgsError::Network(format!("request timed out ({})", err))
    }
}

// =============================================================================
// TESTS
// =============================================================================
