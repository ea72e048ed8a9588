//! Error kinds surfaced by the signal pipeline.
//!
//! A signal that was never meant as a trade is not an error; see
//! [`crate::trading::ParseOutcome::Rejected`].

use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum TradeError {
    /// A price token on the given 1-based line is not a finite number.
    #[error("line {line}: '{token}' is not a valid number")]
    MalformedNumber { line: usize, token: String },

    /// The signal ended before a required line.
    #[error("signal has {found} line(s), at least {required} are required")]
    InsufficientLines { found: usize, required: usize },

    /// Stop loss and entry are less than half a pip apart.
    #[error("stop loss is zero pips away from entry")]
    ZeroStopDistance,

    /// Sizing was attempted before the market entry was priced.
    #[error("entry price has not been resolved")]
    UnresolvedEntry,

    #[error("account balance must be positive, got {0}")]
    NonPositiveBalance(f64),

    /// Query issued on a session that has not finished its handshake.
    #[error("session is not ready (state: {state})")]
    NotReady { state: SessionState },

    /// Handshake step invoked out of order.
    #[error("cannot {operation} while session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    /// Failure reported by the trading platform.
    #[error("{operation} failed: {source:#}")]
    Session {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TradeError {
    /// Wrap a platform failure with the operation that produced it.
    pub fn session(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Session { operation, source }
    }

    /// True when the signal itself was malformed, as opposed to the account,
    /// the platform or the caller's cancellation.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedNumber { .. } | Self::InsufficientLines { .. } | Self::ZeroStopDistance
        )
    }
}

/// A specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, TradeError>;
