//! Error taxonomy for bridge operations.
//!
//! Two layers: [`GatewayError`] is the typed failure of one terminal call,
//! [`BridgeError`] is what an operation returns to the request layer. Every
//! operation converts internal faults into a structured [`BridgeError`]
//! instead of letting them escape; a failed request never takes the bridge
//! down with it.

use thiserror::Error;

use crate::broker::gateway::GatewayError;

/// Structured failure of one bridge operation.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The terminal is unreachable or trading is disallowed. Fatal to every
    /// operation until a reconnect succeeds.
    #[error("terminal connection unavailable: {message}")]
    Connection {
        /// What failed during connect or the liveness probe.
        message: String,
    },

    /// No symbol variant resolved to a tradable instrument.
    #[error("symbol {symbol} not found (tried variants: {attempted:?})")]
    SymbolNotFound {
        /// The caller-supplied symbol.
        symbol: String,
        /// Every variant probed, in probe order.
        attempted: Vec<String>,
    },

    /// The intent is malformed; rejected before any broker call.
    #[error("invalid trade intent: {message}")]
    InvalidIntent {
        /// What was wrong with the request.
        message: String,
    },

    /// The terminal returned a non-success retcode for a submission.
    #[error("order rejected by broker (retcode {retcode}): {message}")]
    BrokerRejected {
        /// The broker's numeric return code.
        retcode: u32,
        /// The broker's stated reason, verbatim.
        message: String,
    },

    /// A verify-after-create poll timed out, or a close/modify target does
    /// not exist.
    #[error("position {ticket} not found")]
    PositionNotFound {
        /// The ticket that never appeared (or was already gone).
        ticket: u64,
    },

    /// Unexpected internal fault, converted at the operation boundary.
    #[error("internal bridge error: {message}")]
    Internal {
        /// Fault description.
        message: String,
    },
}

impl BridgeError {
    /// Stable machine-readable kind for the request layer.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::SymbolNotFound { .. } => "SYMBOL_NOT_FOUND",
            Self::InvalidIntent { .. } => "INVALID_INTENT",
            Self::BrokerRejected { .. } => "BROKER_REJECTED",
            Self::PositionNotFound { .. } => "POSITION_NOT_FOUND",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<GatewayError> for BridgeError {
    fn from(err: GatewayError) -> Self {
        Self::Connection {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        let err = BridgeError::SymbolNotFound {
            symbol: "eurusd".to_string(),
            attempted: vec!["eurusd".to_string(), "eurusdm".to_string()],
        };
        assert_eq!(err.kind(), "SYMBOL_NOT_FOUND");

        let err = BridgeError::BrokerRejected {
            retcode: 10019,
            message: "No money".to_string(),
        };
        assert_eq!(err.kind(), "BROKER_REJECTED");
        assert!(err.to_string().contains("10019"));
        assert!(err.to_string().contains("No money"));
    }

    #[test]
    fn gateway_errors_map_to_connection() {
        let err: BridgeError = GatewayError::Unavailable {
            message: "terminal not running".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "CONNECTION_ERROR");
    }
}
