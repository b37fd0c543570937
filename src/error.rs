//! Unified error types for the arbitrage agent.

use thiserror::Error;

/// Top-level error returned by an orchestrator run.
///
/// Only initialization and cleanup failures reach the caller; trading-phase
/// failures are recovered by running cleanup.
#[derive(Error, Debug)]
pub enum ArbyError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The centralized venue session could not be established.
    #[error("initialization failed: {0}")]
    Init(#[source] CexError),

    /// Retracting orders after trading failed.
    #[error("cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Centralized exchange errors.
#[derive(Error, Debug)]
pub enum CexError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The venue answered with an error payload.
    #[error("venue error {code}: {message}")]
    Api {
        /// Venue error code.
        code: i64,
        /// Venue error message.
        message: String,
    },

    /// The configured pair is not listed or not trading.
    #[error("market {symbol} unavailable: {reason}")]
    MarketUnavailable {
        /// Venue symbol, e.g. `ETHBTC`.
        symbol: String,
        /// Why the market was rejected.
        reason: String,
    },

    /// Authenticated call attempted without API credentials.
    #[error("missing API credentials for authenticated request")]
    MissingCredentials,

    /// Response could not be parsed.
    #[error("failed to parse venue response: {0}")]
    Parse(String),

    /// The price feed gave up reconnecting.
    #[error("price feed closed after {attempts} failed reconnects")]
    FeedClosed {
        /// Consecutive failed attempts.
        attempts: u32,
    },
}

/// Decentralized exchange (OpenDEX) errors.
#[derive(Error, Debug)]
pub enum OpenDexError {
    /// RPC transport or daemon failure.
    #[error("rpc failure: {0}")]
    Rpc(String),

    /// Order rejected by the venue.
    #[error("order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason from the venue.
        reason: String,
    },

    /// Order id not known to the venue.
    #[error("unknown order {order_id}")]
    UnknownOrder {
        /// Order id that was not found.
        order_id: String,
    },
}

/// Failures that end the trading phase.
#[derive(Error, Debug)]
pub enum TradeError {
    /// OpenDEX balance source failed.
    #[error("opendex assets unavailable: {0}")]
    OpenDexAssets(#[source] OpenDexError),

    /// Centralized balance source failed.
    #[error("centralized assets unavailable: {0}")]
    CentralizedAssets(#[source] CexError),

    /// Centralized price source failed.
    #[error("centralized price unavailable: {0}")]
    Price(#[source] CexError),

    /// Creating or cancelling OpenDEX orders failed.
    #[error("order creation failed: {0}")]
    OrderCreation(#[source] OpenDexError),

    /// OpenDEX fill notifications failed.
    #[error("opendex fills unavailable: {0}")]
    Fills(#[source] OpenDexError),

    /// Placing the centralized order for a fill failed.
    #[error("centralized order failed: {0}")]
    CentralizedOrder(#[source] CexError),
}

/// Failures while retracting orders after trading.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// Removing OpenDEX orders failed.
    #[error("failed to remove opendex orders: {0}")]
    OpenDex(#[source] OpenDexError),

    /// Cancelling centralized orders failed.
    #[error("failed to cancel centralized orders: {0}")]
    Centralized(#[source] CexError),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ArbyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_error_message_includes_venue_cause() {
        let err = ArbyError::from(CleanupError::OpenDex(OpenDexError::Rpc(
            "connection refused".to_string(),
        )));
        assert_eq!(
            err.to_string(),
            "cleanup failed: failed to remove opendex orders: rpc failure: connection refused"
        );
    }

    #[test]
    fn api_error_formats_code() {
        let err = CexError::Api {
            code: -2015,
            message: "Invalid API-key".to_string(),
        };
        assert_eq!(err.to_string(), "venue error -2015: Invalid API-key");
    }
}
