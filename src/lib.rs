//! Arbitrage agent between a centralized exchange and OpenDEX.
//!
//! The agent quotes both sides of a pair on OpenDEX, a configured margin
//! away from the centralized venue's live price, sized so that any fill can
//! be hedged on the centralized venue. Each fill is then offset there with a
//! market order in the opposite direction.
//!
//! # Strategy
//!
//! ```text
//! CEX price:    100
//! Margin:       2%
//! ──────────────────────────
//! OpenDEX sell: 102   (base balance, hedged by buying back at ~100)
//! OpenDEX buy:   98   (quote balance, hedged by selling at ~100)
//! ```
//!
//! # Modules
//!
//! - [`arby`]: Run lifecycle (init, trading, cleanup)
//! - [`trade`]: Trade-completion cycle, order sizing, filtering and fill offsetting
//! - [`cex`]: Centralized exchange session and Binance client
//! - [`opendex`]: OpenDEX orders, retries and the paper venue
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`logger`]: Log sinks
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod arby;
pub mod asset;
pub mod cex;
pub mod config;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod opendex;
pub mod trade;
pub mod utils;

pub use arby::{Arby, DefaultVenues, RunSummary, TradingOutcome, Venues};
pub use config::Config;
pub use error::{ArbyError, Result};
