//! Trading phase.
//!
//! - [`info`]: balances, prices and the order sizes derived from them
//! - [`filter`]: minimum order sizes
//! - [`sources`]: balance and price streams
//! - [`cycle`]: the trade-completion cycle
//! - [`hedge`]: centralized orders for OpenDEX fills
//! - [`cleanup`]: order retraction after trading

pub mod cleanup;
pub mod cycle;
pub mod filter;
pub mod hedge;
pub mod info;
pub mod sources;

pub use cleanup::cleanup;
pub use cycle::{completion_cycle, OrderSubmitter, TradeSources};
pub use filter::{minimum_order_size, should_create_order};
pub use hedge::centralized_orders;
pub use info::{AssetBalances, ChannelBalance, LatestTradeInfo, OpenDexAssets, TradeInfo};
pub use sources::trade_sources;
