//! Centralized exchange venue.
//!
//! [`CentralizedExchange`] is the venue seam; [`BinanceClient`] implements it
//! over REST and websocket. A [`CexSession`] wraps a venue whose market has
//! been loaded for the configured pair and decides, from `live_cex`, whether
//! balances, hedge orders and order retraction go to the venue at all.

pub mod binance;
pub mod mock;
pub mod price;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use tracing::{info, Span};

use crate::asset::AssetPair;
use crate::config::Config;
use crate::error::CexError;
use crate::metrics;
use crate::opendex::Side;
use crate::trade::AssetBalances;

pub use binance::BinanceClient;
pub use price::ReconnectConfig;

/// Centralized exchange operations used by the agent.
#[async_trait]
pub trait CentralizedExchange: Send + Sync {
    /// Load market metadata and check that `pair` is tradable.
    async fn load_markets(&self, pair: &AssetPair) -> Result<(), CexError>;

    /// Free balances of the pair's assets.
    async fn fetch_balance(&self, pair: &AssetPair) -> Result<AssetBalances, CexError>;

    /// Cancel every open order on `pair`, returning how many were cancelled.
    async fn cancel_all_orders(&self, pair: &AssetPair) -> Result<usize, CexError>;

    /// Place a market order on `pair`, returning its venue id.
    async fn create_order(&self, pair: &AssetPair, order: &MarketOrder) -> Result<String, CexError>;

    /// Live price of one base unit in quote units.
    fn price_stream(&self, pair: &AssetPair) -> BoxStream<'static, Result<Decimal, CexError>>;
}

/// Market order on the centralized venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketOrder {
    /// Order side.
    pub side: Side,
    /// Quantity in base units.
    pub quantity: Decimal,
}

/// Initialized centralized venue session for one run.
#[derive(Clone)]
pub struct CexSession {
    exchange: Arc<dyn CentralizedExchange>,
    pair: AssetPair,
    live: bool,
}

impl CexSession {
    /// Load the pair's market and, in live mode, verify the credentials with
    /// a balance query.
    pub async fn init(
        exchange: Arc<dyn CentralizedExchange>,
        config: &Config,
        logger: &Span,
    ) -> Result<Self, CexError> {
        let pair = config.pair();
        exchange.load_markets(&pair).await?;
        info!(parent: logger, symbol = %pair.cex_symbol(), "Markets loaded");

        if config.live_cex {
            let balances = exchange.fetch_balance(&pair).await?;
            info!(
                parent: logger,
                base = %balances.base,
                quote = %balances.quote,
                "Verified account access"
            );
        }

        Ok(Self {
            exchange,
            pair,
            live: config.live_cex,
        })
    }

    /// The traded pair.
    pub fn pair(&self) -> &AssetPair {
        &self.pair
    }

    /// Whether balances and retraction go to the venue.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Current venue balances.
    pub async fn balances(&self) -> Result<AssetBalances, CexError> {
        self.exchange.fetch_balance(&self.pair).await
    }

    /// Place `order` on the venue. Unless live the order is only logged and
    /// `None` is returned.
    pub async fn create_order(&self, order: &MarketOrder, logger: &Span) -> Result<Option<String>, CexError> {
        if !self.live {
            info!(
                parent: logger,
                side = %order.side,
                quantity = %order.quantity,
                "Centralized venue is not live, not placing order"
            );
            return Ok(None);
        }

        let order_id = self.exchange.create_order(&self.pair, order).await?;
        metrics::inc_hedges_placed();
        info!(
            parent: logger,
            order_id = %order_id,
            side = %order.side,
            quantity = %order.quantity,
            "Placed order"
        );
        Ok(Some(order_id))
    }

    /// Cancel the pair's open orders. Does nothing unless live.
    pub async fn retract_orders(&self, logger: &Span) -> Result<usize, CexError> {
        if !self.live {
            info!(parent: logger, "Skipping order retraction, centralized venue is not live");
            return Ok(0);
        }

        let cancelled = self.exchange.cancel_all_orders(&self.pair).await?;
        metrics::add_orders_retracted("centralized", cancelled);
        info!(parent: logger, cancelled, "Cancelled open orders");
        Ok(cancelled)
    }

    /// Live price stream of the pair.
    pub fn price_stream(&self) -> BoxStream<'static, Result<Decimal, CexError>> {
        self.exchange.price_stream(&self.pair)
    }
}
