//! OpenDEX venue.
//!
//! [`OpenDex`] is the venue seam. Orders are never tracked locally: stale
//! orders are found by querying the venue for the pair and removed one by one.
//! [`RetryingOpenDex`] adds retries for transient RPC failures on top of any
//! venue.

pub mod create;
pub mod orders;
pub mod retry;
pub mod simulated;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use rust_decimal::Decimal;
use tracing::{debug, info, Span};

use crate::asset::AssetPair;
use crate::error::OpenDexError;
use crate::metrics;
use crate::trade::OpenDexAssets;

pub use create::OpenDexOrderSubmitter;
pub use orders::{trade_info_to_opendex_orders, OpenDexOrder, OpenDexOrders, Side};
pub use retry::{RetryPolicy, RetryingOpenDex};
pub use simulated::SimulatedOpenDex;

/// An order owned by this agent that rests on the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnOrder {
    /// Venue order id.
    pub id: String,
    /// Traded pair.
    pub pair: AssetPair,
    /// Order side.
    pub side: Side,
    /// Limit price.
    pub price: Decimal,
    /// Remaining base quantity.
    pub quantity: Decimal,
}

/// A (partial) fill of one of the agent's orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDexFill {
    /// Venue id of the filled order.
    pub order_id: String,
    /// Traded pair.
    pub pair: AssetPair,
    /// Side of the filled order.
    pub side: Side,
    /// Execution price.
    pub price: Decimal,
    /// Filled base quantity.
    pub quantity: Decimal,
}

/// OpenDEX operations used by the agent.
#[async_trait]
pub trait OpenDex: Send + Sync {
    /// Balances and trading limits of the pair's assets.
    async fn assets(&self, pair: &AssetPair) -> Result<OpenDexAssets, OpenDexError>;

    /// Own orders resting on `pair`.
    async fn open_orders(&self, pair: &AssetPair) -> Result<Vec<OwnOrder>, OpenDexError>;

    /// Place a limit order, returning its venue id.
    async fn place_order(&self, order: &OpenDexOrder) -> Result<String, OpenDexError>;

    /// Remove an order by id.
    async fn remove_order(&self, order_id: &str) -> Result<(), OpenDexError>;

    /// Fills of own orders on `pair`, as they happen.
    ///
    /// Venues that do not report fills never yield.
    fn fills(&self, _pair: &AssetPair) -> BoxStream<'static, Result<OpenDexFill, OpenDexError>> {
        stream::pending::<Result<OpenDexFill, OpenDexError>>().boxed()
    }
}

/// Remove every own order on `pair`.
///
/// Orders that disappear between the query and their removal are counted as
/// removed, so calling this twice in a row is harmless.
pub async fn remove_opendex_orders(
    opendex: &dyn OpenDex,
    pair: &AssetPair,
    logger: &Span,
) -> Result<usize, OpenDexError> {
    let orders = opendex.open_orders(pair).await?;

    for order in &orders {
        match opendex.remove_order(&order.id).await {
            Ok(()) => debug!(parent: logger, order_id = %order.id, "Removed order"),
            Err(OpenDexError::UnknownOrder { order_id }) => {
                debug!(parent: logger, order_id = %order_id, "Order already gone")
            }
            Err(e) => return Err(e),
        }
    }

    if !orders.is_empty() {
        metrics::add_orders_retracted("opendex", orders.len());
        info!(parent: logger, removed = orders.len(), pair = %pair, "Removed OpenDEX orders");
    }
    Ok(orders.len())
}
