//! Order creation on OpenDEX.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, Span};

use crate::asset::AssetPair;
use crate::error::OpenDexError;
use crate::metrics;
use crate::trade::filter::should_create_order;
use crate::trade::{LatestTradeInfo, OrderSubmitter};

use super::{remove_opendex_orders, trade_info_to_opendex_orders, OpenDex};

/// Replaces the agent's OpenDEX orders with ones derived from the latest
/// trade info.
pub struct OpenDexOrderSubmitter {
    opendex: Arc<dyn OpenDex>,
    pair: AssetPair,
    margin: Decimal,
    logger: Span,
}

impl OpenDexOrderSubmitter {
    /// Create a submitter for `pair` pricing `margin` away from the
    /// centralized price.
    pub fn new(opendex: Arc<dyn OpenDex>, pair: AssetPair, margin: Decimal, logger: Span) -> Self {
        Self {
            opendex,
            pair,
            margin,
            logger,
        }
    }
}

#[async_trait]
impl OrderSubmitter for OpenDexOrderSubmitter {
    async fn submit(&self, latest: LatestTradeInfo) -> Result<bool, OpenDexError> {
        remove_opendex_orders(self.opendex.as_ref(), &self.pair, &self.logger).await?;

        let info = latest.get();
        let orders = trade_info_to_opendex_orders(&info, &self.pair, self.margin);

        for order in orders {
            let (asset, spend) = order.spend();
            if !should_create_order(asset)(spend) {
                metrics::inc_orders_skipped();
                debug!(
                    parent: &self.logger,
                    side = %order.side,
                    asset = %asset,
                    spend = %spend,
                    "Order below minimum size, skipping"
                );
                continue;
            }

            let order_id = self.opendex.place_order(&order).await?;
            metrics::inc_orders_placed();
            info!(
                parent: &self.logger,
                order_id = %order_id,
                side = %order.side,
                price = %order.price,
                quantity = %order.quantity,
                "Placed order"
            );
        }

        Ok(true)
    }
}
