//! Centralized orders for OpenDEX fills.
//!
//! Every fill of an OpenDEX order is offset on the centralized venue with a
//! market order of the same base quantity in the opposite direction, which
//! locks in the margin the OpenDEX order was priced at.

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, Span};

use crate::cex::{CexSession, MarketOrder};
use crate::error::{OpenDexError, TradeError};
use crate::metrics;
use crate::opendex::{OpenDexFill, Side};

use super::filter::should_create_order;

/// Centralized order offsetting `fill`.
pub fn centralized_order(fill: &OpenDexFill) -> MarketOrder {
    let side = match fill.side {
        Side::Sell => Side::Buy,
        Side::Buy => Side::Sell,
    };
    MarketOrder {
        side,
        quantity: fill.quantity,
    }
}

/// Place a centralized order for every fill.
///
/// Yields the venue id of each placed order, or `None` when the session is
/// not live. Fills below the base asset's minimum size are skipped. The first
/// error ends the stream.
pub fn centralized_orders(
    fills: BoxStream<'static, Result<OpenDexFill, OpenDexError>>,
    session: Arc<CexSession>,
    logger: Span,
) -> BoxStream<'static, Result<Option<String>, TradeError>> {
    Box::pin(try_stream! {
        let mut fills = fills;
        let accept = should_create_order(session.pair().base);

        while let Some(fill) = fills.next().await {
            let fill = fill.map_err(TradeError::Fills)?;
            metrics::inc_fills();
            info!(
                parent: &logger,
                order_id = %fill.order_id,
                side = %fill.side,
                price = %fill.price,
                quantity = %fill.quantity,
                "OpenDEX order filled"
            );

            let order = centralized_order(&fill);
            if !accept(order.quantity) {
                metrics::inc_orders_skipped();
                debug!(
                    parent: &logger,
                    quantity = %order.quantity,
                    "Fill below minimum size, not offsetting"
                );
                continue;
            }

            let placed = session
                .create_order(&order, &logger)
                .await
                .map_err(TradeError::CentralizedOrder)?;
            yield placed;
        }
    })
}
