//! In-memory OpenDEX venue for paper trading.
//!
//! Orders rest until removed or until [`SimulatedOpenDex::fill`] matches
//! them. Balances are fixed at construction and every asset can receive
//! without limit.

use std::sync::atomic::{AtomicU64, Ordering};

use async_stream::stream;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::asset::AssetPair;
use crate::config::Config;
use crate::error::OpenDexError;
use crate::trade::{AssetBalances, ChannelBalance, OpenDexAssets};

use super::{OpenDex, OpenDexFill, OpenDexOrder, OwnOrder};

/// Fills buffered per subscriber before the oldest are dropped.
const FILL_BUFFER: usize = 64;

/// Paper OpenDEX venue.
#[derive(Debug)]
pub struct SimulatedOpenDex {
    pair: AssetPair,
    balances: AssetBalances,
    orders: DashMap<String, OwnOrder>,
    next_id: AtomicU64,
    fills: broadcast::Sender<OpenDexFill>,
}

impl SimulatedOpenDex {
    /// Venue holding `balances` of `pair`.
    pub fn new(pair: AssetPair, balances: AssetBalances) -> Self {
        Self {
            pair,
            balances,
            orders: DashMap::new(),
            next_id: AtomicU64::new(1),
            fills: broadcast::channel(FILL_BUFFER).0,
        }
    }

    /// Venue seeded from the configured OpenDEX test balances.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.pair(),
            AssetBalances {
                base: config.test_opendex_baseasset_balance,
                quote: config.test_opendex_quoteasset_balance,
            },
        )
    }

    /// Number of resting orders across all pairs.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Match up to `quantity` of a resting order at its limit price.
    ///
    /// A fully matched order leaves the book. The fill is reported to every
    /// [`OpenDex::fills`] subscriber.
    pub fn fill(&self, order_id: &str, quantity: Decimal) -> Result<OpenDexFill, OpenDexError> {
        let unknown = || OpenDexError::UnknownOrder {
            order_id: order_id.to_string(),
        };

        let fill = {
            let mut order = self.orders.get_mut(order_id).ok_or_else(unknown)?;
            let matched = quantity.min(order.quantity);
            if matched <= Decimal::ZERO {
                return Err(OpenDexError::OrderRejected {
                    reason: format!("invalid fill quantity {}", quantity),
                });
            }
            order.quantity -= matched;
            OpenDexFill {
                order_id: order.id.clone(),
                pair: order.pair,
                side: order.side,
                price: order.price,
                quantity: matched,
            }
        };

        self.orders.remove_if(order_id, |_, order| order.quantity.is_zero());
        debug!(order_id = %order_id, quantity = %fill.quantity, "Simulated order filled");
        // No subscribers is fine.
        let _ = self.fills.send(fill.clone());
        Ok(fill)
    }
}

#[async_trait]
impl OpenDex for SimulatedOpenDex {
    async fn assets(&self, pair: &AssetPair) -> Result<OpenDexAssets, OpenDexError> {
        if *pair != self.pair {
            return Err(OpenDexError::Rpc(format!("pair {} is not active", pair)));
        }
        Ok(OpenDexAssets {
            base: ChannelBalance::unbounded(self.balances.base),
            quote: ChannelBalance::unbounded(self.balances.quote),
        })
    }

    async fn open_orders(&self, pair: &AssetPair) -> Result<Vec<OwnOrder>, OpenDexError> {
        Ok(self
            .orders
            .iter()
            .filter(|entry| entry.pair == *pair)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn place_order(&self, order: &OpenDexOrder) -> Result<String, OpenDexError> {
        if order.quantity <= Decimal::ZERO || order.price <= Decimal::ZERO {
            return Err(OpenDexError::OrderRejected {
                reason: format!("invalid quantity {} at price {}", order.quantity, order.price),
            });
        }

        let id = format!("sim-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.orders.insert(
            id.clone(),
            OwnOrder {
                id: id.clone(),
                pair: order.pair,
                side: order.side,
                price: order.price,
                quantity: order.quantity,
            },
        );
        debug!(order_id = %id, "Simulated order resting");
        Ok(id)
    }

    async fn remove_order(&self, order_id: &str) -> Result<(), OpenDexError> {
        self.orders
            .remove(order_id)
            .map(|_| ())
            .ok_or_else(|| OpenDexError::UnknownOrder {
                order_id: order_id.to_string(),
            })
    }

    fn fills(&self, pair: &AssetPair) -> BoxStream<'static, Result<OpenDexFill, OpenDexError>> {
        let mut receiver = self.fills.subscribe();
        let pair = *pair;
        Box::pin(stream! {
            loop {
                match receiver.recv().await {
                    Ok(fill) if fill.pair == pair => yield Ok(fill),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Fill subscriber lagged, fills lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
