//! Mock centralized exchange for testing.
//!
//! This module provides a venue that can be driven from tests without
//! making network requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::BoxStream;
use rust_decimal::Decimal;

use crate::asset::AssetPair;
use crate::error::CexError;
use crate::trade::AssetBalances;

use super::{CentralizedExchange, MarketOrder};

/// Configuration for mock exchange behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Balances to return.
    pub balances: AssetBalances,
    /// Prices emitted by the price stream, in order.
    pub prices: Vec<Decimal>,
    /// Delay before each price in milliseconds.
    pub price_interval_ms: u64,
    /// Keep the price stream open after the last price.
    pub hold_prices: bool,
    /// End the price stream with an error after the last price.
    pub fail_prices: bool,
    /// Whether to fail market loading.
    pub fail_load: bool,
    /// Whether to fail balance requests.
    pub fail_balance: bool,
    /// Whether to fail order cancellation.
    pub fail_cancel: bool,
    /// Whether to reject new orders.
    pub fail_order: bool,
    /// Simulated market loading latency in milliseconds.
    pub load_latency_ms: u64,
}

/// Mock centralized exchange.
#[derive(Debug, Clone, Default)]
pub struct MockExchange {
    config: MockConfig,
    balance_calls: Arc<AtomicUsize>,
    cancel_calls: Arc<AtomicUsize>,
    order_calls: Arc<AtomicUsize>,
    orders: Arc<DashMap<usize, MarketOrder>>,
}

impl MockExchange {
    /// Create a mock exchange with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock exchange with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Number of balance requests served.
    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    /// Number of cancel-all requests served.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Orders accepted so far, oldest first.
    pub fn placed_orders(&self) -> Vec<MarketOrder> {
        let mut orders: Vec<(usize, MarketOrder)> = self
            .orders
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        orders.sort_by_key(|(sequence, _)| *sequence);
        orders.into_iter().map(|(_, order)| order).collect()
    }
}

#[async_trait]
impl CentralizedExchange for MockExchange {
    async fn load_markets(&self, pair: &AssetPair) -> Result<(), CexError> {
        if self.config.load_latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.load_latency_ms)).await;
        }
        if self.config.fail_load {
            return Err(CexError::MarketUnavailable {
                symbol: pair.cex_symbol(),
                reason: "mock market failure".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_balance(&self, _pair: &AssetPair) -> Result<AssetBalances, CexError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_balance {
            return Err(CexError::Api {
                code: -2015,
                message: "Invalid API-key, IP, or permissions for action.".to_string(),
            });
        }
        Ok(self.config.balances)
    }

    async fn cancel_all_orders(&self, _pair: &AssetPair) -> Result<usize, CexError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_cancel {
            return Err(CexError::Api {
                code: -1003,
                message: "Too many requests.".to_string(),
            });
        }
        Ok(0)
    }

    async fn create_order(&self, _pair: &AssetPair, order: &MarketOrder) -> Result<String, CexError> {
        let sequence = self.order_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.fail_order {
            return Err(CexError::Api {
                code: -2010,
                message: "Account has insufficient balance for requested action.".to_string(),
            });
        }
        self.orders.insert(sequence, *order);
        Ok(format!("mock-{}", sequence))
    }

    fn price_stream(&self, _pair: &AssetPair) -> BoxStream<'static, Result<Decimal, CexError>> {
        let config = self.config.clone();
        Box::pin(stream! {
            for price in config.prices {
                if config.price_interval_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(config.price_interval_ms)).await;
                }
                yield Ok(price);
            }
            if config.fail_prices {
                yield Err(CexError::FeedClosed { attempts: 5 });
            } else if config.hold_prices {
                futures::future::pending::<()>().await;
            }
        })
    }
}
