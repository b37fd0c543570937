//! Retries for transient OpenDEX failures.
//!
//! Only [`OpenDexError::Rpc`] is retried. Rejections and unknown orders are
//! answers from the venue and are returned as they are. Placing an order is
//! never retried, since a request that timed out may still have placed it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::{warn, Span};

use crate::asset::AssetPair;
use crate::config::Config;
use crate::error::OpenDexError;
use crate::trade::OpenDexAssets;

use super::{OpenDex, OpenDexFill, OpenDexOrder, OwnOrder};

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed call.
    pub retries: u32,
    /// Wait between calls.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Policy from the configured OpenDEX retry settings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.opendex_retries,
            delay: config.opendex_retry_delay(),
        }
    }
}

/// OpenDEX venue that retries RPC failures of the wrapped venue.
pub struct RetryingOpenDex {
    inner: Arc<dyn OpenDex>,
    policy: RetryPolicy,
    logger: Span,
}

impl RetryingOpenDex {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn OpenDex>, policy: RetryPolicy, logger: Span) -> Self {
        Self {
            inner,
            policy,
            logger,
        }
    }

    async fn retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, OpenDexError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OpenDexError>>,
    {
        let mut retried = 0;
        loop {
            match call().await {
                Err(OpenDexError::Rpc(reason)) if retried < self.policy.retries => {
                    retried += 1;
                    warn!(
                        parent: &self.logger,
                        operation,
                        attempt = retried,
                        reason = %reason,
                        "OpenDEX call failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl OpenDex for RetryingOpenDex {
    async fn assets(&self, pair: &AssetPair) -> Result<OpenDexAssets, OpenDexError> {
        self.retry("assets", move || self.inner.assets(pair)).await
    }

    async fn open_orders(&self, pair: &AssetPair) -> Result<Vec<OwnOrder>, OpenDexError> {
        self.retry("open_orders", move || self.inner.open_orders(pair)).await
    }

    async fn place_order(&self, order: &OpenDexOrder) -> Result<String, OpenDexError> {
        self.inner.place_order(order).await
    }

    async fn remove_order(&self, order_id: &str) -> Result<(), OpenDexError> {
        self.retry("remove_order", move || self.inner.remove_order(order_id)).await
    }

    fn fills(&self, pair: &AssetPair) -> BoxStream<'static, Result<OpenDexFill, OpenDexError>> {
        self.inner.fills(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::opendex::Side;
    use crate::trade::ChannelBalance;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Fails the first `failures` calls of every operation.
    struct FlakyOpenDex {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyOpenDex {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), OpenDexError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(OpenDexError::Rpc("daemon unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl OpenDex for FlakyOpenDex {
        async fn assets(&self, _pair: &AssetPair) -> Result<OpenDexAssets, OpenDexError> {
            self.check()?;
            Ok(OpenDexAssets {
                base: ChannelBalance::unbounded(dec!(1)),
                quote: ChannelBalance::unbounded(dec!(0.05)),
            })
        }

        async fn open_orders(&self, _pair: &AssetPair) -> Result<Vec<OwnOrder>, OpenDexError> {
            self.check()?;
            Ok(Vec::new())
        }

        async fn place_order(&self, _order: &OpenDexOrder) -> Result<String, OpenDexError> {
            self.check()?;
            Ok("order-1".to_string())
        }

        async fn remove_order(&self, order_id: &str) -> Result<(), OpenDexError> {
            self.check()?;
            Err(OpenDexError::UnknownOrder {
                order_id: order_id.to_string(),
            })
        }
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::from_millis(250),
        }
    }

    fn pair() -> AssetPair {
        AssetPair::new(Asset::ETH, Asset::BTC)
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let flaky = Arc::new(FlakyOpenDex::new(2));
        let dex = RetryingOpenDex::new(flaky.clone(), policy(3), Span::none());

        let start = Instant::now();
        let assets = dex.assets(&pair()).await.unwrap();

        assert_eq!(assets.base.max_outbound, dec!(1));
        assert_eq!(flaky.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_last_retry() {
        let flaky = Arc::new(FlakyOpenDex::new(10));
        let dex = RetryingOpenDex::new(flaky.clone(), policy(2), Span::none());

        assert!(matches!(
            dex.open_orders(&pair()).await,
            Err(OpenDexError::Rpc(_))
        ));
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn venue_answers_are_not_retried() {
        let flaky = Arc::new(FlakyOpenDex::new(0));
        let dex = RetryingOpenDex::new(flaky.clone(), policy(3), Span::none());

        assert!(matches!(
            dex.remove_order("order-9").await,
            Err(OpenDexError::UnknownOrder { .. })
        ));
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn placing_is_never_retried() {
        let flaky = Arc::new(FlakyOpenDex::new(1));
        let dex = RetryingOpenDex::new(flaky.clone(), policy(3), Span::none());
        let order = OpenDexOrder {
            pair: pair(),
            side: Side::Buy,
            price: dec!(0.049),
            quantity: dec!(1),
        };

        assert!(matches!(
            dex.place_order(&order).await,
            Err(OpenDexError::Rpc(_))
        ));
        assert_eq!(flaky.calls(), 1);
    }
}
