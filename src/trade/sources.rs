//! Balance and price streams feeding the trade cycle.

use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::stream::{BoxStream, StreamExt};
use rust_decimal::Decimal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, Span};

use crate::asset::AssetPair;
use crate::cex::CexSession;
use crate::config::Config;
use crate::error::TradeError;
use crate::logger::Loggers;
use crate::opendex::OpenDex;

use super::cycle::TradeSources;
use super::info::{AssetBalances, OpenDexAssets};

/// Poll OpenDEX balances every `every`, starting immediately.
pub fn opendex_assets(
    opendex: Arc<dyn OpenDex>,
    pair: AssetPair,
    every: Duration,
    logger: Span,
) -> BoxStream<'static, Result<OpenDexAssets, TradeError>> {
    Box::pin(try_stream! {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let assets = opendex
                .assets(&pair)
                .await
                .map_err(TradeError::OpenDexAssets)?;
            debug!(
                parent: &logger,
                base_outbound = %assets.base.max_outbound,
                base_inbound = %assets.base.max_inbound,
                quote_outbound = %assets.quote.max_outbound,
                quote_inbound = %assets.quote.max_inbound,
                "OpenDEX balances"
            );
            yield assets;
        }
    })
}

/// Centralized venue balances.
///
/// A live session is queried on every tick. Otherwise the configured test
/// balances are emitted at once and then on every tick.
pub fn centralized_assets(
    session: Arc<CexSession>,
    config: &Config,
    logger: Span,
) -> BoxStream<'static, Result<AssetBalances, TradeError>> {
    let every = config.centralized_balance_interval();
    let test_balances = config.test_centralized_balances();

    Box::pin(try_stream! {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if !session.is_live() {
            info!(
                parent: &logger,
                base = %test_balances.base,
                quote = %test_balances.quote,
                "Using test balances for the centralized venue"
            );
        }

        loop {
            ticker.tick().await;
            let balances = if session.is_live() {
                session
                    .balances()
                    .await
                    .map_err(TradeError::CentralizedAssets)?
            } else {
                test_balances
            };
            debug!(
                parent: &logger,
                base = %balances.base,
                quote = %balances.quote,
                "Centralized balances"
            );
            yield balances;
        }
    })
}

/// Live centralized price.
pub fn centralized_price(session: &CexSession) -> BoxStream<'static, Result<Decimal, TradeError>> {
    session
        .price_stream()
        .map(|price| price.map_err(TradeError::Price))
        .boxed()
}

/// Wire up the three cycle inputs for a run.
pub fn trade_sources(
    session: Arc<CexSession>,
    opendex: Arc<dyn OpenDex>,
    config: &Config,
    loggers: &Loggers,
) -> TradeSources {
    TradeSources {
        opendex_assets: opendex_assets(
            opendex,
            config.pair(),
            config.opendex_poll_interval(),
            loggers.opendex.clone(),
        ),
        price: centralized_price(&session),
        centralized_assets: centralized_assets(session, config, loggers.centralized.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::cex::mock::{MockConfig, MockExchange};
    use crate::error::OpenDexError;
    use crate::opendex::{OpenDexOrder, OwnOrder, SimulatedOpenDex};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::time::Instant;

    fn config() -> Config {
        let mut config = Config::new(Asset::ETH, Asset::BTC, dec!(0.02));
        config.test_centralized_exchange_baseasset_balance = dec!(2);
        config.test_centralized_exchange_quoteasset_balance = dec!(0.1);
        config
    }

    async fn session(exchange: MockExchange, config: &Config) -> Arc<CexSession> {
        Arc::new(
            CexSession::init(Arc::new(exchange), config, &Span::none())
                .await
                .unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_balances_start_immediately_then_tick() {
        let config = config();
        let exchange = MockExchange::new();
        let session = session(exchange.clone(), &config).await;
        let mut balances = centralized_assets(session, &config, Span::none());

        let start = Instant::now();
        let first = balances.next().await.unwrap().unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(
            first,
            AssetBalances {
                base: dec!(2),
                quote: dec!(0.1),
            }
        );

        balances.next().await.unwrap().unwrap();
        assert_eq!(start.elapsed(), config.centralized_balance_interval());
        assert_eq!(exchange.balance_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn live_balances_come_from_the_venue() {
        let mut config = config();
        config.live_cex = true;
        let exchange = MockExchange::with_config(MockConfig {
            balances: AssetBalances {
                base: dec!(5),
                quote: dec!(0.3),
            },
            ..MockConfig::default()
        });
        let session = session(exchange.clone(), &config).await;
        let mut balances = centralized_assets(session, &config, Span::none());

        let first = balances.next().await.unwrap().unwrap();
        assert_eq!(first.base, dec!(5));
        // One query during init, one for the first tick.
        assert_eq!(exchange.balance_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn opendex_polls_on_interval() {
        let pair = AssetPair::new(Asset::ETH, Asset::BTC);
        let dex = Arc::new(SimulatedOpenDex::new(
            pair,
            AssetBalances {
                base: dec!(1),
                quote: dec!(0.05),
            },
        ));
        let mut assets = opendex_assets(dex, pair, Duration::from_secs(1), Span::none());

        let start = Instant::now();
        assert_eq!(assets.next().await.unwrap().unwrap().base.max_outbound, dec!(1));
        assets.next().await.unwrap().unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    struct OfflineOpenDex;

    #[async_trait]
    impl OpenDex for OfflineOpenDex {
        async fn assets(&self, _pair: &AssetPair) -> Result<OpenDexAssets, OpenDexError> {
            Err(OpenDexError::Rpc("connection refused".to_string()))
        }

        async fn open_orders(&self, _pair: &AssetPair) -> Result<Vec<OwnOrder>, OpenDexError> {
            Ok(Vec::new())
        }

        async fn place_order(&self, _order: &OpenDexOrder) -> Result<String, OpenDexError> {
            Err(OpenDexError::Rpc("connection refused".to_string()))
        }

        async fn remove_order(&self, _order_id: &str) -> Result<(), OpenDexError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opendex_failure_ends_stream() {
        let pair = AssetPair::new(Asset::ETH, Asset::BTC);
        let mut assets = opendex_assets(Arc::new(OfflineOpenDex), pair, Duration::from_secs(1), Span::none());

        assert!(matches!(
            assets.next().await,
            Some(Err(TradeError::OpenDexAssets(_)))
        ));
        assert!(assets.next().await.is_none());
    }
}
