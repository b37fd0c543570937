//! Run lifecycle tests against in-process venues.
//!
//! The centralized venue is the crate's mock exchange and OpenDEX is the
//! paper venue, so every run here is deterministic and offline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use arby::asset::Asset;
use arby::cex::mock::{MockConfig, MockExchange};
use arby::cex::{CentralizedExchange, MarketOrder};
use arby::error::{CexError, CleanupError, OpenDexError};
use arby::opendex::{OpenDex, OpenDexOrderSubmitter, Side, SimulatedOpenDex};
use arby::trade::{AssetBalances, LatestTradeInfo, OrderSubmitter};
use arby::{Arby, ArbyError, Config, RunSummary, TradingOutcome, Venues};

/// Wraps the real submitter to count calls, slow it down, or fail it.
struct TestSubmitter {
    inner: OpenDexOrderSubmitter,
    delay: Duration,
    fail_on: Option<usize>,
    calls: AtomicUsize,
}

impl TestSubmitter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSubmitter for TestSubmitter {
    async fn submit(&self, latest: LatestTradeInfo) -> Result<bool, OpenDexError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on == Some(call) {
            return Err(OpenDexError::Rpc("order stream reset".to_string()));
        }
        self.inner.submit(latest).await
    }
}

struct TestVenues {
    exchange: MockExchange,
    opendex: Arc<SimulatedOpenDex>,
    submitter: Arc<TestSubmitter>,
}

impl Venues for TestVenues {
    fn centralized(&self, _config: &Config) -> Result<Arc<dyn CentralizedExchange>, CexError> {
        Ok(Arc::new(self.exchange.clone()))
    }

    fn opendex(&self, _config: &Config) -> Arc<dyn OpenDex> {
        self.opendex.clone()
    }

    fn submitter(&self, _opendex: Arc<dyn OpenDex>, _config: &Config, _logger: Span) -> Arc<dyn OrderSubmitter> {
        self.submitter.clone()
    }
}

/// Routes each run to the venues of its base asset.
struct RoutedVenues {
    routes: Vec<(Asset, TestVenues)>,
}

impl RoutedVenues {
    fn route(&self, config: &Config) -> &TestVenues {
        self.routes
            .iter()
            .find(|(base, _)| *base == config.baseasset)
            .map(|(_, venues)| venues)
            .expect("no venues for base asset")
    }
}

impl Venues for RoutedVenues {
    fn centralized(&self, config: &Config) -> Result<Arc<dyn CentralizedExchange>, CexError> {
        self.route(config).centralized(config)
    }

    fn opendex(&self, config: &Config) -> Arc<dyn OpenDex> {
        self.route(config).opendex(config)
    }

    fn submitter(&self, opendex: Arc<dyn OpenDex>, config: &Config, logger: Span) -> Arc<dyn OrderSubmitter> {
        self.route(config).submitter(opendex, config, logger)
    }
}

fn config() -> Config {
    let mut config = Config::new(Asset::ETH, Asset::BTC, dec!(0.02));
    config.live_cex = true;
    config.cex_api_key = Some("key".to_string());
    config.cex_api_secret = Some("secret".to_string());
    config.test_opendex_baseasset_balance = dec!(2);
    config.test_opendex_quoteasset_balance = dec!(0.1);
    config
}

fn prices(count: usize) -> Vec<Decimal> {
    (0..count).map(|i| dec!(0.05) + Decimal::new(i as i64, 3)).collect()
}

fn ticking_exchange(prices: Vec<Decimal>) -> MockConfig {
    MockConfig {
        balances: AssetBalances {
            base: dec!(10),
            quote: dec!(1),
        },
        prices,
        price_interval_ms: 20,
        hold_prices: true,
        ..MockConfig::default()
    }
}

fn venues(config: &Config, exchange: MockConfig, delay: Duration, fail_on: Option<usize>) -> TestVenues {
    let opendex = Arc::new(SimulatedOpenDex::from_config(config));
    let submitter = Arc::new(TestSubmitter {
        inner: OpenDexOrderSubmitter::new(opendex.clone(), config.pair(), config.margin, Span::none()),
        delay,
        fail_on,
        calls: AtomicUsize::new(0),
    });
    TestVenues {
        exchange: MockExchange::with_config(exchange),
        opendex,
        submitter,
    }
}

fn cancel_after(shutdown: &CancellationToken, after: Duration) {
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        trigger.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn shutdown_runs_cleanup_once() {
    let config = config();
    let venues = venues(&config, ticking_exchange(prices(3)), Duration::ZERO, None);
    let exchange = venues.exchange.clone();
    let opendex = venues.opendex.clone();
    let submitter = venues.submitter.clone();

    let shutdown = CancellationToken::new();
    cancel_after(&shutdown, Duration::from_millis(500));
    let summary = assert_ok!(Arby::new(venues).run(config, shutdown).await);

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Shutdown,
            attempts: 3,
        }
    );
    assert_eq!(submitter.calls(), 3);
    assert_eq!(exchange.cancel_calls(), 1);
    assert_eq!(opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_lets_pending_submission_finish() {
    let config = config();
    let venues = venues(&config, ticking_exchange(prices(5)), Duration::from_millis(100), None);
    let exchange = venues.exchange.clone();
    let opendex = venues.opendex.clone();
    let submitter = venues.submitter.clone();

    let shutdown = CancellationToken::new();
    cancel_after(&shutdown, Duration::from_millis(30));
    let summary = assert_ok!(Arby::new(venues).run(config, shutdown).await);

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Shutdown,
            attempts: 1,
        }
    );
    assert_eq!(submitter.calls(), 1);
    assert_eq!(exchange.cancel_calls(), 1);
    assert_eq!(opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_cleans_up_and_succeeds() {
    let config = config();
    let venues = venues(&config, ticking_exchange(prices(5)), Duration::ZERO, Some(3));
    let exchange = venues.exchange.clone();
    let opendex = venues.opendex.clone();
    let submitter = venues.submitter.clone();

    let summary = assert_ok!(
        Arby::new(venues)
            .run(config, CancellationToken::new())
            .await
    );

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Failed,
            attempts: 2,
        }
    );
    assert_eq!(submitter.calls(), 3);
    assert_eq!(exchange.cancel_calls(), 1);
    assert_eq!(opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_with_failed_cleanup_fails_run() {
    let config = config();
    let exchange = MockConfig {
        fail_cancel: true,
        ..ticking_exchange(prices(5))
    };
    let venues = venues(&config, exchange, Duration::ZERO, Some(3));
    let mock = venues.exchange.clone();

    let err = assert_err!(
        Arby::new(venues)
            .run(config, CancellationToken::new())
            .await
    );

    assert!(matches!(err, ArbyError::Cleanup(CleanupError::Centralized(_))));
    assert_eq!(mock.cancel_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn price_feed_failure_cleans_up() {
    let config = config();
    let exchange = MockConfig {
        fail_prices: true,
        hold_prices: false,
        ..ticking_exchange(prices(2))
    };
    let venues = venues(&config, exchange, Duration::ZERO, None);
    let mock = venues.exchange.clone();

    let summary = assert_ok!(
        Arby::new(venues)
            .run(config, CancellationToken::new())
            .await
    );

    assert!(matches!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Failed,
            ..
        }
    ));
    assert_eq!(mock.cancel_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn paper_mode_skips_centralized_retraction() {
    let mut config = config();
    config.live_cex = false;
    config.test_centralized_exchange_baseasset_balance = dec!(10);
    config.test_centralized_exchange_quoteasset_balance = dec!(1);
    let venues = venues(&config, ticking_exchange(prices(2)), Duration::ZERO, None);
    let exchange = venues.exchange.clone();
    let opendex = venues.opendex.clone();

    let shutdown = CancellationToken::new();
    cancel_after(&shutdown, Duration::from_millis(100));
    let summary = assert_ok!(Arby::new(venues).run(config, shutdown).await);

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Shutdown,
            attempts: 2,
        }
    );
    assert_eq!(exchange.balance_calls(), 0);
    assert_eq!(exchange.cancel_calls(), 0);
    assert_eq!(opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn init_failure_skips_cleanup() {
    let config = config();
    let exchange = MockConfig {
        fail_load: true,
        ..ticking_exchange(prices(1))
    };
    let venues = venues(&config, exchange, Duration::ZERO, None);
    let mock = venues.exchange.clone();
    let submitter = venues.submitter.clone();

    let err = assert_err!(
        Arby::new(venues)
            .run(config, CancellationToken::new())
            .await
    );

    assert!(matches!(err, ArbyError::Init(CexError::MarketUnavailable { .. })));
    assert_eq!(mock.cancel_calls(), 0);
    assert_eq!(submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_init_aborts_run() {
    let config = config();
    let exchange = MockConfig {
        load_latency_ms: 1_000,
        ..ticking_exchange(prices(1))
    };
    let venues = venues(&config, exchange, Duration::ZERO, None);
    let mock = venues.exchange.clone();
    let submitter = venues.submitter.clone();

    let shutdown = CancellationToken::new();
    cancel_after(&shutdown, Duration::from_millis(10));
    let summary = assert_ok!(Arby::new(venues).run(config, shutdown).await);

    assert_eq!(summary, RunSummary::Aborted);
    assert_eq!(mock.cancel_calls(), 0);
    assert_eq!(submitter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_sources_complete_and_clean_up() {
    let config = config();
    let exchange = MockConfig {
        hold_prices: false,
        ..ticking_exchange(Vec::new())
    };
    let venues = venues(&config, exchange, Duration::ZERO, None);
    let mock = venues.exchange.clone();
    let submitter = venues.submitter.clone();

    let summary = assert_ok!(
        Arby::new(venues)
            .run(config, CancellationToken::new())
            .await
    );

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Completed,
            attempts: 0,
        }
    );
    assert_eq!(submitter.calls(), 0);
    assert_eq!(mock.cancel_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn opendex_fill_is_offset_on_centralized_venue() {
    let config = config();
    let pair = config.pair();
    let venues = venues(&config, ticking_exchange(prices(3)), Duration::ZERO, None);
    let exchange = venues.exchange.clone();
    let opendex = venues.opendex.clone();

    let filler = opendex.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let orders = filler.open_orders(&pair).await.unwrap();
        let sell = orders.iter().find(|order| order.side == Side::Sell).unwrap();
        filler.fill(&sell.id, dec!(0.5)).unwrap();
    });

    let shutdown = CancellationToken::new();
    cancel_after(&shutdown, Duration::from_millis(100));
    let summary = assert_ok!(Arby::new(venues).run(config, shutdown).await);

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Shutdown,
            attempts: 3,
        }
    );
    assert_eq!(
        exchange.placed_orders(),
        vec![MarketOrder {
            side: Side::Buy,
            quantity: dec!(0.5),
        }]
    );
    assert_eq!(opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_centralized_order_fails_trading() {
    let config = config();
    let pair = config.pair();
    let exchange = MockConfig {
        fail_order: true,
        ..ticking_exchange(prices(3))
    };
    let venues = venues(&config, exchange, Duration::ZERO, None);
    let mock = venues.exchange.clone();
    let opendex = venues.opendex.clone();

    let filler = opendex.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let orders = filler.open_orders(&pair).await.unwrap();
        filler.fill(&orders[0].id, dec!(0.05)).unwrap();
    });

    let summary = assert_ok!(
        Arby::new(venues)
            .run(config, CancellationToken::new())
            .await
    );

    assert_eq!(
        summary,
        RunSummary::Finished {
            outcome: TradingOutcome::Failed,
            attempts: 1,
        }
    );
    assert_eq!(mock.cancel_calls(), 1);
    assert_eq!(opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_run_shuts_down_sibling_runs() {
    let good_config = config();
    let good = venues(&good_config, ticking_exchange(prices(3)), Duration::ZERO, None);
    let good_exchange = good.exchange.clone();
    let good_opendex = good.opendex.clone();
    let good_submitter = good.submitter.clone();

    let mut bad_config = config();
    bad_config.baseasset = Asset::DAI;
    let bad_exchange = MockConfig {
        fail_balance: true,
        load_latency_ms: 500,
        ..ticking_exchange(prices(1))
    };
    let bad = venues(&bad_config, bad_exchange, Duration::ZERO, None);

    let venues = RoutedVenues {
        routes: vec![(Asset::ETH, good), (Asset::DAI, bad)],
    };
    let result = Arby::new(venues)
        .start(stream::iter([good_config, bad_config]), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ArbyError::Init(CexError::Api { .. }))));
    assert_eq!(good_submitter.calls(), 3);
    assert_eq!(good_exchange.cancel_calls(), 1);
    assert_eq!(good_opendex.order_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_reports_first_run_failure() {
    let config = config();
    let exchange = MockConfig {
        fail_balance: true,
        ..ticking_exchange(prices(1))
    };
    let venues = venues(&config, exchange, Duration::ZERO, None);

    let result = Arby::new(venues)
        .start(stream::iter([config]), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ArbyError::Init(CexError::Api { .. }))));
}
