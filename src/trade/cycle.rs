//! Trade-completion cycle.
//!
//! Combines the latest OpenDEX assets, centralized balances and centralized
//! price into a [`TradeInfo`] and starts an order-creation attempt for every
//! new value, unless an attempt is already running. Values that arrive while
//! an attempt is running are published for that attempt to read but never
//! start one of their own.

use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Span};

use crate::error::{OpenDexError, TradeError};
use crate::metrics;

use super::info::{AssetBalances, LatestTradeInfo, OpenDexAssets, TradeInfo};

/// Creates orders from the latest trade info.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Run one order-creation attempt.
    ///
    /// `latest` always returns the freshest trade info, which may be newer
    /// than the value that started the attempt.
    async fn submit(&self, latest: LatestTradeInfo) -> Result<bool, OpenDexError>;
}

/// The three inputs of the cycle.
pub struct TradeSources {
    /// OpenDEX balances and trading limits.
    pub opendex_assets: BoxStream<'static, Result<OpenDexAssets, TradeError>>,
    /// Centralized venue balances.
    pub centralized_assets: BoxStream<'static, Result<AssetBalances, TradeError>>,
    /// Centralized venue price.
    pub price: BoxStream<'static, Result<Decimal, TradeError>>,
}

type Attempt = BoxFuture<'static, Result<bool, OpenDexError>>;

enum Event {
    Shutdown,
    Attempt(Result<bool, OpenDexError>),
    OpenDexAssets(Option<Result<OpenDexAssets, TradeError>>),
    CentralizedAssets(Option<Result<AssetBalances, TradeError>>),
    Price(Option<Result<Decimal, TradeError>>),
}

/// Latest value of every source.
#[derive(Default)]
struct Latest {
    opendex: Option<OpenDexAssets>,
    centralized: Option<AssetBalances>,
    price: Option<Decimal>,
}

impl Latest {
    fn trade_info(&self) -> Option<TradeInfo> {
        Some(TradeInfo::new(self.price?, self.opendex?, self.centralized?))
    }
}

/// Run the cycle until shutdown, error, or the sources are exhausted.
///
/// Yields one `Ok` per finished attempt. A source or attempt error is yielded
/// once and ends the stream. After `shutdown` fires no attempt is started; a
/// running attempt is awaited and its result yielded before the stream ends.
pub fn completion_cycle(
    sources: TradeSources,
    submitter: Arc<dyn OrderSubmitter>,
    shutdown: CancellationToken,
    logger: Span,
) -> impl Stream<Item = Result<bool, TradeError>> + Send + 'static {
    stream! {
        let TradeSources {
            mut opendex_assets,
            mut centralized_assets,
            mut price,
        } = sources;

        let mut opendex_open = true;
        let mut centralized_open = true;
        let mut price_open = true;

        let mut latest = Latest::default();
        let mut publisher: Option<watch::Sender<TradeInfo>> = None;
        let mut in_flight: Option<Attempt> = None;

        loop {
            let exhausted = !(opendex_open || centralized_open || price_open);
            let starved = (!opendex_open && latest.opendex.is_none())
                || (!centralized_open && latest.centralized.is_none())
                || (!price_open && latest.price.is_none());
            if in_flight.is_none() && (exhausted || starved) {
                debug!(parent: &logger, "trade sources exhausted");
                break;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Event::Shutdown,
                result = attempt_finished(&mut in_flight), if in_flight.is_some() => {
                    Event::Attempt(result)
                }
                item = opendex_assets.next(), if opendex_open => Event::OpenDexAssets(item),
                item = centralized_assets.next(), if centralized_open => {
                    Event::CentralizedAssets(item)
                }
                item = price.next(), if price_open => Event::Price(item),
            };

            let updated = match event {
                Event::Shutdown => {
                    if let Some(attempt) = in_flight.take() {
                        debug!(parent: &logger, "waiting for order creation before shutdown");
                        yield finish(attempt.await, &logger);
                    }
                    break;
                }
                Event::Attempt(result) => {
                    in_flight = None;
                    let failed = result.is_err();
                    yield finish(result, &logger);
                    if failed {
                        break;
                    }
                    false
                }
                Event::OpenDexAssets(Some(Ok(assets))) => {
                    latest.opendex = Some(assets);
                    true
                }
                Event::CentralizedAssets(Some(Ok(balances))) => {
                    latest.centralized = Some(balances);
                    true
                }
                Event::Price(Some(Ok(value))) => {
                    latest.price = Some(value);
                    true
                }
                Event::OpenDexAssets(Some(Err(e)))
                | Event::CentralizedAssets(Some(Err(e)))
                | Event::Price(Some(Err(e))) => {
                    yield Err(e);
                    break;
                }
                Event::OpenDexAssets(None) => {
                    opendex_open = false;
                    false
                }
                Event::CentralizedAssets(None) => {
                    centralized_open = false;
                    false
                }
                Event::Price(None) => {
                    price_open = false;
                    false
                }
            };

            if !updated {
                continue;
            }
            let Some(info) = latest.trade_info() else {
                continue;
            };
            metrics::inc_trade_info_updates();

            let sender = publisher.get_or_insert_with(|| watch::channel(info.clone()).0);
            sender.send_replace(info);

            if in_flight.is_some() {
                metrics::inc_attempts_dropped();
                debug!(parent: &logger, "order creation in progress, ignoring trade info update");
                continue;
            }

            let latest_info = LatestTradeInfo::new(sender.subscribe());
            let submitter = Arc::clone(&submitter);
            metrics::inc_attempts_started();
            in_flight = Some(Box::pin(async move {
                let started = Instant::now();
                let result = submitter.submit(latest_info).await;
                metrics::record_attempt_latency(started);
                result
            }));
        }
    }
}

async fn attempt_finished(in_flight: &mut Option<Attempt>) -> Result<bool, OpenDexError> {
    match in_flight {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

fn finish(result: Result<bool, OpenDexError>, logger: &Span) -> Result<bool, TradeError> {
    match result {
        Ok(done) => {
            debug!(parent: logger, "order creation finished");
            Ok(done)
        }
        Err(e) => {
            metrics::inc_attempts_failed();
            Err(TradeError::OrderCreation(e))
        }
    }
}
