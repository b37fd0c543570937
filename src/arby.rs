//! Run orchestration.
//!
//! A run moves through four phases:
//!
//! ```text
//! Init ──► Trading ──► Cleanup ──► done
//!   │                               ▲
//!   └── error / shutdown ───────────┘ (no cleanup, nothing was created)
//! ```
//!
//! While trading, fills of the agent's OpenDEX orders are offset on the
//! centralized venue. Trading ends on shutdown, when its sources run dry, or
//! on an unrecoverable error. Cleanup then runs exactly once, whatever the reason, and its result
//! decides the result of the run.

use std::fmt;
use std::sync::Arc;

use futures::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Span};

use crate::cex::{BinanceClient, CentralizedExchange, CexSession};
use crate::config::Config;
use crate::error::{ArbyError, CexError};
use crate::logger::Loggers;
use crate::opendex::{OpenDex, OpenDexOrderSubmitter, RetryPolicy, RetryingOpenDex, SimulatedOpenDex};
use crate::trade::{centralized_orders, cleanup, completion_cycle, trade_sources, OrderSubmitter};

/// Builds the venue handles for a run.
pub trait Venues: Send + Sync {
    /// Centralized venue for `config`.
    fn centralized(&self, config: &Config) -> Result<Arc<dyn CentralizedExchange>, CexError>;

    /// OpenDEX venue for `config`.
    fn opendex(&self, config: &Config) -> Arc<dyn OpenDex>;

    /// Order submitter placing on `opendex`.
    fn submitter(
        &self,
        opendex: Arc<dyn OpenDex>,
        config: &Config,
        logger: Span,
    ) -> Arc<dyn OrderSubmitter> {
        Arc::new(OpenDexOrderSubmitter::new(
            opendex,
            config.pair(),
            config.margin,
            logger,
        ))
    }
}

/// Binance as the centralized venue and the paper OpenDEX venue, with
/// OpenDEX RPC failures retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVenues;

impl Venues for DefaultVenues {
    fn centralized(&self, config: &Config) -> Result<Arc<dyn CentralizedExchange>, CexError> {
        Ok(Arc::new(BinanceClient::new(config)?))
    }

    fn opendex(&self, config: &Config) -> Arc<dyn OpenDex> {
        Arc::new(RetryingOpenDex::new(
            Arc::new(SimulatedOpenDex::from_config(config)),
            RetryPolicy::from_config(config),
            Loggers::new(config).opendex,
        ))
    }
}

/// How the trading phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingOutcome {
    /// Every source ended.
    Completed,
    /// Shutdown was requested.
    Shutdown,
    /// A source, order creation or a centralized order failed.
    Failed,
}

impl fmt::Display for TradingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSummary {
    /// Shutdown arrived before initialization finished.
    Aborted,
    /// Trading ran and cleanup succeeded.
    Finished {
        /// How trading ended.
        outcome: TradingOutcome,
        /// Order-creation attempts that completed.
        attempts: usize,
    },
}

/// The arbitrage agent.
pub struct Arby<V> {
    venues: V,
}

impl<V: Venues> Arby<V> {
    /// Create an agent trading on `venues`.
    pub fn new(venues: V) -> Self {
        Self { venues }
    }

    /// Run once per configuration, concurrently. Returns the first failure.
    ///
    /// A failing run shuts the others down, and every run is awaited so each
    /// one that started trading also finishes its cleanup.
    pub async fn start<S>(&self, configs: S, shutdown: CancellationToken) -> Result<(), ArbyError>
    where
        S: Stream<Item = Config>,
    {
        let stop = shutdown.child_token();
        let mut runs = std::pin::pin!(configs
            .map(|config| self.run(config, stop.clone()))
            .buffer_unordered(usize::MAX));

        let mut first_failure = None;
        while let Some(result) = runs.next().await {
            if let Err(e) = result {
                if first_failure.is_none() {
                    warn!(error = %e, "Run failed, shutting down the remaining runs");
                    stop.cancel();
                    first_failure = Some(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run a single configuration through init, trading and cleanup.
    pub async fn run(&self, config: Config, shutdown: CancellationToken) -> Result<RunSummary, ArbyError> {
        let loggers = Loggers::new(&config);

        let init = async {
            let exchange = self.venues.centralized(&config)?;
            CexSession::init(exchange, &config, &loggers.centralized).await
        };

        let session = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!(parent: &loggers.global, "Shutdown requested before trading started");
                return Ok(RunSummary::Aborted);
            }
            session = init => match session {
                Ok(session) => Arc::new(session),
                Err(e) => {
                    error!(parent: &loggers.global, error = %e, "Initialization failed");
                    return Err(ArbyError::Init(e));
                }
            },
        };

        let opendex = self.venues.opendex(&config);
        let (outcome, attempts) =
            self.trade(&config, Arc::clone(&session), Arc::clone(&opendex), &loggers, &shutdown)
                .await;

        if outcome == TradingOutcome::Failed {
            error!(parent: &loggers.global, "Unrecoverable error. Cleaning up.");
        }

        if let Err(e) = cleanup(opendex.as_ref(), &session, &loggers).await {
            error!(parent: &loggers.global, error = %e, "Cleanup failed");
            return Err(e.into());
        }
        info!(parent: &loggers.global, outcome = %outcome, attempts, "Cleanup complete");

        Ok(RunSummary::Finished { outcome, attempts })
    }

    async fn trade(
        &self,
        config: &Config,
        session: Arc<CexSession>,
        opendex: Arc<dyn OpenDex>,
        loggers: &Loggers,
        shutdown: &CancellationToken,
    ) -> (TradingOutcome, usize) {
        info!(parent: &loggers.global, "Starting. Hello, Arby.");
        log_config(config, &loggers.global);

        let submitter = self
            .venues
            .submitter(Arc::clone(&opendex), config, loggers.opendex.clone());
        let mut orders = centralized_orders(
            opendex.fills(&config.pair()),
            Arc::clone(&session),
            loggers.centralized.clone(),
        );
        let sources = trade_sources(session, opendex, config, loggers);
        let mut cycle = Box::pin(completion_cycle(
            sources,
            submitter,
            shutdown.clone(),
            loggers.opendex.clone(),
        ));

        let mut attempts = 0;
        let mut hedging = true;
        loop {
            tokio::select! {
                biased;
                result = cycle.next() => match result {
                    Some(Ok(_)) => attempts += 1,
                    Some(Err(e)) => {
                        error!(parent: &loggers.global, error = %e, "Trading stopped");
                        return (TradingOutcome::Failed, attempts);
                    }
                    None => break,
                },
                placed = orders.next(), if hedging => match placed {
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(parent: &loggers.global, error = %e, "Trading stopped");
                        return (TradingOutcome::Failed, attempts);
                    }
                    None => hedging = false,
                },
            }
        }

        let outcome = if shutdown.is_cancelled() {
            TradingOutcome::Shutdown
        } else {
            TradingOutcome::Completed
        };
        (outcome, attempts)
    }
}

fn presence(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "set"
    } else {
        "unset"
    }
}

/// Log every configuration field. Credentials are only reported as set.
pub fn log_config(config: &Config, logger: &Span) {
    info!(
        parent: logger,
        live_cex = config.live_cex,
        log_level = %config.log_level,
        data_dir = %config.data_dir.display(),
        opendex_cert_path = %config.opendex_cert_path.display(),
        opendex_rpc = %config.opendex_endpoint(),
        opendex_retries = config.opendex_retries,
        opendex_retry_delay_ms = config.opendex_retry_delay_ms,
        cex_rest_url = %config.cex_rest_url,
        cex_ws_url = %config.cex_ws_url,
        cex_api_key = presence(&config.cex_api_key),
        cex_api_secret = presence(&config.cex_api_secret),
        baseasset = %config.baseasset,
        quoteasset = %config.quoteasset,
        margin = %config.margin,
        test_centralized_exchange_baseasset_balance =
            %config.test_centralized_exchange_baseasset_balance,
        test_centralized_exchange_quoteasset_balance =
            %config.test_centralized_exchange_quoteasset_balance,
        test_opendex_baseasset_balance = %config.test_opendex_baseasset_balance,
        test_opendex_quoteasset_balance = %config.test_opendex_quoteasset_balance,
        centralized_balance_interval_ms = config.centralized_balance_interval_ms,
        opendex_poll_interval_ms = config.opendex_poll_interval_ms,
        http_timeout_ms = config.http_timeout_ms,
        metrics_port = ?config.metrics_port,
        "Running with config"
    );
}
