//! Centralized venue price feed over the aggregate-trade websocket.

use std::time::Duration;

use async_stream::stream;
use futures::stream::{BoxStream, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::asset::AssetPair;
use crate::error::CexError;

/// Aggregate trade event. Only the price is decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct AggTrade {
    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,
}

/// Reconnection backoff for the price feed.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_s: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential).
    pub backoff_multiplier: f64,
    /// Consecutive failed connections tolerated before the feed errors.
    pub max_failures: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_s: 30,
            backoff_multiplier: 2.0,
            max_failures: 5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate next delay with exponential backoff.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let max_delay_ms = self.max_delay_s * 1000;
        let clamped_ms = delay_ms.min(max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }
}

/// Stream URL for `pair` under the websocket base URL.
pub fn agg_trade_url(ws_url: &str, pair: &AssetPair) -> String {
    format!(
        "{}/{}@aggTrade",
        ws_url.trim_end_matches('/'),
        pair.cex_symbol().to_lowercase()
    )
}

/// Decode the price of an aggregate trade message.
pub fn parse_agg_trade(text: &str) -> Result<Decimal, CexError> {
    let trade: AggTrade = serde_json::from_str(text)
        .map_err(|e| CexError::Parse(format!("invalid aggTrade message: {}", e)))?;
    Ok(trade.price)
}

/// Live price stream for `url`.
///
/// Reconnects with backoff when the connection drops. Once `max_failures`
/// consecutive connections have failed the stream yields
/// [`CexError::FeedClosed`] and ends.
pub fn price_feed(url: String, reconnect: ReconnectConfig) -> BoxStream<'static, Result<Decimal, CexError>> {
    Box::pin(stream! {
        let mut failures = 0u32;

        loop {
            info!(url = %url, attempt = failures, "Connecting to price feed");

            match connect_async(url.as_str()).await {
                Ok((mut ws, _)) => {
                    failures = 0;

                    while let Some(message) = ws.next().await {
                        match message {
                            Ok(Message::Text(text)) => match parse_agg_trade(&text) {
                                Ok(price) => yield Ok(price),
                                Err(e) => debug!(error = %e, "Ignoring price feed message"),
                            },
                            Ok(Message::Close(frame)) => {
                                warn!(frame = ?frame, "Price feed closed by venue");
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!(error = %e, "Price feed error");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, attempt = failures, "Price feed connection failed");
                }
            }

            failures = failures.saturating_add(1);
            if failures > reconnect.max_failures {
                yield Err(CexError::FeedClosed { attempts: failures });
                break;
            }

            let delay = reconnect.next_delay(failures - 1);
            info!(delay_ms = delay.as_millis(), "Reconnecting price feed after delay");
            tokio::time::sleep(delay).await;
        }
    })
}
