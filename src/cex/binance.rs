//! Binance REST client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::asset::AssetPair;
use crate::config::Config;
use crate::error::CexError;
use crate::opendex::Side;
use crate::trade::AssetBalances;

use super::price::{agg_trade_url, price_feed, ReconnectConfig};
use super::{CentralizedExchange, MarketOrder};

/// Binance error returned when a symbol has no open orders to cancel.
const NO_OPEN_ORDERS: i64 = -2011;

/// Binance error returned for a symbol the venue does not list.
const INVALID_SYMBOL: i64 = -1121;

/// API key pair. The secret never leaves this module.
#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Error payload returned by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Venue error code.
    pub code: i64,
    /// Venue error message.
    pub msg: String,
}

/// `exchangeInfo` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    /// Listed symbols.
    pub symbols: Vec<SymbolInfo>,
}

/// Symbol entry in `exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    /// Symbol, e.g. `ETHBTC`.
    pub symbol: String,
    /// Trading status, `TRADING` when open.
    pub status: String,
}

/// `account` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    /// Per-asset balances.
    pub balances: Vec<BalanceEntry>,
}

/// Balance of one asset.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceEntry {
    /// Asset symbol.
    pub asset: String,
    /// Available quantity.
    pub free: Decimal,
    /// Quantity held by open orders.
    pub locked: Decimal,
}

/// `order` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderResponse {
    /// Venue order id.
    pub order_id: u64,
    /// Order status, e.g. `FILLED`.
    pub status: String,
    /// Base quantity executed so far.
    pub executed_qty: Decimal,
}

/// Binance spot client.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    rest_url: String,
    ws_url: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
    reconnect: ReconnectConfig,
}

impl BinanceClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Result<Self, CexError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(Duration::from_millis(config.http_timeout_ms.min(2_000)))
            .tcp_nodelay(true)
            .build()?;

        let credentials = match (&config.cex_api_key, &config.cex_api_secret) {
            (Some(api_key), Some(api_secret)) => Some(Credentials {
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            http,
            rest_url: config.cex_rest_url.trim_end_matches('/').to_string(),
            ws_url: config.cex_ws_url.clone(),
            credentials,
            recv_window_ms: 5_000,
            reconnect: ReconnectConfig::default(),
        })
    }

    /// Whether API credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Build a signed query string for `params`.
    fn signed_query(&self, params: &[(&str, String)]) -> Result<(String, &str), CexError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(CexError::MissingCredentials)?;

        let timestamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("recvWindow", &self.recv_window_ms.to_string())
            .append_pair("timestamp", &timestamp.to_string())
            .finish();
        let signature = sign(&query, &credentials.api_secret);

        Ok((
            format!("{}&signature={}", query, signature),
            credentials.api_key.as_str(),
        ))
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, CexError> {
        let (query, api_key) = self.signed_query(params)?;
        let url = format!("{}{}?{}", self.rest_url, path, query);

        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;

        read_json(response).await
    }
}

/// HMAC-SHA256 of `query` keyed with `secret`, hex encoded.
pub fn sign(query: &str, secret: &str) -> String {
    hex::encode(hmac_sha256::HMAC::mac(query.as_bytes(), secret.as_bytes()))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CexError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => CexError::Api {
                code: err.code,
                message: err.msg,
            },
            Err(_) => CexError::Parse(format!("HTTP {} - {}", status, body)),
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| CexError::Parse(format!("Failed to parse response: {}", e)))
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

/// Request parameters of a market order.
pub fn market_order_params(pair: &AssetPair, order: &MarketOrder) -> [(&'static str, String); 4] {
    [
        ("symbol", pair.cex_symbol()),
        ("side", side_param(order.side).to_string()),
        ("type", "MARKET".to_string()),
        ("quantity", order.quantity.normalize().to_string()),
    ]
}

/// Check that `symbol` is listed and trading.
pub fn check_market(info: &ExchangeInfo, symbol: &str) -> Result<(), CexError> {
    let entry = info
        .symbols
        .iter()
        .find(|s| s.symbol == symbol)
        .ok_or_else(|| CexError::MarketUnavailable {
            symbol: symbol.to_string(),
            reason: "not listed".to_string(),
        })?;

    if entry.status != "TRADING" {
        return Err(CexError::MarketUnavailable {
            symbol: symbol.to_string(),
            reason: format!("status {}", entry.status),
        });
    }
    Ok(())
}

/// Free balances of the pair's assets. Unlisted assets count as zero.
pub fn pair_balances(account: &AccountInfo, pair: &AssetPair) -> AssetBalances {
    let free = |symbol: String| {
        account
            .balances
            .iter()
            .find(|b| b.asset == symbol)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO)
    };

    AssetBalances {
        base: free(pair.base.to_string()),
        quote: free(pair.quote.to_string()),
    }
}

#[async_trait]
impl CentralizedExchange for BinanceClient {
    #[instrument(skip(self), fields(symbol = %pair.cex_symbol()))]
    async fn load_markets(&self, pair: &AssetPair) -> Result<(), CexError> {
        let symbol = pair.cex_symbol();
        let url = format!("{}/api/v3/exchangeInfo", self.rest_url);

        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        let info: ExchangeInfo = match read_json(response).await {
            Err(CexError::Api { code, message }) if code == INVALID_SYMBOL => {
                return Err(CexError::MarketUnavailable {
                    symbol,
                    reason: message,
                });
            }
            other => other?,
        };

        check_market(&info, &symbol)?;
        debug!("Market loaded");
        Ok(())
    }

    #[instrument(skip(self), fields(symbol = %pair.cex_symbol()))]
    async fn fetch_balance(&self, pair: &AssetPair) -> Result<AssetBalances, CexError> {
        let account: AccountInfo = self
            .signed(reqwest::Method::GET, "/api/v3/account", &[])
            .await?;
        let balances = pair_balances(&account, pair);
        debug!(base = %balances.base, quote = %balances.quote, "Retrieved balances");
        Ok(balances)
    }

    #[instrument(skip(self), fields(symbol = %pair.cex_symbol()))]
    async fn cancel_all_orders(&self, pair: &AssetPair) -> Result<usize, CexError> {
        let params = [("symbol", pair.cex_symbol())];
        let result: Result<Vec<serde_json::Value>, CexError> = self
            .signed(reqwest::Method::DELETE, "/api/v3/openOrders", &params)
            .await;

        match result {
            Ok(cancelled) => Ok(cancelled.len()),
            Err(CexError::Api { code, .. }) if code == NO_OPEN_ORDERS => Ok(0),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(symbol = %pair.cex_symbol()))]
    async fn create_order(&self, pair: &AssetPair, order: &MarketOrder) -> Result<String, CexError> {
        let params = market_order_params(pair, order);
        let placed: NewOrderResponse = self
            .signed(reqwest::Method::POST, "/api/v3/order", &params)
            .await?;
        debug!(
            order_id = placed.order_id,
            status = %placed.status,
            executed = %placed.executed_qty,
            "Order placed"
        );
        Ok(placed.order_id.to_string())
    }

    fn price_stream(&self, pair: &AssetPair) -> BoxStream<'static, Result<Decimal, CexError>> {
        price_feed(agg_trade_url(&self.ws_url, pair), self.reconnect.clone())
    }
}
