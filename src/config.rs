//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::asset::{Asset, AssetPair};
use crate::trade::AssetBalances;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Operation Modes ===
    /// Query and retract on the real centralized venue instead of using
    /// the test balances.
    #[serde(default)]
    pub live_cex: bool,

    // === Logging ===
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding `arby.log`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    // === OpenDEX Connection ===
    /// TLS certificate of the OpenDEX daemon.
    #[serde(default = "default_cert_path")]
    pub opendex_cert_path: PathBuf,

    /// OpenDEX daemon RPC host.
    #[serde(default = "default_rpc_host")]
    pub opendex_rpc_host: String,

    /// OpenDEX daemon RPC port.
    #[serde(default = "default_rpc_port")]
    pub opendex_rpc_port: u16,

    /// Retries of a failed OpenDEX RPC call before giving up.
    #[serde(default = "default_opendex_retries")]
    pub opendex_retries: u32,

    /// Wait between OpenDEX RPC retries.
    #[serde(default = "default_opendex_retry_delay")]
    pub opendex_retry_delay_ms: u64,

    // === Centralized Exchange ===
    /// API key for authenticated requests.
    #[serde(default)]
    pub cex_api_key: Option<String>,

    /// API secret used to sign requests.
    #[serde(default)]
    pub cex_api_secret: Option<String>,

    /// REST base URL.
    #[serde(default = "default_rest_url")]
    pub cex_rest_url: String,

    /// Websocket base URL for the price feed.
    #[serde(default = "default_ws_url")]
    pub cex_ws_url: String,

    // === Trading Parameters ===
    /// Base asset of the traded pair.
    pub baseasset: Asset,

    /// Quote asset of the traded pair.
    pub quoteasset: Asset,

    /// Fraction added to (sell) or subtracted from (buy) the CEX price.
    pub margin: Decimal,

    /// Centralized base asset balance used when `live_cex` is off.
    #[serde(default)]
    pub test_centralized_exchange_baseasset_balance: Decimal,

    /// Centralized quote asset balance used when `live_cex` is off.
    #[serde(default)]
    pub test_centralized_exchange_quoteasset_balance: Decimal,

    /// Base asset balance of the paper OpenDEX venue.
    #[serde(default)]
    pub test_opendex_baseasset_balance: Decimal,

    /// Quote asset balance of the paper OpenDEX venue.
    #[serde(default)]
    pub test_opendex_quoteasset_balance: Decimal,

    // === Timing ===
    /// How often centralized balances are resampled.
    #[serde(default = "default_centralized_interval")]
    pub centralized_balance_interval_ms: u64,

    /// How often OpenDEX balances are polled.
    #[serde(default = "default_opendex_interval")]
    pub opendex_poll_interval_ms: u64,

    /// HTTP request timeout for the centralized venue.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    // === Metrics ===
    /// Port for the Prometheus exporter; disabled when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".arby")
}

fn default_cert_path() -> PathBuf {
    PathBuf::from(".arby/tls.cert")
}

fn default_rpc_host() -> String {
    "localhost".to_string()
}

fn default_rpc_port() -> u16 {
    8886
}

fn default_opendex_retries() -> u32 {
    3
}

fn default_opendex_retry_delay() -> u64 {
    1_000
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_centralized_interval() -> u64 {
    30_000
}

fn default_opendex_interval() -> u64 {
    1_000
}

fn default_http_timeout() -> u64 {
    5_000
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Configuration for a pair with every optional field at its default.
    pub fn new(baseasset: Asset, quoteasset: Asset, margin: Decimal) -> Self {
        Self {
            live_cex: false,
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            opendex_cert_path: default_cert_path(),
            opendex_rpc_host: default_rpc_host(),
            opendex_rpc_port: default_rpc_port(),
            opendex_retries: default_opendex_retries(),
            opendex_retry_delay_ms: default_opendex_retry_delay(),
            cex_api_key: None,
            cex_api_secret: None,
            cex_rest_url: default_rest_url(),
            cex_ws_url: default_ws_url(),
            baseasset,
            quoteasset,
            margin,
            test_centralized_exchange_baseasset_balance: Decimal::ZERO,
            test_centralized_exchange_quoteasset_balance: Decimal::ZERO,
            test_opendex_baseasset_balance: Decimal::ZERO,
            test_opendex_quoteasset_balance: Decimal::ZERO,
            centralized_balance_interval_ms: default_centralized_interval(),
            opendex_poll_interval_ms: default_opendex_interval(),
            http_timeout_ms: default_http_timeout(),
            metrics_port: None,
        }
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.baseasset == self.quoteasset {
            return Err("BASEASSET and QUOTEASSET must differ".to_string());
        }

        if self.margin < Decimal::ZERO || self.margin >= Decimal::ONE {
            return Err("MARGIN must be in [0, 1)".to_string());
        }

        let balances = [
            self.test_centralized_exchange_baseasset_balance,
            self.test_centralized_exchange_quoteasset_balance,
            self.test_opendex_baseasset_balance,
            self.test_opendex_quoteasset_balance,
        ];
        if balances.iter().any(|b| *b < Decimal::ZERO) {
            return Err("test balances must be non-negative".to_string());
        }

        if self.live_cex && (self.cex_api_key.is_none() || self.cex_api_secret.is_none()) {
            return Err("LIVE_CEX requires CEX_API_KEY and CEX_API_SECRET".to_string());
        }

        if self.centralized_balance_interval_ms == 0 || self.opendex_poll_interval_ms == 0 {
            return Err("poll intervals must be positive".to_string());
        }

        Ok(())
    }

    /// The traded pair.
    pub fn pair(&self) -> AssetPair {
        AssetPair::new(self.baseasset, self.quoteasset)
    }

    /// Centralized balances used when `live_cex` is off.
    pub fn test_centralized_balances(&self) -> AssetBalances {
        AssetBalances {
            base: self.test_centralized_exchange_baseasset_balance,
            quote: self.test_centralized_exchange_quoteasset_balance,
        }
    }

    /// Path of the log file.
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("arby.log")
    }

    /// OpenDEX RPC endpoint as `host:port`.
    pub fn opendex_endpoint(&self) -> String {
        format!("{}:{}", self.opendex_rpc_host, self.opendex_rpc_port)
    }

    /// Centralized balance resample interval.
    pub fn centralized_balance_interval(&self) -> Duration {
        Duration::from_millis(self.centralized_balance_interval_ms)
    }

    /// OpenDEX balance poll interval.
    pub fn opendex_poll_interval(&self) -> Duration {
        Duration::from_millis(self.opendex_poll_interval_ms)
    }

    /// Wait between OpenDEX RPC retries.
    pub fn opendex_retry_delay(&self) -> Duration {
        Duration::from_millis(self.opendex_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::new(Asset::ETH, Asset::BTC, dec!(0.02));
        assert!(!config.live_cex);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_file(), PathBuf::from(".arby/arby.log"));
        assert_eq!(config.opendex_endpoint(), "localhost:8886");
        assert_eq!(config.opendex_retries, 3);
        assert_eq!(config.opendex_retry_delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_same_assets() {
        let config = Config::new(Asset::BTC, Asset::BTC, dec!(0.02));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_margin() {
        assert!(Config::new(Asset::ETH, Asset::BTC, dec!(-0.01))
            .validate()
            .is_err());
        assert!(Config::new(Asset::ETH, Asset::BTC, dec!(1)).validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_test_balance() {
        let mut config = Config::new(Asset::ETH, Asset::BTC, dec!(0.02));
        config.test_centralized_exchange_quoteasset_balance = dec!(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_credentials_for_live_cex() {
        let mut config = Config::new(Asset::ETH, Asset::BTC, dec!(0.02));
        config.live_cex = true;
        assert!(config.validate().is_err());

        config.cex_api_key = Some("key".to_string());
        config.cex_api_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }
}
