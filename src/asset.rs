//! Asset symbols and the traded pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Asset symbol supported on both venues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum Asset {
    /// Bitcoin.
    #[strum(serialize = "BTC")]
    BTC,
    /// Ether.
    #[strum(serialize = "ETH")]
    ETH,
    /// Dai stablecoin.
    #[strum(serialize = "DAI")]
    DAI,
}

/// The base/quote pair traded for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetPair {
    /// Asset being bought and sold.
    pub base: Asset,
    /// Asset the price is denominated in.
    pub quote: Asset,
}

impl AssetPair {
    /// Create a new pair.
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// OpenDEX pair id, e.g. `ETH/BTC`.
    pub fn pair_id(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    /// Centralized venue symbol, e.g. `ETHBTC`.
    pub fn cex_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
