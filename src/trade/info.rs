//! Trade information combined from both venues.

use rust_decimal::Decimal;
use tokio::sync::watch;

/// Base and quote asset quantities held on a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetBalances {
    /// Base asset quantity.
    pub base: Decimal,
    /// Quote asset quantity.
    pub quote: Decimal,
}

/// Trading limits of one asset on OpenDEX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelBalance {
    /// Largest amount that can be received.
    pub max_inbound: Decimal,
    /// Largest amount that can be sent.
    pub max_outbound: Decimal,
}

impl ChannelBalance {
    /// Balance that can be fully sent and received without limit.
    pub fn unbounded(balance: Decimal) -> Self {
        Self {
            max_inbound: Decimal::MAX,
            max_outbound: balance,
        }
    }
}

/// OpenDEX assets for the traded pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenDexAssets {
    /// Base asset.
    pub base: ChannelBalance,
    /// Quote asset.
    pub quote: ChannelBalance,
}

/// Sizing input for one cycle tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeInfo {
    /// Centralized venue price of one base unit in quote units.
    pub price: Decimal,
    /// OpenDEX assets.
    pub opendex: OpenDexAssets,
    /// Centralized venue balances.
    pub centralized: AssetBalances,
}

impl TradeInfo {
    /// Combine the latest values of the three sources.
    pub fn new(price: Decimal, opendex: OpenDexAssets, centralized: AssetBalances) -> Self {
        Self {
            price,
            opendex,
            centralized,
        }
    }

    /// Base asset quantity to sell on OpenDEX.
    ///
    /// Bounded by what OpenDEX can send, what the centralized quote balance
    /// can buy back, and what OpenDEX can receive in quote.
    pub fn base_order_size(&self) -> Decimal {
        if self.price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let hedge = div_saturating(self.centralized.quote, self.price);
        let inbound = div_saturating(self.opendex.quote.max_inbound, self.price);
        self.opendex
            .base
            .max_outbound
            .min(hedge)
            .min(inbound)
            .max(Decimal::ZERO)
    }

    /// Quote asset quantity to spend buying on OpenDEX.
    ///
    /// Bounded by what OpenDEX can send, what the centralized base balance
    /// can sell back, and what OpenDEX can receive in base.
    pub fn quote_order_size(&self) -> Decimal {
        if self.price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let hedge = mul_saturating(self.centralized.base, self.price);
        let inbound = mul_saturating(self.opendex.base.max_inbound, self.price);
        self.opendex
            .quote
            .max_outbound
            .min(hedge)
            .min(inbound)
            .max(Decimal::ZERO)
    }
}

fn div_saturating(lhs: Decimal, rhs: Decimal) -> Decimal {
    lhs.checked_div(rhs).unwrap_or(Decimal::MAX)
}

fn mul_saturating(lhs: Decimal, rhs: Decimal) -> Decimal {
    lhs.checked_mul(rhs).unwrap_or(Decimal::MAX)
}

/// Supplier of the most recent [`TradeInfo`].
///
/// The cycle keeps publishing while an attempt is in flight, so a reader
/// always sees the freshest value rather than the one that triggered it.
#[derive(Debug, Clone)]
pub struct LatestTradeInfo(watch::Receiver<TradeInfo>);

impl LatestTradeInfo {
    /// Wrap a receiver fed by the cycle.
    pub fn new(receiver: watch::Receiver<TradeInfo>) -> Self {
        Self(receiver)
    }

    /// A supplier that always returns `info`.
    pub fn fixed(info: TradeInfo) -> Self {
        let (_tx, rx) = watch::channel(info);
        Self(rx)
    }

    /// Current trade info.
    pub fn get(&self) -> TradeInfo {
        self.0.borrow().clone()
    }
}
