//! OpenDEX order derivation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::asset::{Asset, AssetPair};
use crate::trade::TradeInfo;

/// Decimal places kept on order prices and quantities.
pub const ORDER_PRECISION: u32 = 8;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy base with quote.
    #[strum(serialize = "BUY", serialize = "buy")]
    Buy,
    /// Sell base for quote.
    #[strum(serialize = "SELL", serialize = "sell")]
    Sell,
}

/// Limit order to place on OpenDEX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDexOrder {
    /// Traded pair.
    pub pair: AssetPair,
    /// Order side.
    pub side: Side,
    /// Limit price in quote units.
    pub price: Decimal,
    /// Quantity in base units.
    pub quantity: Decimal,
}

impl OpenDexOrder {
    /// Asset and amount the order spends if filled.
    pub fn spend(&self) -> (Asset, Decimal) {
        match self.side {
            Side::Sell => (self.pair.base, self.quantity),
            Side::Buy => (
                self.pair.quote,
                self.quantity
                    .checked_mul(self.price)
                    .unwrap_or(Decimal::MAX),
            ),
        }
    }
}

/// The pair of orders derived from one [`TradeInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDexOrders {
    /// Order buying base below the centralized price.
    pub buy: OpenDexOrder,
    /// Order selling base above the centralized price.
    pub sell: OpenDexOrder,
}

impl IntoIterator for OpenDexOrders {
    type Item = OpenDexOrder;
    type IntoIter = std::array::IntoIter<OpenDexOrder, 2>;

    fn into_iter(self) -> Self::IntoIter {
        [self.sell, self.buy].into_iter()
    }
}

fn truncate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(ORDER_PRECISION, RoundingStrategy::ToZero)
}

/// Price both sides `margin` away from the centralized price and size them
/// from `info`.
pub fn trade_info_to_opendex_orders(
    info: &TradeInfo,
    pair: &AssetPair,
    margin: Decimal,
) -> OpenDexOrders {
    let sell_price = truncate(info.price * (Decimal::ONE + margin));
    let buy_price = truncate(info.price * (Decimal::ONE - margin));

    let sell_quantity = truncate(info.base_order_size());
    let buy_quantity = info
        .quote_order_size()
        .checked_div(buy_price)
        .map(truncate)
        .unwrap_or(Decimal::ZERO);

    OpenDexOrders {
        buy: OpenDexOrder {
            pair: *pair,
            side: Side::Buy,
            price: buy_price,
            quantity: buy_quantity,
        },
        sell: OpenDexOrder {
            pair: *pair,
            side: Side::Sell,
            price: sell_price,
            quantity: sell_quantity,
        },
    }
}
