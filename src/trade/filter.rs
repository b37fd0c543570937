//! Order-eligibility filter.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::asset::Asset;

/// Smallest quantity of `asset` worth placing an order for.
pub fn minimum_order_size(asset: Asset) -> Decimal {
    match asset {
        Asset::BTC => dec!(0.0001),
        Asset::ETH => dec!(0.005),
        Asset::DAI => dec!(1),
    }
}

/// Predicate accepting quantities of `asset` at or above its minimum.
pub fn should_create_order(asset: Asset) -> impl Fn(Decimal) -> bool {
    let minimum = minimum_order_size(asset);
    move |quantity| quantity >= minimum
}
