//! Asset specification and venue formatting rules.
//!
//! Prices sent to the venue are limited to `PRICE_SIG_FIGS` significant
//! figures and to an asset-specific number of decimals; sizes are limited to
//! the asset's `sz_decimals`.

use crate::{Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum significant figures accepted in an order price.
pub const PRICE_SIG_FIGS: u32 = 5;

/// Asset ids at or above this value are spot instruments.
pub const SPOT_ASSET_ID_OFFSET: u32 = 10_000;

const PERP_MAX_DECIMALS: u32 = 6;
const SPOT_MAX_DECIMALS: u32 = 8;

/// Venue metadata for a single tradeable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Symbol (e.g., "BTC").
    pub name: String,

    /// Venue asset id used in order actions.
    pub asset_id: u32,

    /// Size decimals (szDecimals). Minimum increment is 10^(-sz_decimals).
    pub sz_decimals: u32,
}

impl AssetSpec {
    pub fn new(name: impl Into<String>, asset_id: u32, sz_decimals: u32) -> Self {
        Self {
            name: name.into(),
            asset_id,
            sz_decimals,
        }
    }

    pub fn is_spot(&self) -> bool {
        self.asset_id >= SPOT_ASSET_ID_OFFSET
    }

    /// Maximum decimals allowed in a price for this asset.
    pub fn price_decimals(&self) -> u32 {
        let max = if self.is_spot() {
            SPOT_MAX_DECIMALS
        } else {
            PERP_MAX_DECIMALS
        };
        max.saturating_sub(self.sz_decimals)
    }

    /// Smallest tradeable size: 10^(-sz_decimals).
    pub fn min_size(&self) -> Size {
        Size::new(Decimal::new(1, self.sz_decimals))
    }

    /// Round a price to the venue's significant-figure and decimal limits.
    pub fn round_price(&self, price: Price) -> Price {
        let by_sig_figs = round_to_sig_figs(price.inner(), PRICE_SIG_FIGS);
        Price::new(by_sig_figs.round_dp(self.price_decimals()))
    }

    /// Round a size to the asset's size precision.
    pub fn round_size(&self, size: Size) -> Size {
        size.round_dp(self.sz_decimals)
    }

    /// Wire representation of a price (rounded, trailing zeros stripped).
    pub fn format_price(&self, price: Price) -> String {
        to_wire_string(self.round_price(price).inner())
    }

    /// Wire representation of a size (rounded, trailing zeros stripped).
    pub fn format_size(&self, size: Size) -> String {
        to_wire_string(self.round_size(size).inner())
    }
}

/// Round a Decimal to N significant figures.
fn round_to_sig_figs(value: Decimal, sig_figs: u32) -> Decimal {
    if value.is_zero() || sig_figs == 0 {
        return Decimal::ZERO;
    }

    // 12345 -> 4, 1234.5 -> 3, 0.00123 -> -3
    let magnitude = calculate_magnitude(value.abs());
    let scale = sig_figs as i32 - magnitude - 1;

    if scale >= 0 {
        value.round_dp(scale as u32)
    } else {
        let factor = Decimal::from(10i64.pow((-scale) as u32));
        (value / factor).round() * factor
    }
}

/// Order of magnitude of a positive decimal.
fn calculate_magnitude(value: Decimal) -> i32 {
    let int_part = value.trunc();
    if !int_part.is_zero() {
        return int_part.to_string().len() as i32 - 1;
    }

    let fraction = value.normalize().to_string();
    let digits = fraction.split('.').nth(1).unwrap_or("");
    let leading_zeros = digits.chars().take_while(|c| *c == '0').count() as i32;
    -(leading_zeros + 1)
}

fn to_wire_string(value: Decimal) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_magnitude() {
        assert_eq!(calculate_magnitude(dec!(12345)), 4);
        assert_eq!(calculate_magnitude(dec!(1234.5)), 3);
        assert_eq!(calculate_magnitude(dec!(0.123)), -1);
        assert_eq!(calculate_magnitude(dec!(0.00123)), -3);
    }

    #[test]
    fn test_perp_price_decimals() {
        let btc = AssetSpec::new("BTC", 0, 5);
        assert!(!btc.is_spot());
        assert_eq!(btc.price_decimals(), 1);

        let doge = AssetSpec::new("DOGE", 12, 0);
        assert_eq!(doge.price_decimals(), 6);
    }

    #[test]
    fn test_spot_price_decimals() {
        let spot = AssetSpec::new("PURR/USDC", 10_000, 0);
        assert!(spot.is_spot());
        assert_eq!(spot.price_decimals(), 8);
    }

    #[test]
    fn test_round_price_sig_figs() {
        let btc = AssetSpec::new("BTC", 0, 5);
        // 5 significant figures wins over 1 decimal
        assert_eq!(btc.round_price(Price::new(dec!(97123.46))).inner(), dec!(97123));
        assert_eq!(btc.format_price(Price::new(dec!(123456.7))), "123460");
    }

    #[test]
    fn test_round_price_decimals() {
        let eth = AssetSpec::new("ETH", 1, 4);
        // 5 sig figs would keep 1891.4, but only 2 decimals allowed anyway
        assert_eq!(eth.round_price(Price::new(dec!(1891.437))).inner(), dec!(1891.4));

        let small = AssetSpec::new("PEPE", 40, 0);
        assert_eq!(
            small.round_price(Price::new(dec!(0.0000123456))).inner(),
            dec!(0.000012)
        );
    }

    #[test]
    fn test_min_size_and_rounding() {
        let eth = AssetSpec::new("ETH", 1, 4);
        assert_eq!(eth.min_size().inner(), dec!(0.0001));
        assert_eq!(eth.round_size(Size::new(dec!(0.123456))).inner(), dec!(0.1235));
        assert_eq!(eth.format_size(Size::new(dec!(1.50000))), "1.5");

        let whole = AssetSpec::new("DOGE", 12, 0);
        assert_eq!(whole.min_size().inner(), dec!(1));
    }

    #[test]
    fn test_format_zero() {
        let eth = AssetSpec::new("ETH", 1, 4);
        assert_eq!(eth.format_size(Size::ZERO), "0");
    }
}
