//! # Pricing Engine
//!
//! Turns priced lines, a coupon rate and a shipping region into a total.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = Σ unit_price × quantity                                     │
//! │  discount = subtotal × discount_rate                                    │
//! │  shipping = ShippingRateTable.lookup(region)                            │
//! │  tax      = (subtotal − discount) × tax_rate                            │
//! │  total    = subtotal − discount + shipping + tax                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is a pure function of its inputs. It never looks at where the
//! unit prices came from: the coordinator feeds it catalog prices, the
//! checkout session feeds it cart snapshots for the on-screen estimate.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::{Money, Rate};
use crate::shipping::ShippingRateTable;
use crate::types::CartLine;

/// Default VAT: 7.5%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 750;

/// A line ready to be priced.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl PricedLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Result of a pricing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    #[ts(type = "string")]
    pub subtotal: Money,
    #[ts(type = "string")]
    pub discount: Money,
    #[ts(type = "string")]
    pub shipping: Money,
    #[ts(type = "string")]
    pub tax: Money,
    #[ts(type = "string")]
    pub total: Money,
}

impl PriceBreakdown {
    /// Amount to hand the payment gateway, in kobo, rounded up.
    pub fn amount_due_minor_units(&self) -> CoreResult<i64> {
        self.total.to_minor_units_ceil()
    }
}

/// Stateless pricing rules: a tax rate and a shipping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingEngine {
    tax_rate: Rate,
    shipping: ShippingRateTable,
}

impl PricingEngine {
    pub fn new(tax_rate: Rate, shipping: ShippingRateTable) -> Self {
        Self { tax_rate, shipping }
    }

    pub fn tax_rate(&self) -> Rate {
        self.tax_rate
    }

    pub fn shipping_table(&self) -> &ShippingRateTable {
        &self.shipping
    }

    /// Shipping fee for a region (default fee when unmatched).
    pub fn shipping_fee(&self, region: Option<&str>) -> Money {
        self.shipping.lookup(region)
    }

    /// Prices a set of lines.
    ///
    /// ## Arguments
    /// * `lines` - lines with resolved unit prices
    /// * `discount_rate` - coupon rate, `Rate::zero()` when none applies
    /// * `region` - shipping region, `None` when unselected
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use storefront_core::money::{Money, Rate};
    /// use storefront_core::pricing::{PricedLine, PricingEngine};
    ///
    /// let engine = PricingEngine::default();
    /// let lines = [PricedLine {
    ///     product_id: "p1".into(),
    ///     unit_price: Money::from_major(5_000),
    ///     quantity: 2,
    /// }];
    /// let quote = engine.quote(&lines, Rate::from_percentage(Decimal::from(10)), Some("Lagos"));
    ///
    /// assert_eq!(quote.subtotal, Money::from_major(10_000));
    /// assert_eq!(quote.discount, Money::from_major(1_000));
    /// assert_eq!(quote.tax, Money::from_major(675));
    /// assert_eq!(quote.total, Money::from_major(11_175));
    /// ```
    pub fn quote(&self, lines: &[PricedLine], discount_rate: Rate, region: Option<&str>) -> PriceBreakdown {
        let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
        let discount = subtotal.apply_rate(discount_rate);
        let shipping = self.shipping.lookup(region);
        let tax = (subtotal - discount).apply_rate(self.tax_rate);
        let total = subtotal - discount + shipping + tax;

        PriceBreakdown {
            subtotal,
            discount,
            shipping,
            tax,
            total,
        }
    }

    /// On-screen estimate from cart snapshot prices.
    ///
    /// Display only. The committed total is always recomputed from catalog
    /// prices by the coordinator.
    pub fn estimate(&self, cart: &[CartLine], discount_rate: Rate, region: Option<&str>) -> PriceBreakdown {
        let lines: Vec<PricedLine> = cart
            .iter()
            .map(|line| PricedLine {
                product_id: line.product_id.clone(),
                unit_price: line.unit_price_snapshot,
                quantity: line.quantity,
            })
            .collect();
        self.quote(&lines, discount_rate, region)
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(Rate::from_bps(DEFAULT_TAX_RATE_BPS), ShippingRateTable::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn priced(id: &str, price: Money, qty: i64) -> PricedLine {
        PricedLine {
            product_id: id.into(),
            unit_price: price,
            quantity: qty,
        }
    }

    #[test]
    fn test_ten_percent_coupon_on_ten_thousand() {
        let engine = PricingEngine::default();
        let quote = engine.quote(
            &[priced("p1", Money::from_major(10_000), 1)],
            Rate::from_percentage(dec!(10)),
            Some("Lagos"),
        );

        assert_eq!(quote.subtotal, Money::from_major(10_000));
        assert_eq!(quote.discount, Money::from_major(1_000));
        // tax on the discounted 9,000
        assert_eq!(quote.tax, Money::from_major(675));
        assert_eq!(quote.shipping, Money::from_major(1_500));
        assert_eq!(quote.total, Money::from_major(11_175));
    }

    #[test]
    fn test_no_coupon_unknown_region() {
        let engine = PricingEngine::default();
        let quote = engine.quote(
            &[priced("p1", Money::from_major(2_000), 2), priced("p2", Money::from_major(500), 3)],
            Rate::zero(),
            Some("Kaduna"),
        );

        assert_eq!(quote.subtotal, Money::from_major(5_500));
        assert!(quote.discount.is_zero());
        assert_eq!(quote.shipping, Money::from_major(2_500));
        assert_eq!(quote.tax.amount(), dec!(412.5));
        assert_eq!(quote.total.amount(), dec!(8412.5));
    }

    #[test]
    fn test_gateway_amount_rounds_up() {
        let engine = PricingEngine::new(Rate::from_bps(750), ShippingRateTable::standard());
        let quote = engine.quote(
            &[priced("p1", Money::new(dec!(999.99)), 1)],
            Rate::zero(),
            Some("Lagos"),
        );
        // 999.99 + 74.99925 + 1500 = 2574.98925
        assert_eq!(quote.total.amount(), dec!(2574.98925));
        assert_eq!(quote.amount_due_minor_units().unwrap(), 257_499);
    }

    #[test]
    fn test_estimate_uses_snapshots() {
        let engine = PricingEngine::default();
        let cart = [CartLine {
            product_id: "p1".into(),
            name: "Ankara Dress".into(),
            unit_price_snapshot: Money::from_major(8_000),
            quantity: 1,
            size: Some("M".into()),
            color: None,
        }];
        let estimate = engine.estimate(&cart, Rate::zero(), None);
        assert_eq!(estimate.subtotal, Money::from_major(8_000));
        assert_eq!(estimate.shipping, Money::from_major(2_500));
    }

    #[test]
    fn test_empty_lines_cost_only_shipping() {
        let quote = PricingEngine::default().quote(&[], Rate::zero(), Some("Abuja"));
        assert_eq!(quote.total, Money::from_major(3_500));
    }
}
