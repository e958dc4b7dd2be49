//! # Shipping Rate Table
//!
//! Flat shipping fee per region, with a default fee for everything else.
//!
//! ```text
//! ┌──────────────┬──────────┐
//! │ Region       │ Fee (₦)  │
//! ├──────────────┼──────────┤
//! │ Lagos        │   1,500  │
//! │ Ogun         │   2,000  │
//! │ Abuja        │   3,500  │
//! │ Rivers       │   4,000  │
//! │ (other/none) │   2,500  │
//! └──────────────┴──────────┘
//! ```
//!
//! Lookup never fails: an unknown or unselected region gets the default fee.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// One region → flat fee entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingZone {
    pub region: String,
    #[ts(type = "string")]
    pub fee: Money,
}

impl ShippingZone {
    pub fn new(region: impl Into<String>, fee: Money) -> Self {
        Self {
            region: region.into(),
            fee,
        }
    }

    fn matches(&self, region: &str) -> bool {
        self.region.trim().eq_ignore_ascii_case(region)
    }
}

/// Region → fee lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRateTable {
    pub zones: Vec<ShippingZone>,
    #[ts(type = "string")]
    pub default_fee: Money,
}

impl ShippingRateTable {
    /// Builds a table from explicit zones.
    pub fn new(zones: Vec<ShippingZone>, default_fee: Money) -> Self {
        Self { zones, default_fee }
    }

    /// The storefront's standard Nigerian zone table.
    pub fn standard() -> Self {
        Self::new(
            vec![
                ShippingZone::new("Lagos", Money::from_major(1_500)),
                ShippingZone::new("Ogun", Money::from_major(2_000)),
                ShippingZone::new("Abuja", Money::from_major(3_500)),
                ShippingZone::new("Rivers", Money::from_major(4_000)),
            ],
            Money::from_major(2_500),
        )
    }

    /// Fee for a region.
    ///
    /// Matching trims whitespace and ignores ASCII case. `None`, blank and
    /// unknown regions all resolve to [`default_fee`](Self::default_fee).
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::{Money, ShippingRateTable};
    ///
    /// let table = ShippingRateTable::standard();
    /// assert_eq!(table.lookup(Some("lagos ")), Money::from_major(1_500));
    /// assert_eq!(table.lookup(Some("Kano")), Money::from_major(2_500));
    /// assert_eq!(table.lookup(None), Money::from_major(2_500));
    /// ```
    pub fn lookup(&self, region: Option<&str>) -> Money {
        let Some(region) = region.map(str::trim).filter(|r| !r.is_empty()) else {
            return self.default_fee;
        };

        self.zones
            .iter()
            .find(|zone| zone.matches(region))
            .map(|zone| zone.fee)
            .unwrap_or(self.default_fee)
    }
}

impl Default for ShippingRateTable {
    fn default() -> Self {
        Self::standard()
    }
}
