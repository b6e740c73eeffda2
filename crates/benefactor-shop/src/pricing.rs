//! Cart Pricing
//!
//! "Any two for a flat price" bundle promotion. Units are ranked by price
//! and paired greedily from the top:
//!
//! ```text
//! units (desc):   $30  $28 | $25  $22 | $18
//!                 └─pair──┘  └─pair──┘   alone
//! charged:          $40        $40       $18   = $98 of $123
//! ```
//!
//! A pair that is already cheaper than the flat price is charged at its own
//! sum, so the discount can never turn into a surcharge.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use benefactor_records::{LineItem, OrderTotals, is_whole_cents};

use crate::error::{Result, ShopError};

/// Upper bound on units in one cart
pub const MAX_CART_UNITS: u64 = 500;

/// Bundle promotion settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlePolicy {
    /// Price charged for any two units
    pub pair_price: Decimal,
}

impl Default for BundlePolicy {
    fn default() -> Self {
        Self {
            pair_price: dec!(40),
        }
    }
}

impl BundlePolicy {
    pub fn new(pair_price: Decimal) -> Result<Self> {
        if pair_price <= Decimal::ZERO || !is_whole_cents(pair_price) {
            return Err(ShopError::InvalidBundlePrice(pair_price));
        }
        Ok(Self { pair_price })
    }

    pub fn price(&self, lines: &[LineItem]) -> Result<CartPricing> {
        price_cart(lines, self)
    }
}

/// Derived cart totals. Recomputed on every read, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPricing {
    pub subtotal: Decimal,
    pub bundle_discount: Decimal,
    pub total: Decimal,
    pub unit_count: usize,
    pub pair_count: usize,
}

impl CartPricing {
    pub fn has_discount(&self) -> bool {
        self.bundle_discount > Decimal::ZERO
    }

    pub const fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            bundle_discount: self.bundle_discount,
            total: self.total,
        }
    }
}

/// Drop empty lines and merge lines for the same product and variant.
///
/// The first occurrence wins for name and price.
pub fn normalize_lines(lines: Vec<LineItem>) -> Vec<LineItem> {
    let mut merged: Vec<LineItem> = Vec::with_capacity(lines.len());
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();

    for line in lines.into_iter().filter(|l| l.quantity > 0) {
        let key = (line.product_id.clone(), line.variant.clone());
        if let Some(&i) = index.get(&key) {
            merged[i].quantity = merged[i].quantity.saturating_add(line.quantity);
        } else {
            index.insert(key, merged.len());
            merged.push(line);
        }
    }
    merged
}

/// Price a cart under the bundle policy
pub fn price_cart(lines: &[LineItem], policy: &BundlePolicy) -> Result<CartPricing> {
    let unit_total: u64 = lines.iter().map(|l| u64::from(l.quantity)).sum();
    if unit_total > MAX_CART_UNITS {
        return Err(ShopError::CartTooLarge {
            units: unit_total,
            limit: MAX_CART_UNITS,
        });
    }

    let mut units: Vec<Decimal> = Vec::new();
    for line in lines {
        if line.unit_price < Decimal::ZERO {
            return Err(ShopError::InvalidLine(format!(
                "{} has a negative price",
                line.product_id
            )));
        }
        if !is_whole_cents(line.unit_price) {
            return Err(ShopError::InvalidLine(format!(
                "{} has a price with fractional cents",
                line.product_id
            )));
        }
        units.extend(std::iter::repeat_n(line.unit_price, line.quantity as usize));
    }
    units.sort_unstable_by(|a, b| b.cmp(a));

    let subtotal: Decimal = units.iter().sum();

    let mut charged = Decimal::ZERO;
    let mut pairs = units.chunks_exact(2);
    for pair in pairs.by_ref() {
        charged += (pair[0] + pair[1]).min(policy.pair_price);
    }
    if let [single] = pairs.remainder() {
        charged += *single;
    }

    // Whole-cent inputs keep every sum exact; no rounding needed.
    let raw_discount = subtotal - charged;
    let bundle_discount = if raw_discount > Decimal::ZERO {
        raw_discount
    } else {
        Decimal::ZERO
    };

    tracing::debug!(
        units = units.len(),
        %subtotal,
        %bundle_discount,
        "Priced cart"
    );

    Ok(CartPricing {
        subtotal,
        bundle_discount,
        total: subtotal - bundle_discount,
        unit_count: units.len(),
        pair_count: units.len() / 2,
    })
}
