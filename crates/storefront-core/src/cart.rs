//! Cart helpers shared by the advisory pre-check and the coordinator commit.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::types::CartLine;
use crate::validation::validate_quantity;
use crate::MAX_CART_ITEMS;

/// Sums quantities per product id.
///
/// Variant lines (same product, different size/color) collapse into one
/// entry. The map is ordered by product id, which is also the order the
/// stock ledger debits in.
///
/// ## Example
/// ```rust
/// use storefront_core::{cart::group_quantities, CartLine, Money};
///
/// let line = |id: &str, qty| CartLine {
///     product_id: id.into(),
///     name: id.into(),
///     unit_price_snapshot: Money::from_major(100),
///     quantity: qty,
///     size: None,
///     color: None,
/// };
/// let grouped = group_quantities(&[line("b", 1), line("a", 2), line("b", 3)]);
/// assert_eq!(grouped["a"], 2);
/// assert_eq!(grouped["b"], 4);
/// assert_eq!(grouped.keys().map(String::as_str).collect::<Vec<_>>(), ["a", "b"]);
/// ```
pub fn group_quantities(lines: &[CartLine]) -> BTreeMap<String, i64> {
    let mut grouped = BTreeMap::new();
    for line in lines {
        *grouped.entry(line.product_id.clone()).or_insert(0) += line.quantity;
    }
    grouped
}

/// Checks cart shape before anything is priced or debited.
///
/// ## Rules
/// - at least one line
/// - at most [`MAX_CART_ITEMS`] lines
/// - every quantity in `1..=MAX_ITEM_QUANTITY`
/// - every line names a product
pub fn validate_cart(lines: &[CartLine]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    if lines.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(crate::error::ValidationError::Required {
                field: "productId".to_string(),
            }
            .into());
        }
        validate_quantity(line.quantity)?;
    }

    Ok(())
}
