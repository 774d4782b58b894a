//! Cart pricing.
//!
//! The backend stores one `orders` row per cart line and computes each
//! line's `total_price`. The order summary shown on the cart page (tax,
//! shipping, grand total) is computed here from those line totals.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::money::{Currency, Money};

/// Errors that can occur when building a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantities start at one; removing a line is a separate action.
    #[error("quantity must be at least {min}")]
    BelowMinimum {
        /// Smallest accepted quantity.
        min: u32,
    },
}

/// Number of units on a cart line. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const MIN: u32 = 1;

    /// # Errors
    ///
    /// Returns [`QuantityError::BelowMinimum`] for zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value < Self::MIN {
            return Err(QuantityError::BelowMinimum { min: Self::MIN });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// One more unit.
    #[must_use]
    pub const fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// One fewer unit.
    ///
    /// # Errors
    ///
    /// Fails when the line already holds a single unit.
    pub const fn decrement(self) -> Result<Self, QuantityError> {
        Self::new(self.0 - 1)
    }

    /// Whether the decrease button should be offered.
    #[must_use]
    pub const fn can_decrement(self) -> bool {
        self.0 > Self::MIN
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

/// Store-wide pricing rules for the order summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Fraction of the subtotal charged as tax (0.08 = 8%).
    pub tax_rate: Decimal,
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Decimal,
    /// Shipping charged at or below the threshold.
    pub flat_shipping: Decimal,
    pub currency: Currency,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Decimal::new(50, 0),
            flat_shipping: Decimal::new(999, 2),
            currency: Currency::Try,
        }
    }
}

/// The pricing-relevant part of one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub quantity: u32,
    /// Line total as computed by the backend.
    pub line_total: Decimal,
}

/// Totals shown next to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub item_count: u32,
    pub currency: Currency,
}

impl CartSummary {
    /// Compute the summary for a set of lines.
    ///
    /// An empty cart has all-zero totals rather than a lone shipping fee.
    #[must_use]
    pub fn compute(policy: &PricingPolicy, lines: &[CartLine]) -> Self {
        if lines.is_empty() {
            return Self::empty(policy.currency);
        }

        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
        let tax = (subtotal * policy.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let shipping = if subtotal > policy.free_shipping_threshold {
            Decimal::ZERO
        } else {
            policy.flat_shipping
        };
        let item_count = lines
            .iter()
            .fold(0_u32, |acc, l| acc.saturating_add(l.quantity));

        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
            item_count,
            currency: policy.currency,
        }
    }

    /// Summary for a cart with no lines.
    #[must_use]
    pub const fn empty(currency: Currency) -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
            total: Decimal::ZERO,
            item_count: 0,
            currency,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item_count == 0
    }

    /// True once the subtotal has crossed the free-shipping threshold.
    #[must_use]
    pub fn free_shipping_unlocked(&self) -> bool {
        self.shipping.is_zero() && self.subtotal > Decimal::ZERO
    }

    #[must_use]
    pub const fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(quantity: u32, total: &str) -> CartLine {
        CartLine {
            quantity,
            line_total: total.parse().unwrap(),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_small_cart_pays_flat_shipping() {
        let summary = CartSummary::compute(&PricingPolicy::default(), &[line(2, "20.00")]);
        assert_eq!(summary.subtotal, dec("20.00"));
        assert_eq!(summary.tax, dec("1.60"));
        assert_eq!(summary.shipping, dec("9.99"));
        assert_eq!(summary.total, dec("31.59"));
        assert_eq!(summary.item_count, 2);
        assert!(!summary.free_shipping_unlocked());
    }

    #[test]
    fn test_threshold_is_strictly_greater() {
        let policy = PricingPolicy::default();
        let at = CartSummary::compute(&policy, &[line(1, "50")]);
        assert_eq!(at.shipping, dec("9.99"));

        let above = CartSummary::compute(&policy, &[line(1, "30"), line(3, "20.01")]);
        assert_eq!(above.shipping, Decimal::ZERO);
        assert_eq!(above.item_count, 4);
        assert_eq!(above.total, dec("50.01") + dec("4.00"));
        assert!(above.free_shipping_unlocked());
    }

    #[test]
    fn test_tax_rounds_to_cents() {
        let summary = CartSummary::compute(&PricingPolicy::default(), &[line(1, "10.05")]);
        // 10.05 * 0.08 = 0.804
        assert_eq!(summary.tax, dec("0.80"));
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        let summary = CartSummary::compute(&PricingPolicy::default(), &[]);
        assert!(summary.is_empty());
        assert_eq!(summary.total, Decimal::ZERO);
        assert_eq!(summary.shipping, Decimal::ZERO);
        assert!(!summary.free_shipping_unlocked());
    }

    #[test]
    fn test_custom_policy() {
        let policy = PricingPolicy {
            tax_rate: dec("0.20"),
            free_shipping_threshold: dec("1000"),
            flat_shipping: dec("75"),
            currency: Currency::Try,
        };
        let summary = CartSummary::compute(&policy, &[line(1, "500")]);
        assert_eq!(summary.tax, dec("100"));
        assert_eq!(summary.total, dec("675"));
        assert_eq!(summary.money(summary.total).display(), "₺675.00");
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(
            Quantity::new(0),
            Err(QuantityError::BelowMinimum { min: 1 })
        );
        let one = Quantity::new(1).unwrap();
        assert!(!one.can_decrement());
        assert!(one.decrement().is_err());
        let two = one.increment();
        assert_eq!(two.get(), 2);
        assert_eq!(two.decrement().unwrap(), one);
    }

    #[test]
    fn test_quantity_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
    }
}
