//! Type-safe money representation using decimal arithmetic.
//!
//! Prices come out of the backend in two shapes: numeric columns on views
//! (`product_views.price`, `order_views.total_with_tax`) and loose text
//! options on products (`products.price` is a text array such as
//! `{"120.00","180"}`). [`parse_amount`] turns the latter into decimals.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currencies the storefront can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Turkish lira.
    #[default]
    Try,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
}

impl Currency {
    /// Display symbol, prefixed to amounts.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Try => "₺",
            Self::Usd => "$",
            Self::Eur => "€",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Try => "TRY",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRY" => Ok(Self::Try),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// An amount in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Format for display with two decimals, e.g. `₺29.99`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{}", self.currency.symbol(), two_decimals(self.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Render a decimal rounded to cents with exactly two fraction digits.
#[must_use]
pub fn two_decimals(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Extract a decimal amount from loosely formatted price text.
///
/// Currency symbols, spaces and other decoration are ignored; `.` is the
/// decimal separator. Returns `None` when no number can be recovered.
///
/// ```
/// use lese_core::parse_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_amount("₺ 120.50"), Some(Decimal::new(12050, 2)));
/// assert_eq!(parse_amount("25$"), Some(Decimal::new(25, 0)));
/// assert_eq!(parse_amount("call us"), None);
/// ```
#[must_use]
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<Decimal>().ok()
}

/// Summarize a product's price options for listings.
///
/// One recognizable price is shown as-is, several as `min - max`, none as
/// zero. Options that cannot be parsed are skipped.
#[must_use]
pub fn price_range_display<S: AsRef<str>>(prices: &[S], currency: Currency) -> String {
    let amounts: Vec<Decimal> = prices
        .iter()
        .filter_map(|p| parse_amount(p.as_ref()))
        .collect();

    let min = amounts.iter().min().copied();
    let max = amounts.iter().max().copied();
    match (min, max) {
        (Some(min), Some(max)) if amounts.len() > 1 && min != max => format!(
            "{} - {}",
            Money::new(min, currency),
            Money::new(max, currency)
        ),
        (Some(single), _) => Money::new(single, currency).display(),
        _ => Money::zero(currency).display(),
    }
}
