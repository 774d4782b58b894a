//! Order status.
//!
//! A cart line and a placed order are the same `orders` row; the status
//! column says which one it is. Transitions are enforced by the backend, the
//! storefront only reads the value and offers the admin a fixed set of
//! targets.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown status.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid order status: {0}")]
pub struct OrderStatusError(pub String);

/// Lifecycle of an `orders` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Sitting in the customer's cart.
    Cart,
    /// Placed, waiting for the workshop.
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Statuses an admin may set from the orders table.
    pub const ADMIN_ASSIGNABLE: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cart => "Sepette",
            Self::Pending => "Beklemede",
            Self::Processing => "Hazırlanıyor",
            Self::Shipped => "Kargoda",
            Self::Delivered => "Teslim Edildi",
            Self::Cancelled => "İptal Edildi",
        }
    }

    /// CSS modifier for the status badge.
    #[must_use]
    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Cart => "badge--neutral",
            Self::Pending => "badge--warning",
            Self::Processing => "badge--info",
            Self::Shipped => "badge--accent",
            Self::Delivered => "badge--success",
            Self::Cancelled => "badge--danger",
        }
    }

    #[must_use]
    pub const fn is_in_cart(self) -> bool {
        matches!(self, Self::Cart)
    }

    /// Placed but not yet delivered (cancelled orders stay visible here).
    #[must_use]
    pub const fn is_tracking(self) -> bool {
        !matches!(self, Self::Cart | Self::Delivered)
    }

    #[must_use]
    pub fn is_admin_assignable(self) -> bool {
        Self::ADMIN_ASSIGNABLE.contains(&self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cart" => Ok(Self::Cart),
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(OrderStatusError(s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_lenient_about_case_and_spelling() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!(
            "canceled".parse::<OrderStatus>().unwrap(),
            OrderStatus::Cancelled
        );
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_display_matches_column_values() {
        for status in OrderStatus::ADMIN_ASSIGNABLE {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(OrderStatus::Cart.to_string(), "cart");
    }

    #[test]
    fn test_grouping() {
        assert!(OrderStatus::Cart.is_in_cart());
        assert!(!OrderStatus::Cart.is_tracking());
        assert!(!OrderStatus::Delivered.is_tracking());
        assert!(OrderStatus::Processing.is_tracking());
        assert!(OrderStatus::Cancelled.is_tracking());
    }

    #[test]
    fn test_cart_is_not_admin_assignable() {
        assert!(!OrderStatus::Cart.is_admin_assignable());
        assert!(OrderStatus::Cancelled.is_admin_assignable());
    }

    #[test]
    fn test_serde_snake_case() {
        let s: OrderStatus = serde_json::from_str("\"delivered\"").unwrap();
        assert_eq!(s, OrderStatus::Delivered);
        assert_eq!(serde_json::to_string(&OrderStatus::Pending).unwrap(), "\"pending\"");
    }
}
