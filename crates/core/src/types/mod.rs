//! Core types for the LESE Metalcraft storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod comment;
pub mod email;
pub mod id;
pub mod list;
pub mod money;
pub mod rating;
pub mod status;

pub use cart::{CartLine, CartSummary, PricingPolicy, Quantity, QuantityError};
pub use comment::{CommentBody, CommentError};
pub use email::{Email, EmailError};
pub use id::*;
pub use list::{deserialize_list, deserialize_text, parse_list, split_csv_field};
pub use money::{Currency, Money, parse_amount, price_range_display, two_decimals};
pub use rating::{Rating, RatingError, StarState, star_states};
pub use status::{OrderStatus, OrderStatusError};
