//! LESE Core - Shared domain types for the LESE Metalcraft storefront.
//!
//! The storefront keeps no durable state of its own: products, orders,
//! likes, ratings, comments and profiles live in the managed backend. This
//! crate holds the small amount of logic that runs on our side of that
//! boundary:
//!
//! - cart pricing (tax, shipping threshold, totals)
//! - normalization of the backend's array-ish text columns
//! - validation of user input before it is sent upstream
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, money, emails, ratings and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
