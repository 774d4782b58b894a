//! End-to-end tests for the LESE storefront.
//!
//! The tests drive a running storefront over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p lese-storefront &
//! STOREFRONT_BASE_URL=http://localhost:3000 \
//! TEST_USER_EMAIL=test@example.com TEST_USER_PASSWORD=secret123 \
//!     cargo test -p lese-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `storefront_public` - pages and guards that need no account
//! - `storefront_account` - sign-in, cart, checkout and profile with a test user

use reqwest::{Client, Response, redirect::Policy};

/// Storefront under test (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that keeps cookies and does not follow redirects, so tests can
/// assert on `Location` headers.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Credentials of a pre-registered test account, if configured.
#[must_use]
pub fn test_credentials() -> Option<(String, String)> {
    let email = std::env::var("TEST_USER_EMAIL").ok()?;
    let password = std::env::var("TEST_USER_PASSWORD").ok()?;
    Some((email, password))
}

/// `Location` header of a redirect response.
#[must_use]
pub fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
