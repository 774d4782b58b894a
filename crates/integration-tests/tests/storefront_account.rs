//! Signed-in flows: sign-in, cart, checkout and profile.
//!
//! These tests require:
//! - A running storefront connected to its backend
//! - A confirmed test account in `TEST_USER_EMAIL` / `TEST_USER_PASSWORD`
//! - At least one product in stock
//!
//! Checkout places a real pending order for the test account.

#![allow(clippy::unwrap_used)]

use lese_core::OrderStatus;
use lese_integration_tests::{base_url, client, location, test_credentials};
use reqwest::{Client, StatusCode};

/// Sign in with the test account, returning a client holding the session.
async fn signed_in_client() -> Client {
    let (email, password) = test_credentials().expect("TEST_USER_EMAIL and TEST_USER_PASSWORD must be set");
    let client = client();

    let resp = client
        .post(format!("{}/auth/login", base_url()))
        .form(&[("email", email.as_str()), ("password", password.as_str()), ("next", "/profile")])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp).as_deref(), Some("/profile"));
    client
}

/// First product id linked from the shop page.
async fn first_product_id(client: &Client) -> String {
    let body = client
        .get(format!("{}/shop", base_url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    body.split("href=\"/shop/")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .find(|id| uuid::Uuid::parse_str(id).is_ok())
        .map(String::from)
        .expect("shop page should link at least one product")
}

#[tokio::test]
#[ignore = "Requires running storefront and test credentials"]
async fn test_wrong_password_is_rejected() {
    let (email, _) = test_credentials().unwrap();
    let resp = client()
        .post(format!("{}/auth/login", base_url()))
        .form(&[("email", email.as_str()), ("password", "definitely-wrong")])
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert!(location(&resp).unwrap().contains("error=credentials"));
}

#[tokio::test]
#[ignore = "Requires running storefront and test credentials"]
async fn test_cart_add_update_remove() {
    let client = signed_in_client().await;
    let base = base_url();
    let product_id = first_product_id(&client).await;

    let added = client
        .post(format!("{base}/cart/add"))
        .header("HX-Request", "true")
        .form(&[("product_id", product_id.as_str()), ("quantity", "2")])
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), StatusCode::OK);
    assert_eq!(added.headers().get("HX-Trigger").unwrap(), "cart-updated");
    assert!(added.text().await.unwrap().contains("cart-count"));

    let cart = client.get(format!("{base}/cart")).send().await.unwrap();
    assert_eq!(cart.status(), StatusCode::OK);
    let body = cart.text().await.unwrap();
    assert!(body.contains("cart-item"));

    // Every line carries its order id in the remove form
    let order_ids: Vec<String> = body
        .split("name=\"order_id\" value=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(String::from)
        .collect();
    assert!(!order_ids.is_empty());

    for order_id in order_ids {
        let removed = client
            .post(format!("{base}/cart/remove"))
            .header("HX-Request", "true")
            .form(&[("order_id", order_id.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(removed.status(), StatusCode::OK);
    }

    let count = client.get(format!("{base}/cart/count")).send().await.unwrap();
    assert!(!count.text().await.unwrap().contains("cart-count"));
}

#[tokio::test]
#[ignore = "Requires running storefront and test credentials; places an order"]
async fn test_checkout_creates_pending_order() {
    let client = signed_in_client().await;
    let base = base_url();
    let product_id = first_product_id(&client).await;

    let added = client
        .post(format!("{base}/cart/add"))
        .form(&[("product_id", product_id.as_str()), ("quantity", "1")])
        .send()
        .await
        .unwrap();
    assert!(location(&added).unwrap().contains("notice=added_to_cart"));

    let checkout = client.post(format!("{base}/checkout")).send().await.unwrap();
    assert_eq!(
        location(&checkout).as_deref(),
        Some("/profile?notice=order_placed")
    );

    let profile = client
        .get(format!("{base}/profile"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(profile.contains(OrderStatus::Pending.label()));
}

#[tokio::test]
#[ignore = "Requires running storefront and test credentials"]
async fn test_logout_ends_session() {
    let client = signed_in_client().await;
    let base = base_url();

    let logout = client.post(format!("{base}/auth/logout")).send().await.unwrap();
    assert_eq!(location(&logout).as_deref(), Some("/?notice=signed_out"));

    let cart = client.get(format!("{base}/cart")).send().await.unwrap();
    assert!(cart.status().is_redirection());
}
