//! Database functions called over `/rest/v1/rpc/<function>`.
//!
//! Every function answers with a JSON object carrying `success` and, on
//! failure, `error`. A `success: false` answer is surfaced as
//! [`BackendError::Rejected`] so handlers can show the message.

use lese_core::{OrderId, ProductId, Quantity, Rating, UserId};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;

use super::types::{
    AddToCartRequest, AddedToCart, CartItem, CheckoutResult, CommentAdded, LikeToggled,
    ProductDetails, QuantityUpdated, RatingSaved, UserOrder,
};
use super::{BackendClient, BackendError};

/// Page size for the cart listing.
const CART_PAGE_SIZE: u32 = 100;

/// Page size for the profile order history.
const ORDERS_PAGE_SIZE: u32 = 50;

/// Comments fetched with a product page.
pub const PRODUCT_COMMENTS_LIMIT: u32 = 20;

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

const fn default_success() -> bool {
    true
}

impl<T> RpcEnvelope<T> {
    fn into_result(self, function: &str) -> Result<T, BackendError> {
        if self.success {
            Ok(self.data)
        } else {
            let message = self.error.unwrap_or_else(|| "unknown error".to_string());
            tracing::warn!(function, error = %message, "Database function rejected call");
            Err(BackendError::Rejected(message))
        }
    }
}

/// Result of a set-returning function.
///
/// These functions answer with a bare array of rows. Older deployments wrap
/// the rows in an envelope under a function-specific key, so that shape is
/// still accepted.
#[derive(Deserialize)]
#[serde(untagged)]
enum RpcRows {
    Rows(Vec<serde_json::Value>),
    Envelope(RpcEnvelope<serde_json::Map<String, serde_json::Value>>),
    Null(()),
}

#[derive(Default, Deserialize)]
struct Nothing {}

impl BackendClient {
    /// Call a database function and unwrap its envelope.
    async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        params: serde_json::Value,
        access_token: Option<&str>,
    ) -> Result<T, BackendError> {
        let request = self
            .request(
                Method::POST,
                &format!("/rest/v1/rpc/{function}"),
                access_token,
            )
            .json(&params);

        let envelope: RpcEnvelope<T> = self.send_json(request).await?;
        envelope.into_result(function)
    }

    /// Call a set-returning database function.
    ///
    /// `key` names the array inside the legacy envelope shape.
    async fn rpc_rows<T: DeserializeOwned>(
        &self,
        function: &str,
        key: &str,
        params: serde_json::Value,
        access_token: &str,
    ) -> Result<Vec<T>, BackendError> {
        let request = self
            .request(
                Method::POST,
                &format!("/rest/v1/rpc/{function}"),
                Some(access_token),
            )
            .json(&params);

        let rows = match self.send_json::<RpcRows>(request).await? {
            RpcRows::Rows(rows) => rows,
            RpcRows::Null(()) => Vec::new(),
            RpcRows::Envelope(envelope) => {
                let mut data = envelope.into_result(function)?;
                match data.remove(key) {
                    Some(serde_json::Value::Array(rows)) => rows,
                    _ => Vec::new(),
                }
            }
        };

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| {
                tracing::error!(function, error = %e, "Failed to parse function rows");
                BackendError::Parse(e)
            })
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Items in the user's cart, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or is rejected.
    #[instrument(skip_all)]
    pub async fn get_cart_items(&self, access_token: &str) -> Result<Vec<CartItem>, BackendError> {
        self.rpc_rows(
            "get_cart_items",
            "items",
            json!({ "limit_count": CART_PAGE_SIZE, "offset_count": 0 }),
            access_token,
        )
        .await
    }

    /// Add a product to the cart, merging with an identical line.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Rejected` if the product is out of stock or
    /// unknown.
    #[instrument(skip(self, access_token), fields(product_id = %item.product_uuid))]
    pub async fn add_to_cart(
        &self,
        access_token: &str,
        item: &AddToCartRequest,
    ) -> Result<AddedToCart, BackendError> {
        self.rpc(
            "add_to_cart",
            serde_json::to_value(item)?,
            Some(access_token),
        )
        .await
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not belong to the user.
    #[instrument(skip(self, access_token))]
    pub async fn update_cart_item_quantity(
        &self,
        access_token: &str,
        order_id: OrderId,
        quantity: Quantity,
    ) -> Result<QuantityUpdated, BackendError> {
        self.rpc(
            "update_cart_item_quantity",
            json!({ "order_uuid": order_id, "new_quantity": quantity.get() }),
            Some(access_token),
        )
        .await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not belong to the user.
    #[instrument(skip(self, access_token))]
    pub async fn remove_cart_item(
        &self,
        access_token: &str,
        order_id: OrderId,
    ) -> Result<(), BackendError> {
        let _: Nothing = self
            .rpc(
                "remove_cart_item",
                json!({ "order_uuid": order_id }),
                Some(access_token),
            )
            .await?;
        Ok(())
    }

    /// Move every cart line to `pending`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Rejected` if the cart is empty.
    #[instrument(skip_all)]
    pub async fn checkout_cart(&self, access_token: &str) -> Result<CheckoutResult, BackendError> {
        self.rpc("checkout_cart", json!({}), Some(access_token))
            .await
    }

    /// The user's orders in every status, cart lines included, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or is rejected.
    #[instrument(skip_all)]
    pub async fn get_user_orders(&self, access_token: &str) -> Result<Vec<UserOrder>, BackendError> {
        self.rpc_rows(
            "get_user_orders",
            "orders",
            json!({ "limit_count": ORDERS_PAGE_SIZE, "offset_count": 0 }),
            access_token,
        )
        .await
    }

    // =========================================================================
    // Product page
    // =========================================================================

    /// Product with counters, comments and the viewer's interactions.
    ///
    /// Anonymous viewers pass `None` for both `access_token` and `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no product has this id.
    #[instrument(skip(self, access_token))]
    pub async fn get_product_with_details(
        &self,
        product_id: ProductId,
        user_id: Option<UserId>,
        access_token: Option<&str>,
    ) -> Result<ProductDetails, BackendError> {
        let details: ProductDetails = self
            .rpc(
                "get_product_with_details",
                json!({
                    "product_uuid": product_id,
                    "user_uuid": user_id,
                    "comments_limit": PRODUCT_COMMENTS_LIMIT,
                }),
                access_token,
            )
            .await?;

        if details.product.is_none() {
            return Err(BackendError::NotFound(format!("product {product_id}")));
        }
        Ok(details)
    }

    /// Like or unlike a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or is rejected.
    #[instrument(skip(self, access_token))]
    pub async fn toggle_product_like(
        &self,
        access_token: &str,
        product_id: ProductId,
    ) -> Result<LikeToggled, BackendError> {
        self.rpc(
            "toggle_product_like",
            json!({ "product_uuid": product_id }),
            Some(access_token),
        )
        .await
    }

    /// Set the user's rating for a product, replacing an earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or is rejected.
    #[instrument(skip(self, access_token))]
    pub async fn rate_product(
        &self,
        access_token: &str,
        product_id: ProductId,
        rating: Rating,
    ) -> Result<RatingSaved, BackendError> {
        self.rpc(
            "rate_product",
            json!({ "product_uuid": product_id, "rating_value": rating.get() }),
            Some(access_token),
        )
        .await
    }

    /// Post a comment on a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or is rejected.
    #[instrument(skip(self, access_token, text))]
    pub async fn add_product_comment(
        &self,
        access_token: &str,
        product_id: ProductId,
        text: &str,
    ) -> Result<CommentAdded, BackendError> {
        self.rpc(
            "add_product_comment",
            json!({ "product_uuid": product_id, "comment_text": text }),
            Some(access_token),
        )
        .await
    }
}
