//! Table and view access over `/rest/v1/<table>`.

use std::sync::Arc;

use lese_core::{OrderId, OrderStatus, ProductId, UserId};
use reqwest::{Method, RequestBuilder};
use serde_json::json;
use tracing::instrument;

use super::types::{
    LikedProductRow, OrderViewRow, ProductInput, ProductRecord, ProductSummary, Profile,
    ProfileUpdate,
};
use super::{BackendClient, BackendError, CacheValue};

const SUMMARIES_CACHE_KEY: &str = "product_views";

/// Accept header asking PostgREST for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

fn admin_cache_key(user_id: UserId) -> String {
    format!("admin:{user_id}")
}

/// Ask PostgREST to return the written rows.
fn returning(request: RequestBuilder) -> RequestBuilder {
    request.header("Prefer", "return=representation")
}

fn single(request: RequestBuilder) -> RequestBuilder {
    request.header("Accept", SINGLE_OBJECT)
}

impl BackendClient {
    // =========================================================================
    // Catalog
    // =========================================================================

    /// All products from the `product_views` view, newest first. Cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the view cannot be read.
    #[instrument(skip(self))]
    pub async fn list_product_summaries(&self) -> Result<Arc<Vec<ProductSummary>>, BackendError> {
        if let Some(CacheValue::Summaries(summaries)) =
            self.inner.cache.get(SUMMARIES_CACHE_KEY).await
        {
            tracing::debug!("Cache hit for product summaries");
            return Ok(summaries);
        }

        let request = self.request(
            Method::GET,
            "/rest/v1/product_views?select=*&order=date_published.desc.nullslast",
            None,
        );
        let summaries: Vec<ProductSummary> = self.send_json(request).await?;
        let summaries = Arc::new(summaries);

        self.inner
            .cache
            .insert(
                SUMMARIES_CACHE_KEY.to_string(),
                CacheValue::Summaries(Arc::clone(&summaries)),
            )
            .await;

        Ok(summaries)
    }

    /// Drop cached catalog data after a product write.
    pub async fn invalidate_catalog(&self) {
        self.inner.cache.invalidate(SUMMARIES_CACHE_KEY).await;
    }

    /// All product rows for the admin table, by `sort_order` then newest.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    #[instrument(skip(self, access_token))]
    pub async fn list_products(
        &self,
        access_token: &str,
    ) -> Result<Vec<ProductRecord>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/products?select=*&order=sort_order.desc,created_at.desc",
            Some(access_token),
        );
        self.send_json(request).await
    }

    /// A single product row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no product has this id.
    #[instrument(skip(self, access_token))]
    pub async fn get_product(
        &self,
        access_token: &str,
        id: ProductId,
    ) -> Result<ProductRecord, BackendError> {
        let request = single(self.request(
            Method::GET,
            &format!("/rest/v1/products?select=*&id=eq.{id}"),
            Some(access_token),
        ));
        self.send_json(request).await
    }

    /// Insert a product and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is refused.
    #[instrument(skip(self, access_token, input), fields(title = %input.title))]
    pub async fn create_product(
        &self,
        access_token: &str,
        input: &ProductInput,
    ) -> Result<ProductRecord, BackendError> {
        let request = single(returning(self.request(
            Method::POST,
            "/rest/v1/products",
            Some(access_token),
        )))
        .json(input);

        let product: ProductRecord = self.send_json(request).await?;
        self.invalidate_catalog().await;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Overwrite a product's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no product has this id.
    #[instrument(skip(self, access_token, input))]
    pub async fn update_product(
        &self,
        access_token: &str,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<ProductRecord, BackendError> {
        let request = single(returning(self.request(
            Method::PATCH,
            &format!("/rest/v1/products?id=eq.{id}"),
            Some(access_token),
        )))
        .json(input);

        let product = self.send_json(request).await?;
        self.invalidate_catalog().await;
        Ok(product)
    }

    /// Replace a product's image list.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is refused.
    #[instrument(skip(self, access_token, images))]
    pub async fn set_product_images(
        &self,
        access_token: &str,
        id: ProductId,
        images: &[String],
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::PATCH,
                &format!("/rest/v1/products?id=eq.{id}"),
                Some(access_token),
            )
            .json(&json!({ "images": images }));

        self.send_empty(request).await?;
        self.invalidate_catalog().await;
        Ok(())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is refused.
    #[instrument(skip(self, access_token))]
    pub async fn delete_product(
        &self,
        access_token: &str,
        id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/rest/v1/products?id=eq.{id}"),
            Some(access_token),
        );
        self.send_empty(request).await?;
        self.invalidate_catalog().await;
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Admins
    // =========================================================================

    /// Whether the user has a row in `admins`. Cached per user.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    #[instrument(skip(self, access_token))]
    pub async fn is_admin(&self, access_token: &str, user_id: UserId) -> Result<bool, BackendError> {
        let key = admin_cache_key(user_id);
        if let Some(CacheValue::Admin(is_admin)) = self.inner.cache.get(&key).await {
            return Ok(is_admin);
        }

        let request = self.request(
            Method::GET,
            &format!("/rest/v1/admins?select=user_id&user_id=eq.{user_id}&limit=1"),
            Some(access_token),
        );
        let rows: Vec<serde_json::Value> = self.send_json(request).await?;
        let is_admin = !rows.is_empty();

        self.inner.cache.insert(key, CacheValue::Admin(is_admin)).await;
        Ok(is_admin)
    }

    // =========================================================================
    // Profiles & likes
    // =========================================================================

    /// The user's profile row, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    #[instrument(skip(self, access_token))]
    pub async fn get_profile(
        &self,
        access_token: &str,
        user_id: UserId,
    ) -> Result<Option<Profile>, BackendError> {
        let request = single(self.request(
            Method::GET,
            &format!("/rest/v1/profiles?select=*&id=eq.{user_id}"),
            Some(access_token),
        ));
        match self.send_json(request).await {
            Ok(profile) => Ok(Some(profile)),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Update the user's display name and avatar.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the user has no profile row.
    #[instrument(skip(self, access_token, update))]
    pub async fn update_profile(
        &self,
        access_token: &str,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, BackendError> {
        let request = single(returning(self.request(
            Method::PATCH,
            &format!("/rest/v1/profiles?id=eq.{user_id}"),
            Some(access_token),
        )))
        .json(update);
        self.send_json(request).await
    }

    /// Products the user liked, newest like first.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    #[instrument(skip(self, access_token))]
    pub async fn list_liked_products(
        &self,
        access_token: &str,
        user_id: UserId,
    ) -> Result<Vec<LikedProductRow>, BackendError> {
        let request = self.request(
            Method::GET,
            &format!(
                "/rest/v1/likes?\
                select=id,created_at,products:product_id(id,title,price,images,category)&\
                user_id=eq.{user_id}&\
                order=created_at.desc"
            ),
            Some(access_token),
        );
        self.send_json(request).await
    }

    /// Remove one of the user's likes.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is refused.
    #[instrument(skip(self, access_token))]
    pub async fn unlike_product(
        &self,
        access_token: &str,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/rest/v1/likes?user_id=eq.{user_id}&product_id=eq.{product_id}"),
            Some(access_token),
        );
        self.send_empty(request).await
    }

    /// Delete a line from the user's cart. Lines past checkout are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is refused.
    #[instrument(skip(self, access_token))]
    pub async fn delete_cart_order(
        &self,
        access_token: &str,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/rest/v1/orders?id=eq.{order_id}&user_id=eq.{user_id}&status=eq.cart"),
            Some(access_token),
        );
        self.send_empty(request).await
    }

    // =========================================================================
    // Admin orders
    // =========================================================================

    /// Every row of the `order_views` view, cart lines included, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the view cannot be read.
    #[instrument(skip(self, access_token))]
    pub async fn list_order_views(
        &self,
        access_token: &str,
    ) -> Result<Vec<OrderViewRow>, BackendError> {
        let request = self.request(
            Method::GET,
            "/rest/v1/order_views?select=*&order=order_timestamp.desc",
            Some(access_token),
        );
        self.send_json(request).await
    }

    /// Set an order's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is refused.
    #[instrument(skip(self, access_token))]
    pub async fn update_order_status(
        &self,
        access_token: &str,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        let request = self
            .request(
                Method::PATCH,
                &format!("/rest/v1/orders?id=eq.{order_id}"),
                Some(access_token),
            )
            .json(&json!({ "status": status }));

        self.send_empty(request).await?;
        tracing::info!(order_id = %order_id, status = %status, "Order status updated");
        Ok(())
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is refused.
    #[instrument(skip(self, access_token))]
    pub async fn delete_order(
        &self,
        access_token: &str,
        order_id: OrderId,
    ) -> Result<(), BackendError> {
        let request = self.request(
            Method::DELETE,
            &format!("/rest/v1/orders?id=eq.{order_id}"),
            Some(access_token),
        );
        self.send_empty(request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::backend::test_support::{USER_TOKEN, client_for};

    const PRODUCT_ID: &str = "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b";
    const USER_ID: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

    fn summary_row() -> serde_json::Value {
        json!({
            "id": PRODUCT_ID,
            "title": "Ferforje Kapı Kolu",
            "price": 120,
            "description": "El yapımı",
            "category": "{Kapı,Aksesuar}",
            "image": "https://cdn/a.jpg",
            "date_published": "2026-03-01",
            "rating": 4.5,
            "clicks": 12,
            "featured": true
        })
    }

    #[tokio::test]
    async fn test_product_summaries_are_cached_until_invalidated() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/product_views");
                then.status(200).json_body(json!([summary_row()]));
            })
            .await;

        let client = client_for(&server.base_url());
        let first = client.list_product_summaries().await.unwrap();
        let second = client.list_product_summaries().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second[0].category, vec!["Kapı", "Aksesuar"]);
        mock.assert_calls_async(1).await;

        client.invalidate_catalog().await;
        client.list_product_summaries().await.unwrap();
        mock.assert_calls_async(2).await;
    }

    #[tokio::test]
    async fn test_get_product_missing_row_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/products")
                    .query_param("id", format!("eq.{PRODUCT_ID}"))
                    .header("accept", SINGLE_OBJECT);
                then.status(406).json_body(json!({
                    "code": "PGRST116",
                    "message": "JSON object requested, multiple (or no) rows returned"
                }));
            })
            .await;

        let client = client_for(&server.base_url());
        let err = client
            .get_product(USER_TOKEN, PRODUCT_ID.parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_is_admin_checks_membership_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/admins")
                    .query_param("user_id", format!("eq.{USER_ID}"));
                then.status(200).json_body(json!([{ "user_id": USER_ID }]));
            })
            .await;

        let client = client_for(&server.base_url());
        let user_id: UserId = USER_ID.parse().unwrap();
        assert!(client.is_admin(USER_TOKEN, user_id).await.unwrap());
        assert!(client.is_admin(USER_TOKEN, user_id).await.unwrap());
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/profiles");
                then.status(406).json_body(json!({"code": "PGRST116", "message": "no rows"}));
            })
            .await;

        let client = client_for(&server.base_url());
        let profile = client
            .get_profile(USER_TOKEN, USER_ID.parse().unwrap())
            .await
            .unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_create_product_asks_for_representation() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/products")
                    .header("prefer", "return=representation")
                    .body_includes(r#""title":"Raf Braketi""#)
                    .body_includes(r#""price":["25"]"#);
                then.status(201).json_body(json!({
                    "id": PRODUCT_ID,
                    "title": "Raf Braketi",
                    "price": ["25"],
                    "images": []
                }));
            })
            .await;

        let client = client_for(&server.base_url());
        let input = ProductInput {
            title: "Raf Braketi".into(),
            price: vec!["25".into()],
            stock: true,
            ..ProductInput::default()
        };
        let product = client.create_product(USER_TOKEN, &input).await.unwrap();

        mock.assert_async().await;
        assert_eq!(product.price, vec!["25"]);
        assert!(product.stock);
    }

    #[tokio::test]
    async fn test_update_order_status_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/orders")
                    .json_body(json!({"status": "shipped"}));
                then.status(204);
            })
            .await;

        let client = client_for(&server.base_url());
        client
            .update_order_status(
                USER_TOKEN,
                "0b7e3c1a-1111-4222-8333-944455556666".parse().unwrap(),
                OrderStatus::Shipped,
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_liked_products_embed_product_columns() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/likes")
                    .query_param("user_id", format!("eq.{USER_ID}"))
                    .query_param("order", "created_at.desc");
                then.status(200).json_body(json!([{
                    "id": "1c1c1c1c-2d2d-4e4e-8f8f-a0a0a0a0a0a0",
                    "created_at": "2026-05-01T10:00:00Z",
                    "products": {
                        "id": PRODUCT_ID,
                        "title": "Ferforje Kapı Kolu",
                        "price": ["120", "150"],
                        "images": null,
                        "category": "Kapı, Aksesuar"
                    }
                }]));
            })
            .await;

        let client = client_for(&server.base_url());
        let likes = client
            .list_liked_products(USER_TOKEN, USER_ID.parse().unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        let product = likes[0].products.as_ref().unwrap();
        assert_eq!(product.price, vec!["120", "150"]);
        assert!(product.images.is_empty());
        assert_eq!(product.category, vec!["Kapı", "Aksesuar"]);
    }

    #[tokio::test]
    async fn test_delete_cart_order_only_touches_cart_rows() {
        let order_id = "0b7e3c1a-1111-4222-8333-944455556666";
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/rest/v1/orders")
                    .query_param("id", format!("eq.{order_id}"))
                    .query_param("user_id", format!("eq.{USER_ID}"))
                    .query_param("status", "eq.cart");
                then.status(204);
            })
            .await;

        let client = client_for(&server.base_url());
        client
            .delete_cart_order(
                USER_TOKEN,
                USER_ID.parse().unwrap(),
                order_id.parse().unwrap(),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_order_views_include_every_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/order_views")
                    .query_param("select", "*")
                    .query_param("order", "order_timestamp.desc")
                    .query_param_missing("order_status");
                then.status(200).json_body(json!([
                    {
                        "id": "row-1",
                        "order_id": "0b7e3c1a-1111-4222-8333-944455556666",
                        "user_email": "a@lese.com",
                        "quantity": 1,
                        "total_with_tax": "108.00",
                        "order_status": "cart"
                    },
                    {
                        "id": "row-2",
                        "order_id": "1c8f4d2b-2222-4333-8444-a55566667777",
                        "user_email": "b@lese.com",
                        "quantity": 2,
                        "total_with_tax": "216.00",
                        "order_status": "pending"
                    }
                ]));
            })
            .await;

        let client = client_for(&server.base_url());
        let rows = client.list_order_views(USER_TOKEN).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order_status, OrderStatus::Cart);
    }
}
