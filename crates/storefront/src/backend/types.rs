//! Row and result shapes returned by the managed backend.
//!
//! Array-ish text columns go through [`lese_core::deserialize_list`] because
//! different endpoints encode them differently.

use lese_core::{
    CommentId, LikeId, OrderId, OrderStatus, ProductId, UserId, deserialize_list,
    deserialize_text,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Catalog
// =============================================================================

/// A row of the `product_views` view used by the shop grid.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub category: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub clicks: Option<i64>,
    #[serde(default)]
    pub featured: bool,
}

/// A row of the `products` table, as edited by admins.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub price: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub category: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub images: Vec<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default = "default_true")]
    pub stock: bool,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub weight: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub size: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Columns written when creating or updating a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductInput {
    pub title: String,
    pub price: Vec<String>,
    pub description: Option<String>,
    pub category: Vec<String>,
    /// `None` leaves the stored images untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub stock: bool,
    pub weight: Vec<String>,
    pub size: Vec<String>,
    pub featured: bool,
    pub sort_order: i32,
}

/// Product with engagement counters, from `get_product_with_details`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub price: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub category: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub stock: bool,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub weight: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub size: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub rating_count: i64,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub primary_image: Option<String>,
    #[serde(default)]
    pub price_display: Option<String>,
}

/// What the viewing user has already done to a product.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInteractions {
    #[serde(default)]
    pub has_liked: bool,
    #[serde(default)]
    pub user_rating: Option<i64>,
}

/// A comment on a product.
#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub comment: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub user_avatar: Option<String>,
    #[serde(default)]
    pub time_ago: String,
}

/// Full payload of `get_product_with_details`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductDetails {
    #[serde(default)]
    pub product: Option<ProductDetail>,
    #[serde(default)]
    pub user_interactions: UserInteractions,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

// =============================================================================
// Cart & Orders
// =============================================================================

/// A cart line from `get_cart_items`. The id is the `orders` row id.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub id: OrderId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub product_title: String,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub selected_price: Option<String>,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_weight: Option<String>,
    pub quantity: u32,
    pub total_price: Decimal,
    #[serde(default)]
    pub time_ago: String,
}

/// Parameters of `add_to_cart`.
#[derive(Debug, Clone, Serialize)]
pub struct AddToCartRequest {
    pub product_uuid: ProductId,
    pub quantity: u32,
    pub selected_price: Option<String>,
    pub selected_size: Option<String>,
    pub selected_weight: Option<String>,
}

/// Result of `add_to_cart`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddedToCart {
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

/// Result of `update_cart_item_quantity`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuantityUpdated {
    #[serde(default)]
    pub new_quantity: u32,
    #[serde(default)]
    pub new_total: Option<Decimal>,
}

/// Result of `checkout_cart`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutResult {
    #[serde(default)]
    pub order_count: i64,
}

/// An order row from `get_user_orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserOrder {
    pub id: OrderId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub product_title: String,
    #[serde(default)]
    pub product_image: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub selected_price: Option<String>,
    pub total_price: Decimal,
    #[serde(default)]
    pub time_ago: String,
    pub status: OrderStatus,
}

/// A row of the `order_views` view used by the admin orders table.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderViewRow {
    pub id: String,
    pub order_id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_full_name: Option<String>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub product_title: String,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub product_category: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub selected_price: Option<String>,
    #[serde(default)]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub selected_weight: Option<String>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub total_with_tax: Decimal,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub order_timestamp: String,
}

// =============================================================================
// Engagement
// =============================================================================

/// Result of `toggle_product_like`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LikeToggled {
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub likes_count: i64,
}

/// Result of `rate_product`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RatingSaved {
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub rating_count: i64,
}

/// Result of `add_product_comment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentAdded {
    #[serde(default)]
    pub comment: Option<Comment>,
}

// =============================================================================
// Profiles
// =============================================================================

/// A row of the `profiles` table.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Columns written by the profile form.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A `likes` row joined with its product.
#[derive(Debug, Clone, Deserialize)]
pub struct LikedProductRow {
    pub id: LikeId,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub products: Option<LikedProduct>,
}

/// The product columns embedded in a [`LikedProductRow`].
#[derive(Debug, Clone, Deserialize)]
pub struct LikedProduct {
    pub id: ProductId,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub price: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_list")]
    pub category: Vec<String>,
}

const fn default_true() -> bool {
    true
}

fn default_username() -> String {
    "Anonim".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_detail_tolerates_array_literals() {
        let json = r#"{
            "id": "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b",
            "title": "Ferforje Kapı Kolu",
            "price": "{120,180}",
            "description": ["El yapımı", "dövme demir"],
            "category": null,
            "images": ["https://cdn/a.jpg"],
            "stock": false,
            "average_rating": 4.5,
            "rating_count": 2
        }"#;
        let detail: ProductDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.price, vec!["120", "180"]);
        assert_eq!(detail.description, "El yapımı dövme demir");
        assert!(detail.category.is_empty());
        assert!(!detail.stock);
        assert_eq!(detail.likes_count, 0);
    }

    #[test]
    fn test_cart_item_numeric_total() {
        let json = r#"{
            "id": "0b7e3c1a-1111-4222-8333-944455556666",
            "product_title": "Raf Braketi",
            "selected_price": "25",
            "quantity": 3,
            "total_price": 75.5,
            "time_ago": "2 saat önce"
        }"#;
        let item: CartItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.total_price, Decimal::new(755, 1));
        assert!(item.product_image.is_none());
    }

    #[test]
    fn test_details_without_product() {
        let details: ProductDetails = serde_json::from_str(r#"{"product": null}"#).unwrap();
        assert!(details.product.is_none());
        assert!(!details.user_interactions.has_liked);
    }

    #[test]
    fn test_comment_defaults_username() {
        let json = r#"{"id":"0b7e3c1a-1111-4222-8333-944455556666","comment":"Çok sağlam"}"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.username, "Anonim");
    }
}
