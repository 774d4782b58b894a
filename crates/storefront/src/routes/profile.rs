//! Profile route handlers: account details, orders and liked products.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use lese_core::{Currency, Money, OrderId, ProductId, price_range_display};
use serde::Deserialize;
use tracing::instrument;

use super::{Flash, FlashQuery, PLACEHOLDER_IMAGE, PageContext};
use crate::backend::{LikedProductRow, Profile, ProfileUpdate, UserOrder};
use crate::filters;
use crate::middleware::{AVATAR_HOST, CspNonce, RequireAuth};
use crate::seo::PageMeta;
use crate::state::AppState;

/// Category label for liked products without one.
const UNCATEGORIZED: &str = "Uncategorized";

/// Preset avatars offered by the profile form: `(style, seed)`.
const AVATAR_PRESETS: [(&str, &str); 12] = [
    ("avataaars", "John"),
    ("avataaars", "Jane"),
    ("avataaars", "Mike"),
    ("avataaars", "Sarah"),
    ("avataaars", "Alex"),
    ("avataaars", "Emma"),
    ("personas", "David"),
    ("personas", "Lisa"),
    ("big-smile", "Happy"),
    ("big-smile", "Joy"),
    ("adventurer", "Explorer"),
    ("adventurer", "Wanderer"),
];

/// Image URL of a preset avatar.
fn avatar_url(style: &str, seed: &str) -> String {
    format!("{AVATAR_HOST}/7.x/{style}/svg?seed={seed}")
}

/// Whether `url` is one of the preset avatars.
#[must_use]
pub fn is_preset_avatar(url: &str) -> bool {
    AVATAR_PRESETS
        .iter()
        .any(|(style, seed)| avatar_url(style, seed) == url)
}

// =============================================================================
// View models
// =============================================================================

/// An avatar in the picker.
pub struct AvatarOption {
    pub url: String,
    pub label: &'static str,
    pub selected: bool,
}

fn avatar_options(current: Option<&str>) -> Vec<AvatarOption> {
    AVATAR_PRESETS
        .iter()
        .map(|&(style, seed)| {
            let url = avatar_url(style, seed);
            AvatarOption {
                selected: current == Some(url.as_str()),
                url,
                label: seed,
            }
        })
        .collect()
}

/// Header data for the profile page.
pub struct ProfileView {
    pub name: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl ProfileView {
    fn new(profile: Option<Profile>, fallback_name: &str, fallback_email: Option<&str>) -> Self {
        let full_name = profile
            .as_ref()
            .and_then(|p| p.full_name.clone())
            .filter(|n| !n.trim().is_empty());
        Self {
            name: full_name.clone().unwrap_or_else(|| fallback_name.to_string()),
            full_name: full_name.unwrap_or_default(),
            email: profile
                .as_ref()
                .and_then(|p| p.email.clone())
                .or_else(|| fallback_email.map(str::to_string))
                .unwrap_or_default(),
            avatar_url: profile
                .and_then(|p| p.avatar_url)
                .filter(|url| !url.is_empty()),
        }
    }
}

/// An order row on the profile page.
pub struct OrderView {
    pub id: String,
    pub href: Option<String>,
    pub title: String,
    pub image: String,
    pub quantity: u32,
    pub unit_price: Option<String>,
    pub total: String,
    pub time_ago: String,
    pub status_label: &'static str,
    pub badge_class: &'static str,
}

impl OrderView {
    fn new(order: &UserOrder, currency: Currency) -> Self {
        Self {
            id: order.id.to_string(),
            href: order.product_id.map(|id| format!("/shop/{id}")),
            title: order.product_title.clone(),
            image: order
                .product_image
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            quantity: order.quantity,
            unit_price: order.selected_price.clone().filter(|p| !p.is_empty()),
            total: Money::new(order.total_price, currency).display(),
            time_ago: order.time_ago.clone(),
            status_label: order.status.label(),
            badge_class: order.status.badge_class(),
        }
    }
}

/// Orders grouped into the profile tabs.
#[derive(Default)]
pub struct OrderGroups {
    pub cart: Vec<OrderView>,
    pub tracking: Vec<OrderView>,
    pub delivered: Vec<OrderView>,
}

impl OrderGroups {
    /// Split orders into cart, in-progress and delivered.
    #[must_use]
    pub fn split(orders: &[UserOrder], currency: Currency) -> Self {
        let mut groups = Self::default();
        for order in orders {
            let view = OrderView::new(order, currency);
            if order.status.is_in_cart() {
                groups.cart.push(view);
            } else if order.status.is_tracking() {
                groups.tracking.push(view);
            } else {
                groups.delivered.push(view);
            }
        }
        groups
    }
}

/// A liked product card.
pub struct LikedView {
    pub product_id: String,
    pub href: String,
    pub title: String,
    pub price: String,
    pub image: String,
    pub category: String,
}

impl LikedView {
    /// Rows whose product was deleted are skipped.
    fn from_row(row: LikedProductRow, currency: Currency) -> Option<Self> {
        let product = row.products?;
        Some(Self {
            product_id: product.id.to_string(),
            href: format!("/shop/{}", product.id),
            price: price_range_display(&product.price, currency),
            image: product
                .images
                .into_iter()
                .find(|url| !url.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            category: product
                .category
                .into_iter()
                .next()
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            title: product.title,
        })
    }
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/show.html")]
pub struct ProfileTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub profile: ProfileView,
    pub avatars: Vec<AvatarOption>,
    pub orders: OrderGroups,
    pub liked: Vec<LikedView>,
    pub orders_failed: bool,
    pub liked_failed: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the profile page.
#[instrument(skip(state, user, nonce, flash))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    nonce: CspNonce,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let backend = state.backend();
    let currency = state.config().pricing.currency;
    let token = user.access_token.as_str();

    let (profile, orders, liked) = tokio::join!(
        backend.get_profile(token, user.id),
        backend.get_user_orders(token),
        backend.list_liked_products(token, user.id),
    );

    let profile = profile.unwrap_or_else(|e| {
        tracing::warn!(user_id = %user.id, error = %e, "Failed to load profile");
        None
    });
    let (orders, orders_failed) = match orders {
        Ok(orders) => (OrderGroups::split(&orders, currency), false),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to load orders");
            (OrderGroups::default(), true)
        }
    };
    let (liked, liked_failed) = match liked {
        Ok(rows) => (
            rows.into_iter()
                .filter_map(|row| LikedView::from_row(row, currency))
                .collect(),
            false,
        ),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to load liked products");
            (Vec::new(), true)
        }
    };

    let profile = ProfileView::new(profile, user.display_name(), user.email.as_deref());
    let avatars = avatar_options(profile.avatar_url.as_deref());
    let ctx = PageContext::new(
        &state,
        nonce,
        Some(&user),
        PageMeta::profile(state.config()),
    )
    .await;

    ProfileTemplate {
        ctx,
        flash: flash.into_flash(),
        profile,
        avatars,
        orders,
        liked,
        orders_failed,
        liked_failed,
    }
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl ProfileForm {
    /// Validate into the columns to write. A blank avatar clears it.
    fn into_update(self) -> Option<ProfileUpdate> {
        let avatar = self.avatar_url.trim();
        if !avatar.is_empty() && !is_preset_avatar(avatar) {
            return None;
        }
        let full_name = self.full_name.trim();
        Some(ProfileUpdate {
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
            avatar_url: (!avatar.is_empty()).then(|| avatar.to_string()),
        })
    }
}

/// Update name and avatar.
#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Redirect {
    let Some(update) = form.into_update() else {
        return Redirect::to("/profile?error=invalid_avatar");
    };

    match state
        .backend()
        .update_profile(&user.access_token, user.id, &update)
        .await
    {
        Ok(_) => {
            tracing::info!(user_id = %user.id, "Profile updated");
            Redirect::to("/profile?notice=profile_saved")
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Profile update failed");
            Redirect::to("/profile?error=profile_failed")
        }
    }
}

/// Remove a product from the liked list.
#[instrument(skip(state, user))]
pub async fn unlike(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Redirect {
    match state
        .backend()
        .unlike_product(&user.access_token, user.id, product_id)
        .await
    {
        Ok(()) => Redirect::to("/profile?notice=unliked#liked"),
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Unlike failed");
            Redirect::to("/profile?error=like_failed#liked")
        }
    }
}

/// Delete a line from the cart tab.
#[instrument(skip(state, user))]
pub async fn delete_cart_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Redirect {
    let user_id = user.id;
    match state
        .backend()
        .delete_cart_order(&user.access_token, user_id, order_id)
        .await
    {
        Ok(()) => Redirect::to("/profile?notice=cart_removed#cart"),
        Err(e) => {
            tracing::error!(%user_id, error = %e, "Cart line delete failed");
            Redirect::to("/profile?error=cart_update_failed#cart")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(status: &str) -> UserOrder {
        serde_json::from_value(serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "product_title": "Vida Seti",
            "quantity": 2,
            "total_price": 50,
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn test_orders_split_by_status() {
        let orders: Vec<UserOrder> = ["cart", "pending", "shipped", "delivered", "cancelled"]
            .into_iter()
            .map(order)
            .collect();
        let groups = OrderGroups::split(&orders, Currency::Try);
        assert_eq!(groups.cart.len(), 1);
        assert_eq!(groups.tracking.len(), 3);
        assert_eq!(groups.delivered.len(), 1);
        assert_eq!(groups.delivered[0].status_label, "Teslim Edildi");
        assert_eq!(groups.tracking[0].total, "₺50.00");
    }

    #[test]
    fn test_avatar_must_be_preset() {
        let preset = avatar_url("personas", "Lisa");
        assert!(is_preset_avatar(&preset));
        assert!(!is_preset_avatar("https://evil.example/a.svg"));

        let form = ProfileForm {
            full_name: "  Ayşe Demir ".into(),
            avatar_url: preset.clone(),
        };
        let update = form.into_update().unwrap();
        assert_eq!(update.full_name.as_deref(), Some("Ayşe Demir"));
        assert_eq!(update.avatar_url, Some(preset));

        let bad = ProfileForm {
            full_name: String::new(),
            avatar_url: "javascript:alert(1)".into(),
        };
        assert!(bad.into_update().is_none());
    }

    #[test]
    fn test_avatar_options_mark_selection() {
        let current = avatar_url("big-smile", "Joy");
        let options = avatar_options(Some(&current));
        assert_eq!(options.len(), 12);
        assert_eq!(options.iter().filter(|o| o.selected).count(), 1);
        assert!(options.iter().all(|o| o.url.starts_with("https://api.dicebear.com/")));
    }

    #[test]
    fn test_liked_view_fallbacks() {
        let row: LikedProductRow = serde_json::from_value(serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "products": {
                "id": uuid::Uuid::new_v4(),
                "title": "Askı",
                "price": "{15,20}",
                "images": [],
                "category": null
            }
        }))
        .unwrap();
        let view = LikedView::from_row(row, Currency::Try).unwrap();
        assert_eq!(view.image, PLACEHOLDER_IMAGE);
        assert_eq!(view.category, UNCATEGORIZED);
        assert_eq!(view.price, "₺15.00 - ₺20.00");

        let orphan: LikedProductRow =
            serde_json::from_value(serde_json::json!({ "id": uuid::Uuid::new_v4() })).unwrap();
        assert!(LikedView::from_row(orphan, Currency::Try).is_none());
    }

    #[test]
    fn test_profile_view_falls_back_to_session() {
        let view = ProfileView::new(None, "ayse", Some("ayse@example.com"));
        assert_eq!(view.name, "ayse");
        assert!(view.full_name.is_empty());
        assert_eq!(view.email, "ayse@example.com");
        assert!(view.avatar_url.is_none());
    }
}
