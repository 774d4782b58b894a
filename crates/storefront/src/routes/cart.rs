//! Cart route handlers.
//!
//! Cart lines are `orders` rows in the `cart` status, owned by the signed-in
//! user and changed through backend RPCs. Cart operations use HTMX for
//! dynamic updates without full page reloads; plain form posts fall back to
//! redirects.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use lese_core::{CartLine, CartSummary, Money, OrderId, PricingPolicy, ProductId, Quantity};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use super::{
    Flash, FlashQuery, LoginAction, PLACEHOLDER_IMAGE, PageContext, is_htmx, login_prompt,
    login_prompt_url,
};
use crate::backend::{AddToCartRequest, CartItem};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::seo::PageMeta;
use crate::state::AppState;

// =============================================================================
// View models
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub id: String,
    pub href: Option<String>,
    pub title: String,
    pub image: String,
    /// Selected options, e.g. `Boyut: M8`.
    pub options: Vec<String>,
    pub unit_price: Option<String>,
    pub quantity: u32,
    pub line_total: String,
    pub time_ago: String,
}

impl CartItemView {
    fn new(item: &CartItem, policy: &PricingPolicy) -> Self {
        let options = [
            ("Boyut", &item.selected_size),
            ("Ağırlık", &item.selected_weight),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect();

        Self {
            id: item.id.to_string(),
            href: item.product_id.map(|id| format!("/shop/{id}")),
            title: item.product_title.clone(),
            image: item
                .product_image
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            options,
            unit_price: item.selected_price.clone().filter(|p| !p.is_empty()),
            quantity: item.quantity,
            line_total: Money::new(item.total_price, policy.currency).display(),
            time_ago: item.time_ago.clone(),
        }
    }

    /// Quantity after pressing the minus button.
    #[must_use]
    pub const fn decrement(&self) -> u32 {
        self.quantity.saturating_sub(1)
    }

    #[must_use]
    pub const fn increment(&self) -> u32 {
        self.quantity.saturating_add(1)
    }

    #[must_use]
    pub const fn can_decrement(&self) -> bool {
        self.quantity > Quantity::MIN
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub tax: String,
    /// Tax rate as a percentage, e.g. `8`.
    pub tax_percent: String,
    /// `None` when shipping is free.
    pub shipping: Option<String>,
    pub total: String,
    pub free_shipping_threshold: String,
    pub free_shipping_unlocked: bool,
    pub load_failed: bool,
}

impl CartView {
    /// Build the view and its price summary.
    #[must_use]
    pub fn new(items: &[CartItem], policy: &PricingPolicy) -> Self {
        let lines: Vec<CartLine> = items
            .iter()
            .map(|item| CartLine {
                quantity: item.quantity,
                line_total: item.total_price,
            })
            .collect();
        let summary = CartSummary::compute(policy, &lines);

        Self {
            items: items.iter().map(|i| CartItemView::new(i, policy)).collect(),
            item_count: summary.item_count,
            subtotal: summary.money(summary.subtotal).display(),
            tax: summary.money(summary.tax).display(),
            tax_percent: (policy.tax_rate * Decimal::ONE_HUNDRED)
                .normalize()
                .to_string(),
            shipping: (!summary.shipping.is_zero())
                .then(|| summary.money(summary.shipping).display()),
            total: summary.money(summary.total).display(),
            free_shipping_threshold: summary.money(policy.free_shipping_threshold).display(),
            free_shipping_unlocked: summary.free_shipping_unlocked(),
            load_failed: false,
        }
    }

    /// An empty cart whose items could not be loaded.
    #[must_use]
    pub fn failed(policy: &PricingPolicy) -> Self {
        Self {
            load_failed: true,
            ..Self::new(&[], policy)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sum of quantities across cart lines.
fn item_count(items: &[CartItem]) -> u32 {
    items
        .iter()
        .fold(0_u32, |acc, i| acc.saturating_add(i.quantity))
}

async fn load_cart(state: &AppState, user: &CurrentUser) -> CartView {
    let policy = &state.config().pricing;
    match state.backend().get_cart_items(&user.access_token).await {
        Ok(items) => CartView::new(&items, policy),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to fetch cart");
            CartView::failed(policy)
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    pub selected_price: Option<String>,
    pub selected_size: Option<String>,
    pub selected_weight: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub order_id: OrderId,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub order_id: OrderId,
}

/// Blank select values mean "no option".
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub cart: CartView,
    /// Shared with the items fragment, which the page includes.
    pub error: Option<&'static str>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub error: Option<&'static str>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, user, nonce, flash))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    nonce: CspNonce,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let cart = load_cart(&state, &user).await;
    let ctx = PageContext::new(&state, nonce, Some(&user), PageMeta::cart(state.config())).await;

    CartShowTemplate {
        ctx,
        flash: flash.into_flash(),
        cart,
        error: None,
    }
}

/// Add item to cart.
///
/// HTMX requests get the updated count badge and a `cart-updated` trigger so
/// other elements can refresh.
#[instrument(skip(state, user, headers))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response, AppError> {
    let product_path = format!("/shop/{}", form.product_id);
    let htmx = is_htmx(&headers);

    let Some(user) = user else {
        if htmx {
            let target = login_prompt_url(LoginAction::Cart, &product_path);
            return Ok(AppendHeaders([("HX-Redirect", target)]).into_response());
        }
        return Ok(login_prompt(LoginAction::Cart, &product_path).into_response());
    };

    let quantity = Quantity::new(form.quantity.unwrap_or(1))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let request = AddToCartRequest {
        product_uuid: form.product_id,
        quantity: quantity.get(),
        selected_price: non_empty(form.selected_price),
        selected_size: non_empty(form.selected_size),
        selected_weight: non_empty(form.selected_weight),
    };

    match state.backend().add_to_cart(&user.access_token, &request).await {
        Ok(_) => {
            add_breadcrumb("cart", "Product added to cart", None);
            tracing::info!(user_id = %user.id, product_id = %form.product_id, "Added to cart");

            if !htmx {
                return Ok(Redirect::to(&format!("{product_path}?notice=added_to_cart")).into_response());
            }
            let count = match state.backend().get_cart_items(&user.access_token).await {
                Ok(items) => item_count(&items),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to refresh cart count");
                    0
                }
            };
            Ok((
                AppendHeaders([("HX-Trigger", "cart-updated")]),
                CartCountTemplate { count },
            )
                .into_response())
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Failed to add item to cart");
            if htmx {
                return Ok((
                    StatusCode::BAD_GATEWAY,
                    Html("<span class=\"cart-error\">Ürün sepete eklenemedi.</span>"),
                )
                    .into_response());
            }
            Ok(Redirect::to(&format!("{product_path}?error=cart_failed")).into_response())
        }
    }
}

/// Respond to a cart mutation: the items fragment for HTMX, a redirect
/// otherwise.
async fn mutation_response(
    state: &AppState,
    user: &CurrentUser,
    htmx: bool,
    failed: bool,
) -> Response {
    if !htmx {
        let target = if failed {
            "/cart?error=cart_update_failed"
        } else {
            "/cart"
        };
        return Redirect::to(target).into_response();
    }

    let cart = load_cart(state, user).await;
    let error = failed.then_some("Sepet güncellenemedi.");
    (
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { cart, error },
    )
        .into_response()
}

/// Update cart item quantity.
#[instrument(skip(state, user, headers))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response, AppError> {
    let quantity =
        Quantity::new(form.quantity).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let failed = match state
        .backend()
        .update_cart_item_quantity(&user.access_token, form.order_id, quantity)
        .await
    {
        Ok(_) => false,
        Err(e) => {
            tracing::error!(order_id = %form.order_id, error = %e, "Failed to update cart");
            true
        }
    };

    Ok(mutation_response(&state, &user, is_htmx(&headers), failed).await)
}

/// Remove item from cart.
#[instrument(skip(state, user, headers))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let failed = match state
        .backend()
        .remove_cart_item(&user.access_token, form.order_id)
        .await
    {
        Ok(()) => false,
        Err(e) => {
            tracing::error!(order_id = %form.order_id, error = %e, "Failed to remove from cart");
            true
        }
    };

    mutation_response(&state, &user, is_htmx(&headers), failed).await
}

/// Get cart count badge (HTMX). Anonymous visitors see zero.
#[instrument(skip(state, user))]
pub async fn count(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
    let count = match user {
        Some(user) => state
            .backend()
            .get_cart_items(&user.access_token)
            .await
            .map(|items| item_count(&items))
            .unwrap_or(0),
        None => 0,
    };

    CartCountTemplate { count }
}

/// Turn the cart into a pending order.
#[instrument(skip(state, user))]
pub async fn checkout(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Redirect {
    match state.backend().get_cart_items(&user.access_token).await {
        Ok(items) if items.is_empty() => return Redirect::to("/cart"),
        Ok(_) => {}
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Failed to get cart for checkout");
            return Redirect::to("/cart?error=checkout_failed");
        }
    }

    match state.backend().checkout_cart(&user.access_token).await {
        Ok(result) => {
            add_breadcrumb("cart", "Checkout completed", None);
            tracing::info!(user_id = %user.id, orders = result.order_count, "Order placed");
            Redirect::to("/profile?notice=order_placed")
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Checkout failed");
            Redirect::to("/cart?error=checkout_failed")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(quantity: u32, total: i64, size: Option<&str>) -> CartItem {
        serde_json::from_value(serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "product_id": uuid::Uuid::new_v4(),
            "product_title": "Raf Braketi",
            "selected_price": "25",
            "selected_size": size,
            "quantity": quantity,
            "total_price": total,
        }))
        .unwrap()
    }

    #[test]
    fn test_cart_view_below_threshold_charges_shipping() {
        let policy = PricingPolicy::default();
        let view = CartView::new(&[item(2, 40, Some("M8"))], &policy);

        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "₺40.00");
        assert_eq!(view.tax, "₺3.20");
        assert_eq!(view.tax_percent, "8");
        assert_eq!(view.shipping.as_deref(), Some("₺9.99"));
        assert_eq!(view.total, "₺53.19");
        assert!(!view.free_shipping_unlocked);
        assert_eq!(view.items[0].options, vec!["Boyut: M8"]);
        assert_eq!(view.items[0].image, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_cart_view_free_shipping() {
        let policy = PricingPolicy::default();
        let view = CartView::new(&[item(1, 30, None), item(1, 25, None)], &policy);

        assert!(view.shipping.is_none());
        assert!(view.free_shipping_unlocked);
        assert_eq!(view.free_shipping_threshold, "₺50.00");
    }

    #[test]
    fn test_threshold_subtotal_still_pays_shipping() {
        let policy = PricingPolicy::default();
        let view = CartView::new(&[item(2, 50, None)], &policy);
        assert_eq!(view.shipping.as_deref(), Some("₺9.99"));

        let html = CartItemsTemplate {
            cart: view,
            error: None,
        }
        .render()
        .unwrap();
        assert!(html.contains("₺50.00 üzerindeki siparişlerde kargo ücretsiz"));
        assert!(!html.contains("ve üzeri"));
    }

    #[test]
    fn test_empty_and_failed_cart() {
        let policy = PricingPolicy::default();
        let empty = CartView::new(&[], &policy);
        assert!(empty.is_empty());
        assert_eq!(empty.total, "₺0.00");
        assert!(empty.shipping.is_none());
        assert!(CartView::failed(&policy).load_failed);
    }

    #[test]
    fn test_quantity_buttons() {
        let policy = PricingPolicy::default();
        let view = CartView::new(&[item(1, 25, None)], &policy);
        let line = &view.items[0];
        assert!(!line.can_decrement());
        assert_eq!(line.increment(), 2);
        assert_eq!(line.decrement(), 0);
    }

    #[test]
    fn test_non_empty_options() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" 5kg ".into())), Some("5kg".into()));
        assert_eq!(non_empty(None), None);
    }
}
