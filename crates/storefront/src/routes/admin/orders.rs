//! Admin order management: stats, search, status changes.

use std::collections::HashSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use lese_core::{Currency, Money, OrderId, OrderStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use super::AdminTab;
use crate::backend::OrderViewRow;
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::routes::{Flash, FlashQuery, PLACEHOLDER_IMAGE, PageContext};
use crate::seo::PageMeta;
use crate::state::AppState;

// =============================================================================
// Search
// =============================================================================

/// `/admin/orders` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct OrderSearch {
    pub q: Option<String>,
    pub status: Option<String>,
}

/// Status filter of the order table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(OrderStatus),
}

impl StatusFilter {
    /// `all`, blank and unknown values show every order.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .map_or(Self::All, Self::Only)
    }

    fn matches(self, status: OrderStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == status,
        }
    }
}

/// Orders matching the search text and status.
///
/// The search covers customer email and name, product title and order id,
/// ignoring case.
#[must_use]
pub fn filter_orders<'a>(
    orders: &'a [OrderViewRow],
    query: &str,
    status: StatusFilter,
) -> Vec<&'a OrderViewRow> {
    let query = query.trim().to_lowercase();
    orders
        .iter()
        .filter(|o| status.matches(o.order_status))
        .filter(|o| {
            query.is_empty()
                || o.user_email.to_lowercase().contains(&query)
                || o.product_title.to_lowercase().contains(&query)
                || o.order_id.to_string().contains(&query)
                || o
                    .user_full_name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&query))
        })
        .collect()
}

// =============================================================================
// Stats
// =============================================================================

/// Headline numbers above the order table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStats {
    pub order_count: usize,
    pub revenue: Decimal,
    pub customer_count: usize,
    pub pending_count: usize,
}

impl OrderStats {
    #[must_use]
    pub fn compute(orders: &[OrderViewRow]) -> Self {
        let customers: HashSet<String> = orders
            .iter()
            .map(|o| o.user_email.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Self {
            order_count: orders.len(),
            revenue: orders.iter().map(|o| o.total_with_tax).sum(),
            customer_count: customers.len(),
            pending_count: orders
                .iter()
                .filter(|o| o.order_status == OrderStatus::Pending)
                .count(),
        }
    }
}

// =============================================================================
// View models
// =============================================================================

/// An option of a status `<select>`.
pub struct StatusOption {
    pub value: &'static str,
    pub selected: bool,
}

fn status_options(current: Option<OrderStatus>) -> Vec<StatusOption> {
    OrderStatus::ADMIN_ASSIGNABLE
        .iter()
        .map(|s| StatusOption {
            value: s.as_str(),
            selected: current == Some(*s),
        })
        .collect()
}

/// A row of the order table.
pub struct OrderRow {
    pub order_id: String,
    pub short_id: String,
    pub customer: String,
    pub email: String,
    pub product: String,
    pub image: String,
    pub quantity: u32,
    pub options: String,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub status: &'static str,
    pub badge_class: &'static str,
    pub placed_at: String,
    pub status_options: Vec<StatusOption>,
}

impl OrderRow {
    fn new(order: &OrderViewRow, currency: Currency) -> Self {
        let order_id = order.order_id.to_string();
        let options = [
            order.selected_price.as_deref(),
            order.selected_size.as_deref(),
            order.selected_weight.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(" / ");

        Self {
            short_id: order_id.chars().take(8).collect(),
            order_id,
            customer: order
                .user_full_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| order.user_email.clone()),
            email: order.user_email.clone(),
            product: order.product_title.clone(),
            image: order
                .product_image
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            quantity: order.quantity,
            options,
            subtotal: Money::new(order.subtotal, currency).display(),
            tax: Money::new(order.tax_amount, currency).display(),
            total: Money::new(order.total_with_tax, currency).display(),
            status: order.order_status.as_str(),
            badge_class: order.order_status.badge_class(),
            placed_at: format_timestamp(&order.order_timestamp),
            status_options: status_options(Some(order.order_status)),
        }
    }
}

/// `2024-05-01 14:30` from an RFC 3339 timestamp; other input is shown as-is.
fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map_or_else(|_| raw.to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

/// Stats formatted for display.
pub struct StatsView {
    pub order_count: usize,
    pub revenue: String,
    pub customer_count: usize,
    pub pending_count: usize,
}

impl StatsView {
    fn new(stats: &OrderStats, currency: Currency) -> Self {
        Self {
            order_count: stats.order_count,
            revenue: Money::new(stats.revenue, currency).display(),
            customer_count: stats.customer_count,
            pending_count: stats.pending_count,
        }
    }
}

/// Status filter link.
pub struct FilterOption {
    pub value: &'static str,
    pub selected: bool,
}

fn filter_options(filter: StatusFilter) -> Vec<FilterOption> {
    std::iter::once(FilterOption {
        value: "all",
        selected: filter == StatusFilter::All,
    })
    .chain(OrderStatus::ADMIN_ASSIGNABLE.iter().map(|s| FilterOption {
        value: s.as_str(),
        selected: filter == StatusFilter::Only(*s),
    }))
    .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Order table template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct OrdersTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub tab: AdminTab,
    pub stats: StatsView,
    pub orders: Vec<OrderRow>,
    pub query: String,
    pub filters: Vec<FilterOption>,
    pub load_failed: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Render the order table.
pub(super) async fn render_index(
    state: &AppState,
    RequireAdmin(user): RequireAdmin,
    nonce: CspNonce,
    search: &OrderSearch,
    flash: FlashQuery,
) -> Response {
    let query = search.q.clone().unwrap_or_default();
    let status = StatusFilter::parse(search.status.as_deref());
    let currency = state.config().pricing.currency;

    let (stats, orders, load_failed) = match state.backend().list_order_views(&user.access_token).await
    {
        Ok(all) => {
            let stats = OrderStats::compute(&all);
            let rows = filter_orders(&all, &query, status)
                .into_iter()
                .map(|o| OrderRow::new(o, currency))
                .collect();
            (stats, rows, false)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load orders");
            (OrderStats::compute(&[]), Vec::new(), true)
        }
    };

    let meta = PageMeta::admin(state.config(), "Orders");
    let ctx = PageContext::new(state, nonce, Some(&user), meta).await;
    OrdersTemplate {
        ctx,
        flash: flash.into_flash(),
        tab: AdminTab::Orders,
        stats: StatsView::new(&stats, currency),
        orders,
        query,
        filters: filter_options(status),
        load_failed,
    }
    .into_response()
}

/// Order table with stats, search and status filter.
#[instrument(skip(state, admin, nonce, flash))]
pub async fn index(
    State(state): State<AppState>,
    admin: RequireAdmin,
    nonce: CspNonce,
    Query(search): Query<OrderSearch>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    render_index(&state, admin, nonce, &search, flash).await
}

/// Status form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Parse a status an admin may set. `cart` and unknown values are refused.
fn assignable_status(value: &str) -> Option<OrderStatus> {
    value
        .parse::<OrderStatus>()
        .ok()
        .filter(|s| s.is_admin_assignable())
}

/// Change an order's status.
#[instrument(skip(state, user))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    let Some(status) = assignable_status(&form.status) else {
        tracing::warn!(order_id = %id, status = %form.status, "Refusing status change");
        return Redirect::to("/admin/orders?error=order_failed");
    };

    match state
        .backend()
        .update_order_status(&user.access_token, id, status)
        .await
    {
        Ok(()) => Redirect::to("/admin/orders?notice=order_updated"),
        Err(e) => {
            tracing::error!(order_id = %id, error = %e, "Status update failed");
            Redirect::to("/admin/orders?error=order_failed")
        }
    }
}

/// Delete an order.
#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Redirect {
    match state.backend().delete_order(&user.access_token, id).await {
        Ok(()) => {
            tracing::info!(order_id = %id, "Order deleted");
            Redirect::to("/admin/orders?notice=order_deleted")
        }
        Err(e) => {
            tracing::error!(order_id = %id, error = %e, "Order delete failed");
            Redirect::to("/admin/orders?error=order_failed")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(email: &str, name: Option<&str>, title: &str, status: &str, total: &str) -> OrderViewRow {
        serde_json::from_value(serde_json::json!({
            "id": "row",
            "order_id": uuid::Uuid::new_v4(),
            "user_email": email,
            "user_full_name": name,
            "product_title": title,
            "quantity": 1,
            "total_with_tax": total,
            "order_status": status,
            "order_timestamp": "2024-05-01T14:30:00+00:00",
        }))
        .unwrap()
    }

    fn orders() -> Vec<OrderViewRow> {
        vec![
            order("ayse@example.com", Some("Ayşe Demir"), "Vida Seti", "pending", "54.00"),
            order("AYSE@example.com", None, "Raf Braketi", "shipped", "27.00"),
            order("mehmet@example.com", Some("Mehmet Kaya"), "Kapı Kolu", "pending", "129.60"),
        ]
    }

    #[test]
    fn test_stats() {
        let stats = OrderStats::compute(&orders());
        assert_eq!(stats.order_count, 3);
        assert_eq!(stats.revenue, Decimal::new(2106, 1));
        assert_eq!(stats.customer_count, 2);
        assert_eq!(stats.pending_count, 2);
    }

    #[test]
    fn test_filter_by_text() {
        let all = orders();
        assert_eq!(filter_orders(&all, "kaya", StatusFilter::All).len(), 1);
        assert_eq!(filter_orders(&all, "braket", StatusFilter::All).len(), 1);
        assert_eq!(filter_orders(&all, "ayse@", StatusFilter::All).len(), 2);

        let id = all[0].order_id.to_string();
        let by_id = filter_orders(&all, &id[..8], StatusFilter::All);
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].order_id, all[0].order_id);
    }

    #[test]
    fn test_filter_by_status() {
        let all = orders();
        let pending = StatusFilter::parse(Some("pending"));
        assert_eq!(filter_orders(&all, "", pending).len(), 2);
        assert_eq!(filter_orders(&all, "vida", pending).len(), 1);
        assert_eq!(StatusFilter::parse(Some("all")), StatusFilter::All);
        assert_eq!(StatusFilter::parse(None), StatusFilter::All);
    }

    #[test]
    fn test_only_assignable_statuses() {
        assert_eq!(assignable_status("delivered"), Some(OrderStatus::Delivered));
        assert_eq!(assignable_status("cart"), None);
        assert_eq!(assignable_status("lost"), None);
    }

    #[test]
    fn test_row_formatting() {
        let row = OrderRow::new(&orders()[1], Currency::Try);
        assert_eq!(row.customer, "AYSE@example.com");
        assert_eq!(row.total, "₺27.00");
        assert_eq!(row.placed_at, "2024-05-01 14:30");
        assert_eq!(row.short_id.len(), 8);
        assert_eq!(row.status_options.iter().filter(|o| o.selected).count(), 1);
        assert_eq!(row.image, PLACEHOLDER_IMAGE);
    }
}
