//! Admin panel route handlers.
//!
//! Every handler takes [`RequireAdmin`], so non-admins get the access-denied
//! page before any backend call is made. Writes go out with the admin's own
//! access token; the backend's row-level security is the final authority.
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod orders;
pub mod products;

use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use tracing::instrument;

use super::FlashQuery;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::state::AppState;

/// Panel tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminTab {
    Products,
    #[default]
    Orders,
}

impl AdminTab {
    /// Unknown or missing values select the default tab.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("products") => Self::Products,
            _ => Self::Orders,
        }
    }

    #[must_use]
    pub const fn is_products(self) -> bool {
        matches!(self, Self::Products)
    }
}

/// `/admin` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PanelQuery {
    pub tab: Option<String>,
}

/// Display the panel with the selected tab.
#[instrument(skip(state, admin, nonce, flash))]
pub async fn index(
    State(state): State<AppState>,
    admin: RequireAdmin,
    nonce: CspNonce,
    Query(query): Query<PanelQuery>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    match AdminTab::parse(query.tab.as_deref()) {
        AdminTab::Products => {
            products::render_index(&state, admin, nonce, &products::ProductSearch::default(), flash)
                .await
        }
        AdminTab::Orders => {
            orders::render_index(&state, admin, nonce, &orders::OrderSearch::default(), flash).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_defaults_to_orders() {
        assert_eq!(AdminTab::parse(None), AdminTab::Orders);
        assert_eq!(AdminTab::parse(Some("products")), AdminTab::Products);
        assert_eq!(AdminTab::parse(Some("users")), AdminTab::Orders);
    }
}
