//! Shop route handlers: product grid, product detail and engagement.

use std::collections::BTreeSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use lese_core::{
    CommentBody, Currency, Money, ProductId, Rating, price_range_display, star_states,
};
use serde::Deserialize;
use tracing::instrument;

use super::{
    Flash, FlashQuery, LoginAction, NotFoundTemplate, PLACEHOLDER_IMAGE, PageContext,
    login_prompt, truncate_chars,
};
use crate::backend::{BackendError, Comment, ProductDetails, ProductSummary};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::models::CurrentUser;
use crate::seo::PageMeta;
use crate::state::AppState;

/// Characters of description shown on a product card.
const CARD_DESCRIPTION_CHARS: usize = 100;

// =============================================================================
// View models
// =============================================================================

/// Product card shown in grids (shop and home).
#[derive(Clone)]
pub struct ProductCard {
    pub href: String,
    pub title: String,
    pub price: String,
    pub excerpt: String,
    pub image: String,
    pub category: Option<String>,
    pub rating: Option<String>,
    pub featured: bool,
}

impl ProductCard {
    #[must_use]
    pub fn from_summary(product: &ProductSummary, currency: Currency) -> Self {
        Self {
            href: format!("/shop/{}", product.id),
            title: product.title.clone(),
            price: product
                .price
                .map_or_else(|| Money::zero(currency), |p| Money::new(p, currency))
                .display(),
            excerpt: truncate_chars(&product.description, CARD_DESCRIPTION_CHARS),
            image: product
                .image
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            category: product.category.first().cloned(),
            rating: product
                .rating
                .filter(|r| *r > 0.0)
                .map(|r| format!("{r:.1}")),
            featured: product.featured,
        }
    }
}

/// Category filter link.
pub struct CategoryChip {
    pub name: String,
    pub href: String,
    pub active: bool,
}

/// Gallery thumbnail.
pub struct Thumbnail {
    pub href: String,
    pub url: String,
    pub active: bool,
}

/// One star of the rating widget.
pub struct Star {
    pub value: u8,
    pub class: &'static str,
}

/// Comment as displayed under the product.
pub struct CommentView {
    pub username: String,
    pub avatar: Option<String>,
    pub initial: String,
    pub body: String,
    pub time_ago: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        let initial = comment
            .username
            .chars()
            .next()
            .map_or_else(|| "A".to_string(), |c| c.to_uppercase().to_string());
        Self {
            username: comment.username,
            avatar: comment.user_avatar.filter(|url| !url.is_empty()),
            initial,
            body: comment.comment,
            time_ago: comment.time_ago,
        }
    }
}

/// Everything the product detail page renders.
pub struct ProductPage {
    pub id: String,
    pub href: String,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub main_image: String,
    pub thumbnails: Vec<Thumbnail>,
    pub featured: bool,
    pub in_stock: bool,
    pub price_display: String,
    pub prices: Vec<String>,
    pub weights: Vec<String>,
    pub sizes: Vec<String>,
    pub average_rating: String,
    pub rating_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub has_liked: bool,
    pub user_rating: Option<u8>,
    pub stars: Vec<Star>,
    pub comments: Vec<CommentView>,
}

impl ProductPage {
    /// Build the page from the RPC payload. `image` selects the main image
    /// and is clamped to the gallery.
    #[must_use]
    pub fn new(details: ProductDetails, image: Option<usize>, currency: Currency) -> Option<Self> {
        let product = details.product?;
        let href = format!("/shop/{}", product.id);

        let images: Vec<String> = product
            .images
            .into_iter()
            .filter(|url| !url.is_empty())
            .collect();
        let selected = image.unwrap_or(0).min(images.len().saturating_sub(1));
        let main_image = images
            .get(selected)
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());
        let thumbnails = if images.len() > 1 {
            images
                .iter()
                .enumerate()
                .map(|(i, url)| Thumbnail {
                    href: format!("{href}?image={i}"),
                    url: url.clone(),
                    active: i == selected,
                })
                .collect()
        } else {
            Vec::new()
        };

        let user_rating = details
            .user_interactions
            .user_rating
            .and_then(|r| Rating::new(r).ok());
        let stars = star_states(user_rating, product.average_rating)
            .into_iter()
            .zip(1_u8..)
            .map(|(state, value)| Star {
                value,
                class: state.css_class(),
            })
            .collect();

        let price_display = product
            .price_display
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| price_range_display(&product.price, currency));

        Some(Self {
            id: product.id.to_string(),
            href,
            title: product.title,
            description: product.description,
            categories: product.category,
            main_image,
            thumbnails,
            featured: product.featured,
            in_stock: product.stock,
            price_display,
            prices: product.price,
            weights: product.weight,
            sizes: product.size,
            average_rating: format!("{:.1}", product.average_rating),
            rating_count: product.rating_count,
            likes_count: product.likes_count,
            comments_count: product.comments_count,
            has_liked: details.user_interactions.has_liked,
            user_rating: user_rating.map(Rating::get),
            stars,
            comments: details.comments.into_iter().map(CommentView::from).collect(),
        })
    }
}

// =============================================================================
// Filtering
// =============================================================================

/// Products matching the search text and category.
///
/// The search is a case-insensitive substring match over title, description
/// and categories. Blank parameters do not filter.
#[must_use]
pub fn filter_products<'a>(
    products: &'a [ProductSummary],
    query: Option<&str>,
    category: Option<&str>,
) -> Vec<&'a ProductSummary> {
    let query = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let category = category.map(str::trim).filter(|c| !c.is_empty());

    products
        .iter()
        .filter(|p| {
            category.is_none_or(|wanted| p.category.iter().any(|c| c.eq_ignore_ascii_case(wanted)))
        })
        .filter(|p| {
            query.as_deref().is_none_or(|q| {
                p.title.to_lowercase().contains(q)
                    || p.description.to_lowercase().contains(q)
                    || p.category.iter().any(|c| c.to_lowercase().contains(q))
            })
        })
        .collect()
}

/// Distinct categories across the catalog, sorted.
#[must_use]
pub fn categories(products: &[ProductSummary]) -> Vec<String> {
    products
        .iter()
        .flat_map(|p| p.category.iter())
        .filter(|c| !c.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn category_chips(all: Vec<String>, query: &str, active: &str) -> Vec<CategoryChip> {
    all.into_iter()
        .map(|name| {
            let mut href = format!("/shop?category={}", urlencoding::encode(&name));
            if !query.is_empty() {
                href.push_str(&format!("&q={}", urlencoding::encode(query)));
            }
            CategoryChip {
                active: name.eq_ignore_ascii_case(active),
                name,
                href,
            }
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Shop query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

/// Product detail query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub image: Option<usize>,
}

/// Shop grid template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/index.html")]
pub struct ShopIndexTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub products: Vec<ProductCard>,
    pub categories: Vec<CategoryChip>,
    pub query: String,
    pub category: String,
    pub load_failed: bool,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub product: ProductPage,
    pub signed_in: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the product grid.
#[instrument(skip(state, user, nonce, flash))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    nonce: CspNonce,
    Query(query): Query<ShopQuery>,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let search = query.q.unwrap_or_default();
    let category = query.category.unwrap_or_default();
    let currency = state.config().pricing.currency;

    let (products, chips, load_failed) = match state.backend().list_product_summaries().await {
        Ok(all) => {
            let products = filter_products(&all, Some(&search), Some(&category))
                .into_iter()
                .map(|p| ProductCard::from_summary(p, currency))
                .collect();
            let chips = category_chips(categories(&all), &search, &category);
            (products, chips, false)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load products");
            (Vec::new(), Vec::new(), true)
        }
    };

    let ctx = PageContext::new(
        &state,
        nonce,
        user.as_ref(),
        PageMeta::shop(state.config()),
    )
    .await;

    ShopIndexTemplate {
        ctx,
        flash: flash.into_flash(),
        products,
        categories: chips,
        query: search,
        category,
        load_failed,
    }
}

/// Display a product.
#[instrument(skip(state, user, nonce, flash))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    nonce: CspNonce,
    Path(id): Path<String>,
    Query(query): Query<ProductQuery>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let path = format!("/shop/{id}");
    let Ok(product_id) = id.parse::<ProductId>() else {
        return product_not_found(&state, nonce, user.as_ref(), &path).await;
    };

    let details = match state
        .backend()
        .get_product_with_details(
            product_id,
            user.as_ref().map(|u| u.id),
            user.as_ref().map(|u| u.access_token.as_str()),
        )
        .await
    {
        Ok(details) => details,
        Err(BackendError::NotFound(_)) => {
            return product_not_found(&state, nonce, user.as_ref(), &path).await;
        }
        Err(e) => {
            tracing::error!(%product_id, error = %e, "Failed to load product");
            return AppError::from(e).into_response();
        }
    };

    let meta = PageMeta::product(state.config(), &path, details.product.as_ref());
    let Some(product) = ProductPage::new(details, query.image, state.config().pricing.currency)
    else {
        return product_not_found(&state, nonce, user.as_ref(), &path).await;
    };

    let ctx = PageContext::new(&state, nonce, user.as_ref(), meta).await;
    ProductShowTemplate {
        ctx,
        flash: flash.into_flash(),
        product,
        signed_in: user.is_some(),
    }
    .into_response()
}

async fn product_not_found(
    state: &AppState,
    nonce: CspNonce,
    user: Option<&CurrentUser>,
    path: &str,
) -> Response {
    let meta = PageMeta::product(state.config(), path, None);
    NotFoundTemplate::respond(PageContext::new(state, nonce, user, meta).await)
}

/// Toggle the viewer's like.
#[instrument(skip(state, user))]
pub async fn like(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Redirect {
    let path = format!("/shop/{product_id}");
    let Some(user) = user else {
        return login_prompt(LoginAction::Like, &path);
    };

    match state
        .backend()
        .toggle_product_like(&user.access_token, product_id)
        .await
    {
        Ok(result) => {
            add_breadcrumb("engagement", "Product like toggled", None);
            tracing::info!(%product_id, liked = result.liked, "Like toggled");
            Redirect::to(&path)
        }
        Err(e) => {
            tracing::warn!(%product_id, error = %e, "Like failed");
            Redirect::to(&format!("{path}?error=like_failed"))
        }
    }
}

/// Rating form data.
#[derive(Debug, Deserialize)]
pub struct RateForm {
    pub rating: String,
}

/// Rate a product 1-5.
#[instrument(skip(state, user))]
pub async fn rate(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<RateForm>,
) -> Redirect {
    let path = format!("/shop/{product_id}");
    let Some(user) = user else {
        return login_prompt(LoginAction::Rate, &path);
    };

    let Some(rating) = form
        .rating
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|r| Rating::new(r).ok())
    else {
        return Redirect::to(&format!("{path}?error=rating_invalid"));
    };

    match state
        .backend()
        .rate_product(&user.access_token, product_id, rating)
        .await
    {
        Ok(_) => Redirect::to(&format!("{path}?notice=rated")),
        Err(e) => {
            tracing::warn!(%product_id, error = %e, "Rating failed");
            Redirect::to(&format!("{path}?error=rating_failed"))
        }
    }
}

/// Comment form data.
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub comment: String,
}

/// Add a comment.
#[instrument(skip(state, user, form))]
pub async fn comment(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<CommentForm>,
) -> Redirect {
    let path = format!("/shop/{product_id}");
    let Some(user) = user else {
        return login_prompt(LoginAction::Comment, &path);
    };

    let Ok(body) = CommentBody::parse(&form.comment) else {
        return Redirect::to(&format!("{path}?error=comment_invalid#comments"));
    };

    match state
        .backend()
        .add_product_comment(&user.access_token, product_id, body.as_str())
        .await
    {
        Ok(_) => Redirect::to(&format!("{path}?notice=comment_added#comments")),
        Err(e) => {
            tracing::warn!(%product_id, error = %e, "Comment failed");
            Redirect::to(&format!("{path}?error=comment_failed#comments"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn summary(title: &str, description: &str, categories: &[&str]) -> ProductSummary {
        serde_json::from_value(serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "title": title,
            "price": 120,
            "description": description,
            "category": categories,
        }))
        .unwrap()
    }

    fn catalog() -> Vec<ProductSummary> {
        vec![
            summary("Ferforje Kapı Kolu", "El yapımı dövme demir", &["Kapı", "Dekor"]),
            summary("Raf Braketi", "Galvaniz kaplı çelik", &["Raf"]),
            summary("Vida Seti", "Paslanmaz M6 vida", &["Bağlantı"]),
        ]
    }

    #[test]
    fn test_filter_matches_title_description_and_category() {
        let products = catalog();
        let titles = |q: &str| -> Vec<String> {
            filter_products(&products, Some(q), None)
                .iter()
                .map(|p| p.title.clone())
                .collect()
        };
        assert_eq!(titles("braket"), vec!["Raf Braketi"]);
        assert_eq!(titles("PASLANMAZ"), vec!["Vida Seti"]);
        assert_eq!(titles("dekor"), vec!["Ferforje Kapı Kolu"]);
        assert_eq!(titles("  ").len(), 3);
    }

    #[test]
    fn test_filter_by_category() {
        let products = catalog();
        let found = filter_products(&products, None, Some("raf"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Raf Braketi");
        assert!(filter_products(&products, Some("vida"), Some("Raf")).is_empty());
    }

    #[test]
    fn test_categories_sorted_and_unique() {
        let mut products = catalog();
        products.push(summary("Askı", "", &["Dekor"]));
        assert_eq!(categories(&products), vec!["Bağlantı", "Dekor", "Kapı", "Raf"]);
    }

    #[test]
    fn test_card_truncates_and_falls_back() {
        let long = "ç".repeat(150);
        let product = summary("Uzun", &long, &[]);
        let card = ProductCard::from_summary(&product, Currency::Try);
        assert_eq!(card.excerpt.chars().count(), CARD_DESCRIPTION_CHARS + 3);
        assert_eq!(card.image, PLACEHOLDER_IMAGE);
        assert_eq!(card.price, "₺120.00");
        assert!(card.category.is_none());
    }

    fn details(images: &[&str], user_rating: Option<i64>) -> ProductDetails {
        serde_json::from_value(serde_json::json!({
            "product": {
                "id": "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b",
                "title": "Ferforje Kapı Kolu",
                "price": ["120", "180"],
                "images": images,
                "average_rating": 3.6,
                "rating_count": 5
            },
            "user_interactions": { "has_liked": true, "user_rating": user_rating },
            "comments": [{
                "id": "0b7e3c1a-1111-4222-8333-944455556666",
                "comment": "Çok sağlam",
                "username": "mehmet"
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_product_page_clamps_selected_image() {
        let page = ProductPage::new(details(&["a.jpg", "b.jpg"], None), Some(9), Currency::Try)
            .unwrap();
        assert_eq!(page.main_image, "b.jpg");
        assert_eq!(page.thumbnails.len(), 2);
        assert!(page.thumbnails[1].active);
        assert_eq!(page.price_display, "₺120.00 - ₺180.00");
        assert!(page.has_liked);
        assert_eq!(page.comments[0].initial, "M");
    }

    #[test]
    fn test_product_page_without_images() {
        let page = ProductPage::new(details(&[], None), None, Currency::Try).unwrap();
        assert_eq!(page.main_image, PLACEHOLDER_IMAGE);
        assert!(page.thumbnails.is_empty());
    }

    #[test]
    fn test_product_page_stars() {
        let page = ProductPage::new(details(&["a.jpg"], None), None, Currency::Try).unwrap();
        let filled = page.stars.iter().filter(|s| s.class != "star").count();
        assert_eq!(filled, 3);
        assert!(page.thumbnails.is_empty());

        let rated = ProductPage::new(details(&["a.jpg"], Some(5)), None, Currency::Try).unwrap();
        assert_eq!(rated.user_rating, Some(5));
        assert!(rated.stars.iter().all(|s| s.class == "star star--own"));
        assert_eq!(rated.stars[4].value, 5);
    }
}
