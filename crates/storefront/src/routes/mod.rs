//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Home page
//!
//! # Shop
//! GET  /shop                           - Product grid (?q, ?category)
//! GET  /shop/{id}                      - Product detail (?image=n)
//! POST /shop/{id}/like                 - Toggle like
//! POST /shop/{id}/rate                 - Rate 1-5
//! POST /shop/{id}/comments             - Add comment
//!
//! # Cart (HTMX fragments)
//! GET  /cart                           - Cart page
//! POST /cart/add                       - Add to cart (count badge + cart-updated trigger)
//! POST /cart/update                    - Update quantity (cart_items fragment)
//! POST /cart/remove                    - Remove line (cart_items fragment)
//! GET  /cart/count                     - Cart count badge (fragment)
//! POST /checkout                       - Turn the cart into a pending order
//!
//! # Profile (requires auth)
//! GET  /profile                        - Profile, orders, liked products
//! POST /profile                        - Update name and avatar
//! POST /profile/likes/{product_id}/delete
//! POST /profile/cart/{order_id}/delete
//!
//! # Auth
//! GET  /auth                           - Sign-in / sign-up page
//! POST /auth/login | /auth/register | /auth/logout
//! GET  /auth/google                    - Start Google OAuth (PKCE)
//! GET  /auth/callback                  - OAuth code exchange
//!
//! # Admin (requires admin)
//! GET  /admin                          - Tabbed panel (?tab=products|orders)
//! GET  /admin/products                 - Product table (?q)
//! GET  /admin/products/new             - Create form
//! POST /admin/products                 - Create (multipart)
//! GET  /admin/products/{id}/edit       - Edit form
//! POST /admin/products/{id}            - Update (multipart)
//! POST /admin/products/{id}/delete
//! GET  /admin/orders                   - Order table with stats (?q, ?status)
//! POST /admin/orders/{id}/status
//! POST /admin/orders/{id}/delete
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod home;
pub mod profile;
pub mod shop;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::filters;
use crate::middleware::{CspNonce, api_rate_limiter, auth_rate_limiter};
use crate::models::CurrentUser;
use crate::seo::PageMeta;
use crate::state::AppState;

/// Largest accepted admin product form, images included.
const ADMIN_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Shown wherever a product has no image.
pub const PLACEHOLDER_IMAGE: &str = "/static/images/placeholder.svg";

// =============================================================================
// Shared page context
// =============================================================================

/// Data every full page needs for the base layout.
pub struct PageContext {
    pub nonce: String,
    pub meta: PageMeta,
    /// Navigation label for the signed-in user.
    pub user_name: Option<String>,
    pub is_admin: bool,
}

impl PageContext {
    /// Build the layout context. Admin membership is looked up (and cached)
    /// so the navigation can show the admin link.
    pub async fn new(
        state: &AppState,
        nonce: CspNonce,
        user: Option<&CurrentUser>,
        meta: PageMeta,
    ) -> Self {
        let is_admin = match user {
            Some(user) => state
                .backend()
                .is_admin(&user.access_token, user.id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Admin lookup failed for navigation");
                    false
                }),
            None => false,
        };

        Self {
            nonce: nonce.0,
            meta,
            user_name: user.map(|u| u.display_name().to_string()),
            is_admin,
        }
    }
}

/// `?notice=` / `?error=` flash codes set by post-redirect-get handlers.
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// A message shown at the top of a page.
pub struct Flash {
    pub kind: &'static str,
    pub text: String,
}

impl FlashQuery {
    /// Resolve the flash codes into display text. Unknown codes are ignored.
    #[must_use]
    pub fn into_flash(self) -> Option<Flash> {
        if let Some(text) = self.error.as_deref().and_then(error_text) {
            return Some(Flash {
                kind: "error",
                text: text.to_string(),
            });
        }
        self.notice
            .as_deref()
            .and_then(notice_text)
            .map(|text| Flash {
                kind: "notice",
                text: text.to_string(),
            })
    }
}

fn notice_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "order_placed" => "Siparişiniz alındı! Sipariş takibinden durumunu izleyebilirsiniz.",
        "profile_saved" => "Profil bilgileriniz güncellendi.",
        "unliked" => "Ürün beğenilerden kaldırıldı.",
        "cart_removed" => "Ürün sepetinizden başarıyla kaldırıldı.",
        "confirm_email" => "Kayıt başarılı! Hesabınızı etkinleştirmek için e-postanızı kontrol edin.",
        "signed_out" => "Çıkış yapıldı.",
        "added_to_cart" => "Ürün sepete eklendi.",
        "comment_added" => "Yorumunuz eklendi.",
        "rated" => "Değerlendirmeniz kaydedildi.",
        "product_saved" => "Product saved.",
        "product_deleted" => "Product deleted.",
        "order_updated" => "Order status updated.",
        "order_deleted" => "Order deleted.",
        _ => return None,
    })
}

fn error_text(code: &str) -> Option<&'static str> {
    Some(match code {
        "credentials" => "E-posta veya şifre hatalı.",
        "invalid_email" => "Geçerli bir e-posta adresi girin.",
        "password_too_short" => "Şifre en az 6 karakter olmalıdır.",
        "password_mismatch" => "Şifreler eşleşmiyor.",
        "signup_failed" => "Kayıt başarısız oldu. Bu e-posta zaten kullanılıyor olabilir.",
        "oauth" => "Google ile giriş başarısız oldu. Lütfen tekrar deneyin.",
        "session" => "Oturum açılamadı. Lütfen tekrar deneyin.",
        "invalid_avatar" => "Lütfen listeden bir avatar seçin.",
        "profile_failed" => "Profil güncellenirken hata oluştu.",
        "comment_invalid" => "Yorum boş olamaz ve en fazla 500 karakter olabilir.",
        "comment_failed" => "Yorum eklenirken hata oluştu.",
        "rating_invalid" => "Puan 1 ile 5 arasında olmalıdır.",
        "rating_failed" => "Değerlendirme kaydedilemedi.",
        "like_failed" => "Beğeni kaydedilemedi.",
        "cart_failed" => "Ürün sepete eklenemedi.",
        "cart_update_failed" => "Sepet güncellenemedi.",
        "checkout_failed" => "Sipariş oluşturulurken hata oluştu.",
        "unexpected" => "Beklenmedik bir hata oluştu",
        "upload_failed" => "Some images could not be uploaded.",
        "product_invalid" => "Title and at least one price are required.",
        "product_failed" => "The product could not be saved.",
        "order_failed" => "The order could not be updated.",
        _ => return None,
    })
}

/// Page shown for unknown products and paths.
#[derive(Template, WebTemplate)]
#[template(path = "errors/not_found.html")]
pub struct NotFoundTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
}

impl NotFoundTemplate {
    /// Render with a 404 status.
    #[must_use]
    pub fn respond(ctx: PageContext) -> Response {
        (StatusCode::NOT_FOUND, Self { ctx, flash: None }).into_response()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Actions that send anonymous visitors to the sign-in page with a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    Cart,
    Like,
    Comment,
    Rate,
}

impl LoginAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Rate => "rate",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cart" => Some(Self::Cart),
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "rate" => Some(Self::Rate),
            _ => None,
        }
    }

    /// Prompt shown above the sign-in form.
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Cart => "Ürünleri sepete eklemek ve satın almak için",
            Self::Like => "Ürünleri beğenmek ve favorilere eklemek için",
            Self::Comment => "Ürünler hakkında yorum yapmak için",
            Self::Rate => "Ürünleri puanlamak için",
        }
    }
}

/// Sign-in page URL carrying the prompt for `action`.
#[must_use]
pub fn login_prompt_url(action: LoginAction, next: &str) -> String {
    format!(
        "/auth?action={}&next={}",
        action.as_str(),
        urlencoding::encode(next)
    )
}

/// Redirect an anonymous visitor to the sign-in prompt for `action`.
#[must_use]
pub fn login_prompt(action: LoginAction, next: &str) -> Redirect {
    Redirect::to(&login_prompt_url(action, next))
}

/// Accept only local absolute paths as post-login targets.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

/// Cut `text` to `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Whether the request was issued by htmx.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

// =============================================================================
// Routers
// =============================================================================

/// Create the shop routes router.
pub fn shop_routes(trust_proxy_headers: bool) -> Router<AppState> {
    let engagement = Router::new()
        .route("/{id}/like", post(shop::like))
        .route("/{id}/rate", post(shop::rate))
        .route("/{id}/comments", post(shop::comment))
        .layer(api_rate_limiter(trust_proxy_headers));

    Router::new()
        .route("/", get(shop::index))
        .route("/{id}", get(shop::show))
        .merge(engagement)
}

/// Create the cart routes router.
pub fn cart_routes(trust_proxy_headers: bool) -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .layer(api_rate_limiter(trust_proxy_headers));

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show).post(profile::update))
        .route("/likes/{product_id}/delete", post(profile::unlike))
        .route("/cart/{order_id}/delete", post(profile::delete_cart_item))
}

/// Create the auth routes router.
pub fn auth_routes(trust_proxy_headers: bool) -> Router<AppState> {
    let credentials = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(auth_rate_limiter(trust_proxy_headers));

    Router::new()
        .route("/", get(auth::page))
        .route("/logout", post(auth::logout))
        .route("/google", get(auth::google))
        .route("/callback", get(auth::callback))
        .merge(credentials)
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::index))
        .route(
            "/products",
            get(admin::products::index).post(admin::products::create),
        )
        .route("/products/new", get(admin::products::new))
        .route("/products/{id}", post(admin::products::update))
        .route("/products/{id}/edit", get(admin::products::edit))
        .route("/products/{id}/delete", post(admin::products::delete))
        .route("/orders", get(admin::orders::index))
        .route("/orders/{id}/status", post(admin::orders::update_status))
        .route("/orders/{id}/delete", post(admin::orders::delete))
        .layer(DefaultBodyLimit::max(ADMIN_UPLOAD_LIMIT))
}

/// Create all routes for the storefront.
///
/// `trust_proxy_headers` decides whether rate limits key on proxy headers.
pub fn routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/shop", shop_routes(trust_proxy_headers))
        .nest("/cart", cart_routes(trust_proxy_headers))
        .route("/checkout", post(cart::checkout))
        .nest("/profile", profile_routes())
        .nest("/auth", auth_routes(trust_proxy_headers))
        .nest("/admin", admin_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_accepts_local_paths_only() {
        assert_eq!(safe_next(Some("/shop/abc?image=2")), "/shop/abc?image=2");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/cart\r\nSet-Cookie: x")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_login_prompt_roundtrip() {
        for action in [
            LoginAction::Cart,
            LoginAction::Like,
            LoginAction::Comment,
            LoginAction::Rate,
        ] {
            assert_eq!(LoginAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(LoginAction::parse("checkout"), None);
        assert_eq!(
            login_prompt_url(LoginAction::Cart, "/shop/a b"),
            "/auth?action=cart&next=%2Fshop%2Fa%20b"
        );
    }

    #[test]
    fn test_flash_prefers_error() {
        let flash = FlashQuery {
            notice: Some("profile_saved".into()),
            error: Some("credentials".into()),
        }
        .into_flash()
        .map(|f| f.kind);
        assert_eq!(flash, Some("error"));

        let unknown = FlashQuery {
            notice: Some("<script>".into()),
            error: None,
        };
        assert!(unknown.into_flash().is_none());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("kısa", 100), "kısa");
        let long = "ğ".repeat(120);
        let cut = truncate_chars(&long, 100);
        assert_eq!(cut.chars().count(), 103);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_is_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("HX-Request", axum::http::HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }
}
