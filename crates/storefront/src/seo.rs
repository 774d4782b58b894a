//! Per-page metadata: title, description, canonical URL, Open Graph and
//! Twitter card tags.

use crate::backend::ProductDetail;
use crate::config::StorefrontConfig;

/// Brand name appended to page titles.
pub const SITE_NAME: &str = "LESE Metalcraft";

const HOME_TITLE: &str = "LESE - Metalcraft";
const HOME_DESCRIPTION: &str = "LESE Metalcraft Ltd. Şti. - Hassas Metal İşleme ve Üretim";
const PRODUCT_FALLBACK_NAME: &str = "Ürün Detayı";
const PRODUCT_FALLBACK_DESCRIPTION: &str = "LESE Metalcraft ürün sayfası";
const PRODUCT_DESCRIPTION_SUFFIX: &str = "| LESE Metalcraft hassas metal işleme ürünleri.";

/// Longest product description excerpt used in meta tags.
const DESCRIPTION_EXCERPT_CHARS: usize = 155;

/// Default share image, relative to the storefront root.
const DEFAULT_IMAGE_PATH: &str = "/static/images/og.png";

/// Open Graph image.
#[derive(Debug, Clone)]
pub struct OgImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub alt: String,
}

/// Metadata rendered into the `<head>` of every page.
#[derive(Debug, Clone)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical: String,
    pub og_type: &'static str,
    pub image: OgImage,
    pub twitter_card: &'static str,
    /// Keep private pages out of search indexes.
    pub noindex: bool,
}

impl PageMeta {
    fn new(
        config: &StorefrontConfig,
        path: &str,
        title: String,
        description: String,
        image_alt: String,
    ) -> Self {
        Self {
            title,
            description,
            canonical: config.absolute_url(path),
            og_type: "website",
            image: OgImage {
                url: config.absolute_url(DEFAULT_IMAGE_PATH),
                width: 1200,
                height: 630,
                alt: image_alt,
            },
            twitter_card: "summary_large_image",
            noindex: false,
        }
    }

    /// A section page titled `<title> - LESE Metalcraft`.
    fn section(config: &StorefrontConfig, path: &str, title: &str, alt: &str, desc: &str) -> Self {
        Self::new(
            config,
            path,
            format!("{title} - {SITE_NAME}"),
            desc.to_string(),
            format!("{SITE_NAME} - {alt}"),
        )
    }

    const fn private(mut self) -> Self {
        self.noindex = true;
        self
    }

    #[must_use]
    pub fn home(config: &StorefrontConfig) -> Self {
        Self::new(
            config,
            "/",
            HOME_TITLE.to_string(),
            HOME_DESCRIPTION.to_string(),
            HOME_TITLE.to_string(),
        )
    }

    #[must_use]
    pub fn shop(config: &StorefrontConfig) -> Self {
        Self::section(
            config,
            "/shop",
            "Mağaza",
            "Mağaza",
            "LESE Metalcraft ürün kataloğu. Hassas metal işleme parçaları, özel üretim \
             çözümleri ve endüstriyel ürünler.",
        )
    }

    #[must_use]
    pub fn cart(config: &StorefrontConfig) -> Self {
        Self::section(
            config,
            "/cart",
            "Sepetim",
            "Sepet",
            "LESE Metalcraft alışveriş sepetiniz. Seçtiğiniz ürünleri gözden geçirin ve \
             siparişinizi tamamlayın.",
        )
        .private()
    }

    #[must_use]
    pub fn profile(config: &StorefrontConfig) -> Self {
        Self::section(
            config,
            "/profile",
            "Profilim",
            "Profil",
            "LESE Metalcraft profil sayfanız. Hesap bilgilerinizi güncelleyin, sipariş \
             geçmişinizi görüntüleyin.",
        )
        .private()
    }

    #[must_use]
    pub fn auth(config: &StorefrontConfig) -> Self {
        Self::section(
            config,
            "/auth",
            "Giriş Yap",
            "Giriş",
            "LESE Metalcraft hesabınıza giriş yapın. Özel fiyatlar ve hızlı sipariş \
             imkanlarından yararlanın.",
        )
    }

    #[must_use]
    pub fn admin(config: &StorefrontConfig, section: &str) -> Self {
        Self::section(config, "/admin", section, "Admin", "LESE Metalcraft admin panel.")
            .private()
    }

    /// Metadata for unknown paths.
    #[must_use]
    pub fn not_found(config: &StorefrontConfig) -> Self {
        Self::section(config, "/", "Sayfa Bulunamadı", "404", HOME_DESCRIPTION).private()
    }

    /// Product page metadata. `None` renders the generic product fallback.
    #[must_use]
    pub fn product(config: &StorefrontConfig, path: &str, product: Option<&ProductDetail>) -> Self {
        let (name, description) = product.map_or(
            (PRODUCT_FALLBACK_NAME, PRODUCT_FALLBACK_DESCRIPTION),
            |p| (p.title.as_str(), p.description.as_str()),
        );

        let mut meta = Self::new(
            config,
            path,
            format!("{name} - {SITE_NAME}"),
            format!("{} {PRODUCT_DESCRIPTION_SUFFIX}", excerpt(description)),
            name.to_string(),
        );
        meta.og_type = "product";

        let image = product.and_then(|p| {
            p.primary_image
                .clone()
                .or_else(|| p.images.first().cloned())
        });
        if let Some(url) = image {
            meta.image.url = url;
        }
        meta
    }
}

/// Collapse whitespace and cut at a character boundary.
fn excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= DESCRIPTION_EXCERPT_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(DESCRIPTION_EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_section_titles() {
        let config = test_config();
        assert_eq!(PageMeta::shop(&config).title, "Mağaza - LESE Metalcraft");
        assert_eq!(PageMeta::home(&config).title, "LESE - Metalcraft");
        assert_eq!(
            PageMeta::cart(&config).canonical,
            "https://lesemetalcraft.com/cart"
        );
        assert!(PageMeta::profile(&config).noindex);
        assert!(!PageMeta::auth(&config).noindex);
    }

    #[test]
    fn test_product_fallback() {
        let config = test_config();
        let meta = PageMeta::product(&config, "/shop/x", None);
        assert_eq!(meta.title, "Ürün Detayı - LESE Metalcraft");
        assert_eq!(
            meta.description,
            "LESE Metalcraft ürün sayfası | LESE Metalcraft hassas metal işleme ürünleri."
        );
        assert_eq!(meta.og_type, "product");
    }

    #[test]
    fn test_product_uses_name_and_image() {
        let config = test_config();
        let detail: ProductDetail = serde_json::from_value(serde_json::json!({
            "id": "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b",
            "title": "Ferforje Kapı Kolu",
            "description": "El   yapımı\ndövme demir",
            "images": ["https://cdn/a.jpg", "https://cdn/b.jpg"]
        }))
        .unwrap();
        let meta = PageMeta::product(&config, "/shop/6f1c", Some(&detail));
        assert_eq!(meta.title, "Ferforje Kapı Kolu - LESE Metalcraft");
        assert!(meta.description.starts_with("El yapımı dövme demir |"));
        assert_eq!(meta.image.url, "https://cdn/a.jpg");
        assert_eq!(meta.image.alt, "Ferforje Kapı Kolu");
    }

    #[test]
    fn test_excerpt_cuts_on_char_boundary() {
        let long = "ş".repeat(200);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), DESCRIPTION_EXCERPT_CHARS + 3);
        assert!(cut.ends_with("..."));
    }
}
