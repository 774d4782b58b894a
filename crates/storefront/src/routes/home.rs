//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use tracing::instrument;

use super::shop::ProductCard;
use super::{Flash, FlashQuery, PageContext};
use crate::backend::ProductSummary;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::seo::PageMeta;
use crate::state::AppState;

/// Products shown in the featured strip.
const FEATURED_LIMIT: usize = 6;

/// A titled card in the benefits and features sections.
pub struct Highlight {
    pub icon: &'static str,
    pub title: &'static str,
    pub text: &'static str,
}

const BENEFITS: [Highlight; 4] = [
    Highlight {
        icon: "◆",
        title: "Hassas Üretim",
        text: "CNC ve kalıp tezgahlarımızda mikron seviyesinde tolerans ile üretim.",
    },
    Highlight {
        icon: "⚙",
        title: "Özel Tasarım",
        text: "Çiziminizden ya da fikrinizden yola çıkarak size özel parça tasarlıyoruz.",
    },
    Highlight {
        icon: "✓",
        title: "Kalite Kontrol",
        text: "Her parti sevkiyattan önce ölçüm ve yüzey kontrolünden geçer.",
    },
    Highlight {
        icon: "➜",
        title: "Zamanında Teslimat",
        text: "Planlanan termin içinde, güvenli ambalajla kapınıza teslim.",
    },
];

const FEATURES: [Highlight; 6] = [
    Highlight {
        icon: "▣",
        title: "Kalıp Üretimi",
        text: "Sac şekillendirme ve döküm için dayanıklı kalıplar.",
    },
    Highlight {
        icon: "⬡",
        title: "Bağlantı Elemanları",
        text: "Standart ve özel ölçülerde vida, somun ve pul.",
    },
    Highlight {
        icon: "◧",
        title: "Sac İşleme",
        text: "Lazer kesim, büküm ve kaynaklı imalat.",
    },
    Highlight {
        icon: "◎",
        title: "Talaşlı İmalat",
        text: "Torna ve freze ile seri ya da tekil parça üretimi.",
    },
    Highlight {
        icon: "◈",
        title: "Yüzey İşlemleri",
        text: "Galvaniz, boya ve kaplama seçenekleri.",
    },
    Highlight {
        icon: "☰",
        title: "Ferforje ve Dekor",
        text: "El işçiliği ile kapı, korkuluk ve dekoratif ürünler.",
    },
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub featured: Vec<ProductCard>,
    pub benefits: &'static [Highlight],
    pub features: &'static [Highlight],
    pub contact_email: Option<String>,
}

/// Featured products first, topped up with the newest products.
///
/// The listing arrives newest first, so the order within each group is kept.
#[must_use]
pub fn pick_featured(products: &[ProductSummary], limit: usize) -> Vec<&ProductSummary> {
    products
        .iter()
        .filter(|p| p.featured)
        .chain(products.iter().filter(|p| !p.featured))
        .take(limit)
        .collect()
}

/// Display the home page.
#[instrument(skip(state, user, nonce, flash))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    nonce: CspNonce,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let currency = state.config().pricing.currency;

    // The home page still renders when the catalog is unreachable.
    let featured = match state.backend().list_product_summaries().await {
        Ok(products) => pick_featured(&products, FEATURED_LIMIT)
            .into_iter()
            .map(|p| ProductCard::from_summary(p, currency))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load featured products");
            Vec::new()
        }
    };

    let ctx = PageContext::new(
        &state,
        nonce,
        user.as_ref(),
        PageMeta::home(state.config()),
    )
    .await;

    HomeTemplate {
        ctx,
        flash: flash.into_flash(),
        featured,
        benefits: &BENEFITS,
        features: &FEATURES,
        contact_email: state.config().contact_email.clone(),
    }
}
