//! Admin product management: table, create and edit forms, image uploads.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use lese_core::{Currency, ProductId, price_range_display, split_csv_field};
use serde::Deserialize;
use tracing::instrument;

use super::AdminTab;
use crate::backend::{ProductInput, ProductRecord, product_image_path};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::models::CurrentUser;
use crate::routes::{Flash, FlashQuery, PLACEHOLDER_IMAGE, PageContext};
use crate::seo::PageMeta;
use crate::state::AppState;

/// Multipart field carrying new image files.
const IMAGE_FIELD: &str = "images";

/// Multipart field listing existing images to keep on update.
const KEEP_IMAGE_FIELD: &str = "keep_image";

/// Sent alongside the keep checkboxes. Without it the stored images are left
/// as they are, so an unchecked list can be told apart from an absent one.
const IMAGE_SELECTION_FIELD: &str = "image_selection";

// =============================================================================
// Search
// =============================================================================

/// `/admin/products` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductSearch {
    pub q: Option<String>,
}

/// Products whose title, description or categories contain `query`,
/// ignoring case. A blank query keeps everything.
#[must_use]
pub fn filter_records<'a>(products: &'a [ProductRecord], query: &str) -> Vec<&'a ProductRecord> {
    let query = query.trim().to_lowercase();
    products
        .iter()
        .filter(|p| {
            query.is_empty()
                || p.title.to_lowercase().contains(&query)
                || p.description.to_lowercase().contains(&query)
                || p.category.iter().any(|c| c.to_lowercase().contains(&query))
        })
        .collect()
}

// =============================================================================
// View models
// =============================================================================

/// A row of the product table.
pub struct ProductRow {
    pub id: String,
    pub title: String,
    pub price: String,
    pub categories: String,
    pub image: String,
    pub in_stock: bool,
    pub featured: bool,
    pub sort_order: i32,
}

impl ProductRow {
    fn new(product: &ProductRecord, currency: Currency) -> Self {
        Self {
            id: product.id.to_string(),
            title: product.title.clone(),
            price: price_range_display(&product.price, currency),
            categories: product.category.join(", "),
            image: product
                .images
                .iter()
                .find(|url| !url.is_empty())
                .cloned()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            in_stock: product.stock,
            featured: product.featured,
            sort_order: product.sort_order,
        }
    }
}

/// Values shown in the product form.
pub struct ProductFormView {
    pub action: String,
    pub is_new: bool,
    pub title: String,
    pub price: String,
    pub description: String,
    pub category: String,
    pub weight: String,
    pub size: String,
    pub stock: bool,
    pub featured: bool,
    pub sort_order: i32,
    pub images: Vec<String>,
}

impl ProductFormView {
    fn blank() -> Self {
        Self {
            action: "/admin/products".to_string(),
            is_new: true,
            title: String::new(),
            price: String::new(),
            description: String::new(),
            category: String::new(),
            weight: String::new(),
            size: String::new(),
            stock: true,
            featured: false,
            sort_order: 0,
            images: Vec::new(),
        }
    }
}

impl From<ProductRecord> for ProductFormView {
    fn from(product: ProductRecord) -> Self {
        Self {
            action: format!("/admin/products/{}", product.id),
            is_new: false,
            title: product.title,
            price: product.price.join(", "),
            description: product.description,
            category: product.category.join(", "),
            weight: product.weight.join(", "),
            size: product.size.join(", "),
            stock: product.stock,
            featured: product.featured,
            sort_order: product.sort_order,
            images: product.images,
        }
    }
}

// =============================================================================
// Form parsing
// =============================================================================

/// Text fields of the product form, collected from the multipart stream.
#[derive(Debug, Default)]
pub struct ProductFields {
    title: String,
    price: String,
    description: String,
    category: String,
    weight: String,
    size: String,
    stock: bool,
    featured: bool,
    sort_order: String,
    keep_images: Vec<String>,
    image_selection: bool,
}

/// The product form is missing its title or price.
#[derive(Debug, PartialEq, Eq)]
pub struct MissingRequired;

impl ProductFields {
    /// Record one form field. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "price" => self.price = value,
            "description" => self.description = value,
            "category" => self.category = value,
            "weight" => self.weight = value,
            "size" => self.size = value,
            "stock" => self.stock = is_checked(&value),
            "featured" => self.featured = is_checked(&value),
            "sort_order" => self.sort_order = value,
            KEEP_IMAGE_FIELD if !value.trim().is_empty() => self.keep_images.push(value),
            IMAGE_SELECTION_FIELD => self.image_selection = true,
            _ => {}
        }
    }

    /// Build the columns to write. Comma-separated fields are split.
    ///
    /// Images are only written when the form carried the keep-image
    /// selection; then the checked images replace the stored list.
    ///
    /// # Errors
    ///
    /// Returns [`MissingRequired`] without a title or at least one price.
    pub fn into_input(self) -> Result<ProductInput, MissingRequired> {
        let title = self.title.trim().to_string();
        let price = split_csv_field(&self.price);
        if title.is_empty() || price.is_empty() {
            return Err(MissingRequired);
        }

        let description = self.description.trim();
        Ok(ProductInput {
            title,
            price,
            description: (!description.is_empty()).then(|| description.to_string()),
            category: split_csv_field(&self.category),
            images: self.image_selection.then_some(self.keep_images),
            stock: self.stock,
            weight: split_csv_field(&self.weight),
            size: split_csv_field(&self.size),
            featured: self.featured,
            sort_order: self.sort_order.trim().parse().unwrap_or(0),
        })
    }
}

/// HTML checkboxes post `on` by default.
fn is_checked(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1")
}

/// An image file from the form.
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Drain the multipart stream into text fields and image files.
async fn read_form(mut multipart: Multipart) -> Result<(ProductFields, Vec<ImageFile>), AppError> {
    let mut fields = ProductFields::default();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            // Browsers send an empty part when no file was chosen.
            if !file_name.is_empty() && !bytes.is_empty() {
                files.push(ImageFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            fields.set(&name, value);
        }
    }

    Ok((fields, files))
}

/// Upload images under the product's folder and return their public URLs.
///
/// Failed files are logged and skipped; the flag reports whether any failed.
async fn upload_images(
    state: &AppState,
    user: &CurrentUser,
    product_id: ProductId,
    files: Vec<ImageFile>,
) -> (Vec<String>, bool) {
    let mut urls = Vec::with_capacity(files.len());
    let mut failed = false;

    for file in files {
        if !file.content_type.starts_with("image/") {
            tracing::warn!(
                %product_id,
                file = %file.file_name,
                content_type = %file.content_type,
                "Skipping non-image upload"
            );
            failed = true;
            continue;
        }

        let path = product_image_path(product_id, &file.file_name);
        match state
            .backend()
            .upload_object(&user.access_token, &path, &file.content_type, file.bytes)
            .await
        {
            Ok(url) => urls.push(url),
            Err(e) => {
                tracing::error!(%product_id, file = %file.file_name, error = %e, "Image upload failed");
                failed = true;
            }
        }
    }

    (urls, failed)
}

/// Attach uploaded images after the product row is saved.
async fn attach_images(
    state: &AppState,
    user: &CurrentUser,
    product: &ProductRecord,
    files: Vec<ImageFile>,
) -> bool {
    if files.is_empty() {
        return true;
    }

    let (urls, upload_failed) = upload_images(state, user, product.id, files).await;
    if urls.is_empty() {
        return !upload_failed;
    }

    let images: Vec<String> = product.images.iter().cloned().chain(urls).collect();
    match state
        .backend()
        .set_product_images(&user.access_token, product.id, &images)
        .await
    {
        Ok(()) => !upload_failed,
        Err(e) => {
            tracing::error!(product_id = %product.id, error = %e, "Failed to attach images");
            false
        }
    }
}

fn saved_redirect(images_ok: bool) -> Redirect {
    if images_ok {
        Redirect::to("/admin/products?notice=product_saved")
    } else {
        Redirect::to("/admin/products?error=upload_failed")
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Product table template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct ProductsTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub tab: AdminTab,
    pub products: Vec<ProductRow>,
    pub total: usize,
    pub query: String,
    pub load_failed: bool,
}

/// Product form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/product_form.html")]
pub struct ProductFormTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub tab: AdminTab,
    pub form: ProductFormView,
}

// =============================================================================
// Handlers
// =============================================================================

/// Render the product table.
pub(super) async fn render_index(
    state: &AppState,
    RequireAdmin(user): RequireAdmin,
    nonce: CspNonce,
    search: &ProductSearch,
    flash: FlashQuery,
) -> Response {
    let query = search.q.clone().unwrap_or_default();
    let currency = state.config().pricing.currency;

    let (products, total, load_failed) = match state.backend().list_products(&user.access_token).await
    {
        Ok(all) => {
            let rows = filter_records(&all, &query)
                .into_iter()
                .map(|p| ProductRow::new(p, currency))
                .collect();
            (rows, all.len(), false)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load products");
            (Vec::new(), 0, true)
        }
    };

    let meta = PageMeta::admin(state.config(), "Products");
    let ctx = PageContext::new(state, nonce, Some(&user), meta).await;
    ProductsTemplate {
        ctx,
        flash: flash.into_flash(),
        tab: AdminTab::Products,
        products,
        total,
        query,
        load_failed,
    }
    .into_response()
}

/// Product table with search.
#[instrument(skip(state, admin, nonce, flash))]
pub async fn index(
    State(state): State<AppState>,
    admin: RequireAdmin,
    nonce: CspNonce,
    Query(search): Query<ProductSearch>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    render_index(&state, admin, nonce, &search, flash).await
}

/// Empty product form.
#[instrument(skip(state, user, nonce, flash))]
pub async fn new(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    nonce: CspNonce,
    Query(flash): Query<FlashQuery>,
) -> impl IntoResponse {
    let meta = PageMeta::admin(state.config(), "New product");
    let ctx = PageContext::new(&state, nonce, Some(&user), meta).await;
    ProductFormTemplate {
        ctx,
        flash: flash.into_flash(),
        tab: AdminTab::Products,
        form: ProductFormView::blank(),
    }
}

/// Product form filled with an existing product.
#[instrument(skip(state, user, nonce, flash))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    nonce: CspNonce,
    Path(id): Path<ProductId>,
    Query(flash): Query<FlashQuery>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.backend().get_product(&user.access_token, id).await?;

    let meta = PageMeta::admin(state.config(), &format!("Edit {}", product.title));
    let ctx = PageContext::new(&state, nonce, Some(&user), meta).await;
    Ok(ProductFormTemplate {
        ctx,
        flash: flash.into_flash(),
        tab: AdminTab::Products,
        form: ProductFormView::from(product),
    })
}

/// Create a product, then upload its images.
#[instrument(skip(state, user, multipart))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let (fields, files) = read_form(multipart).await?;
    let Ok(mut input) = fields.into_input() else {
        return Ok(Redirect::to("/admin/products/new?error=product_invalid"));
    };
    input.images.get_or_insert_with(Vec::new);

    let product = match state
        .backend()
        .create_product(&user.access_token, &input)
        .await
    {
        Ok(product) => product,
        Err(e) => {
            tracing::error!(error = %e, "Product create failed");
            return Ok(Redirect::to("/admin/products/new?error=product_failed"));
        }
    };

    let images_ok = attach_images(&state, &user, &product, files).await;
    Ok(saved_redirect(images_ok))
}

/// Update a product. New uploads are appended to the stored images; the
/// keep-image selection, when sent, drops unchecked ones first.
#[instrument(skip(state, user, multipart))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let edit_path = format!("/admin/products/{id}/edit");
    let (fields, files) = read_form(multipart).await?;
    let Ok(input) = fields.into_input() else {
        return Ok(Redirect::to(&format!("{edit_path}?error=product_invalid")));
    };

    let product = match state
        .backend()
        .update_product(&user.access_token, id, &input)
        .await
    {
        Ok(product) => product,
        Err(e) => {
            tracing::error!(product_id = %id, error = %e, "Product update failed");
            return Ok(Redirect::to(&format!("{edit_path}?error=product_failed")));
        }
    };
    tracing::info!(product_id = %id, "Product updated");

    let images_ok = attach_images(&state, &user, &product, files).await;
    Ok(saved_redirect(images_ok))
}

/// Delete a product.
#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Redirect {
    match state.backend().delete_product(&user.access_token, id).await {
        Ok(()) => Redirect::to("/admin/products?notice=product_deleted"),
        Err(e) => {
            tracing::error!(product_id = %id, error = %e, "Product delete failed");
            Redirect::to("/admin/products?error=product_failed")
        }
    }
}
