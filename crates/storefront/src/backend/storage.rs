//! Object storage for product images (`/storage/v1`).

use lese_core::ProductId;
use rand::Rng;
use reqwest::Method;
use tracing::instrument;

use super::{BackendClient, BackendError};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Cache lifetime for uploaded images, one hour.
const UPLOAD_CACHE_CONTROL: &str = "max-age=3600";

/// Storage key for a new image of `product_id`.
///
/// Keys look like `<product_id>/<unix_millis>-<8 random chars>.<ext>` so
/// uploads never collide and sort by upload time.
#[must_use]
pub fn product_image_path(product_id: ProductId, file_name: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect();
    format!(
        "{product_id}/{}-{suffix}.{}",
        chrono::Utc::now().timestamp_millis(),
        extension(file_name)
    )
}

/// Lowercased file extension, `bin` when there is none.
fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

impl BackendClient {
    /// Upload an object to the product image bucket.
    ///
    /// Existing objects are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload is refused (e.g. the key already
    /// exists or the file is too large).
    #[instrument(skip(self, access_token, bytes), fields(size = bytes.len()))]
    pub async fn upload_object(
        &self,
        access_token: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        let request = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/{}/{path}", self.bucket()),
                Some(access_token),
            )
            .header("Content-Type", content_type)
            .header(reqwest::header::CACHE_CONTROL, UPLOAD_CACHE_CONTROL)
            .header("x-upsert", "false")
            .body(bytes);

        self.send_empty(request).await?;
        Ok(self.public_url(path))
    }

    /// Public URL of an object in the product image bucket.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.base_url(),
            self.bucket()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::backend::test_support::{USER_TOKEN, client_for};

    const PRODUCT_ID: &str = "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b";

    #[test]
    fn test_image_path_shape() {
        let path = product_image_path(PRODUCT_ID.parse().unwrap(), "Kapı Kolu.JPG");
        let (dir, file) = path.split_once('/').unwrap();
        assert_eq!(dir, PRODUCT_ID);

        let (stem, ext) = file.rsplit_once('.').unwrap();
        assert_eq!(ext, "jpg");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(extension("noext"), "bin");
        assert_eq!(extension("photo."), "bin");
        assert_eq!(extension("a.tar.GZ"), "gz");
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/storage/v1/object/prdimgs/p/1-abc.png")
                    .header("content-type", "image/png")
                    .header("x-upsert", "false")
                    .header("cache-control", "max-age=3600");
                then.status(200)
                    .json_body(serde_json::json!({"Key": "prdimgs/p/1-abc.png"}));
            })
            .await;

        let client = client_for(&server.base_url());
        let url = client
            .upload_object(USER_TOKEN, "p/1-abc.png", "image/png", vec![1, 2, 3])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            url,
            format!(
                "{}/storage/v1/object/public/prdimgs/p/1-abc.png",
                server.base_url()
            )
        );
    }
}
