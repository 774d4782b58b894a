//! Managed backend client.
//!
//! # Architecture
//!
//! The storefront owns no catalog or order data. Everything lives in the
//! managed backend and is reached over HTTP:
//!
//! - `/rest/v1/<table>` - auto-generated REST over tables and views
//! - `/rest/v1/rpc/<function>` - database functions (cart, likes, ratings...)
//! - `/auth/v1/*` - password and OAuth sign-in, token refresh
//! - `/storage/v1/object/*` - product image uploads and public URLs
//!
//! Every request carries the project `apikey`. User-scoped calls forward the
//! signed-in user's access token as the bearer so the backend's row-level
//! security decides what they may read and write; anonymous calls use the
//! anon key as the bearer.
//!
//! Read-mostly data (the shop listing, admin membership) is cached in memory
//! via `moka`.
//!
//! # Example
//!
//! ```rust,ignore
//! use lese_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend);
//!
//! let session = client.sign_in_with_password("usta@example.com", "hunter22").await?;
//! let cart = client.get_cart_items(&session.access_token).await?;
//! ```

mod auth;
mod rpc;
mod storage;
mod tables;
pub mod types;

pub use auth::{AuthSession, AuthUser, OAuthProvider, Pkce, SignUpOutcome};
pub use storage::product_image_path;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::BackendConfig;

/// PostgREST code for "a single row was requested but none matched".
const NO_ROWS_CODE: &str = "PGRST116";

/// Maximum characters of a response body written to logs.
const LOG_BODY_LIMIT: usize = 500;

/// Errors that can occur when talking to the managed backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend answered with an error status.
    #[error("Backend error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials or access token rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A database function reported `success: false`.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// Error payload shapes returned by the REST, auth and storage services.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        self.error_code.clone().or_else(|| {
            self.code.as_ref().map(|c| match c {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
    }

    fn message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// Map a non-success response to a [`BackendError`].
fn error_from_response(status: StatusCode, body: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code();
    let message = parsed
        .message()
        .unwrap_or_else(|| body.chars().take(200).collect());

    if code.as_deref() == Some(NO_ROWS_CODE) || status == StatusCode::NOT_FOUND {
        return BackendError::NotFound(message);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return BackendError::Unauthorized(message);
    }
    BackendError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

/// Values stored in the response cache.
#[derive(Clone)]
enum CacheValue {
    Summaries(Arc<Vec<ProductSummary>>),
    Admin(bool),
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the managed backend.
///
/// Cheap to clone; all clones share one connection pool and one cache.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    cache: Cache<String, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self {
            inner: Arc::new(BackendClientInner {
                client: reqwest::Client::new(),
                base_url: config.url.trim_end_matches('/').to_string(),
                anon_key: config.anon_key().to_string(),
                bucket: config.storage_bucket.clone(),
                cache,
            }),
        }
    }

    /// Project URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Storage bucket for product images.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    /// Check that the backend answers. Used by `/health/ready`.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth service health endpoint does not answer
    /// with success.
    pub async fn ping(&self) -> Result<(), BackendError> {
        let request = self
            .request(Method::GET, "/auth/v1/health", None)
            .timeout(Duration::from_secs(3));
        self.send_empty(request).await
    }

    /// Start a request against `path` (which includes any query string).
    ///
    /// `access_token` is the signed-in user's JWT; `None` sends the anon key.
    fn request(&self, method: Method, path: &str, access_token: Option<&str>) -> RequestBuilder {
        let bearer = access_token.unwrap_or(self.inner.anon_key.as_str());
        self.inner
            .client
            .request(method, format!("{}{path}", self.inner.base_url))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(bearer)
    }

    /// Send a request and return the raw body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let error = error_from_response(status, &body);
            if matches!(error, BackendError::Api { .. }) {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                    "Backend returned non-success status"
                );
            } else {
                tracing::debug!(status = %status, error = %error, "Backend request rejected");
            }
            return Err(error);
        }

        Ok(body)
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request whose body we do not need.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), BackendError> {
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use secrecy::SecretString;

    use super::BackendClient;
    use crate::config::BackendConfig;

    pub const ANON_KEY: &str = "test-anon-key";
    pub const USER_TOKEN: &str = "user-access-token";

    /// A client pointed at a mock server.
    pub fn client_for(base_url: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            url: base_url.to_string(),
            anon_key: SecretString::from(ANON_KEY),
            storage_bucket: "prdimgs".to_string(),
        })
    }
}
