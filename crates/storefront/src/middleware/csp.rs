//! Per-request CSP nonce.
//!
//! [`csp_nonce_middleware`] stores a fresh nonce in the request extensions.
//! The security headers middleware reads it back for `script-src`, and
//! handlers extract it so the base layout can stamp its inline scripts.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Nonce bytes before encoding.
const NONCE_BYTES: usize = 16;

/// Base64 nonce for one request.
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// `'nonce-…'` as it appears in `script-src`.
    #[must_use]
    pub fn source(&self) -> String {
        format!("'nonce-{}'", self.0)
    }
}

/// Attach a fresh [`CspNonce`] to the request. Runs outside the security
/// headers middleware.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(nonce) = parts.extensions.get::<Self>() {
            return Ok(nonce.clone());
        }
        // Inline scripts will be blocked, but the page still renders
        tracing::warn!("No CSP nonce on request; is csp_nonce_middleware installed?");
        Ok(Self(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_unique_and_sized() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();
        assert_ne!(a.value(), b.value());
        // 16 bytes in standard base64 with padding
        assert_eq!(a.value().len(), 24);
        assert!(a.source().starts_with("'nonce-"));
    }

    #[tokio::test]
    async fn test_extractor_reads_extension() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        parts.extensions.insert(CspNonce("abc".into()));
        let nonce = CspNonce::from_request_parts(&mut parts, &()).await.unwrap_or_else(|e| match e {});
        assert_eq!(nonce.value(), "abc");
    }
}
