//! Auth service client (`/auth/v1`).
//!
//! # Password Flow
//!
//! 1. `sign_in_with_password()` returns an [`AuthSession`]
//! 2. The session's tokens are kept server-side in the user's session
//! 3. When `is_expired()` reports true, `refresh_session()` swaps the tokens
//!
//! # OAuth Flow (PKCE)
//!
//! 1. Generate a [`Pkce`] pair and keep the verifier in the session
//! 2. Redirect to `authorize_url()` with the challenge
//! 3. The provider redirects back to `/auth/callback?code=...`
//! 4. Exchange the code and verifier with `exchange_code()`

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use lese_core::UserId;
use rand::RngCore;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use super::{BackendClient, BackendError};

/// Seconds before expiry at which a token is already treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// The signed-in user as reported by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens plus user identity for a signed-in user.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Unix timestamp when the tokens were obtained.
    pub obtained_at: i64,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .field("user", &self.user)
            .finish()
    }
}

impl AuthSession {
    /// Whether the access token is expired or about to expire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    fn is_expired_at(&self, now: i64) -> bool {
        now >= self.obtained_at + self.expires_in - EXPIRY_BUFFER_SECS
    }
}

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            obtained_at: chrono::Utc::now().timestamp(),
            user: token.user,
        }
    }
}

/// Outcome of a sign-up.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// Email confirmation is disabled; the user is signed in.
    SignedIn(AuthSession),
    /// A confirmation email was sent; the user must click it first.
    ConfirmationSent { email: Option<String> },
}

/// OAuth providers enabled on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }
}

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh verifier (43 URL-safe characters).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl BackendClient {
    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` for wrong credentials or an
    /// unconfirmed email, and other variants for transport failures.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "/auth/v1/token?grant_type=password", None)
            .json(&Credentials { email, password });

        let token: TokenResponse = self
            .send_json(request)
            .await
            .map_err(reject_as_unauthorized)?;
        Ok(token.into())
    }

    /// Create an account.
    ///
    /// `redirect_to` is where the confirmation link sends the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth service rejects the sign-up (e.g. the
    /// password is too weak or the email is taken).
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let path = format!(
            "/auth/v1/signup?redirect_to={}",
            urlencoding::encode(redirect_to)
        );
        let request = self
            .request(Method::POST, &path, None)
            .json(&Credentials { email, password });

        let body: serde_json::Value = self.send_json(request).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            return Ok(SignUpOutcome::SignedIn(token.into()));
        }

        let email = body
            .get("email")
            .or_else(|| body.get("user").and_then(|u| u.get("email")))
            .and_then(|e| e.as_str())
            .map(String::from);
        Ok(SignUpOutcome::ConfirmationSent { email })
    }

    /// Swap a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` if the refresh token was revoked
    /// or already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let request = self
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=refresh_token",
                None,
            )
            .json(&serde_json::json!({ "refresh_token": refresh_token }));

        let token: TokenResponse = self
            .send_json(request)
            .await
            .map_err(reject_as_unauthorized)?;
        Ok(token.into())
    }

    /// Fetch the user that owns an access token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` for invalid or expired tokens.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let request = self.request(Method::GET, "/auth/v1/user", Some(access_token));
        self.send_json(request).await
    }

    /// Revoke the session's refresh tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth service cannot be reached.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let request = self.request(Method::POST, "/auth/v1/logout", Some(access_token));
        self.send_empty(request).await
    }

    /// URL that starts an OAuth sign-in with `provider`.
    #[must_use]
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "{}/auth/v1/authorize?\
            provider={}&\
            redirect_to={}&\
            code_challenge={}&\
            code_challenge_method=s256",
            self.base_url(),
            provider.as_str(),
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        )
    }

    /// Exchange an OAuth authorization code for a session.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` if the code or verifier is
    /// invalid or expired.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "/auth/v1/token?grant_type=pkce", None)
            .json(&serde_json::json!({
                "auth_code": auth_code,
                "code_verifier": code_verifier,
            }));

        let token: TokenResponse = self
            .send_json(request)
            .await
            .map_err(reject_as_unauthorized)?;
        Ok(token.into())
    }
}

/// The token endpoint reports bad credentials as 400; treat them as 401.
fn reject_as_unauthorized(error: BackendError) -> BackendError {
    match error {
        BackendError::Api {
            status: 400,
            message,
            ..
        } => BackendError::Unauthorized(message),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::backend::test_support::{ANON_KEY, USER_TOKEN, client_for};

    const USER_ID: &str = "6f1c2a8e-3b4d-4e5f-9a0b-1c2d3e4f5a6b";

    fn token_body() -> serde_json::Value {
        json!({
            "access_token": "new-access",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "new-refresh",
            "user": { "id": USER_ID, "email": "usta@lesemetalcraft.com" }
        })
    }

    #[test]
    fn test_session_expiry_buffer() {
        let session = AuthSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 3600,
            obtained_at: 1_000,
            user: AuthUser {
                id: USER_ID.parse().unwrap(),
                email: None,
            },
        };
        assert!(!session.is_expired_at(1_000 + 3_500));
        assert!(session.is_expired_at(1_000 + 3_540));
        assert!(!format!("{session:?}").contains("\"a\""));
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_example() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert_eq!(Pkce::generate().verifier.len(), 43);
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client = client_for("https://abcd.supabase.co");
        let url = client.authorize_url(
            OAuthProvider::Google,
            "https://lesemetalcraft.com/auth/callback",
            "abc",
        );
        assert!(url.starts_with("https://abcd.supabase.co/auth/v1/authorize?provider=google&"));
        assert!(url.contains("redirect_to=https%3A%2F%2Flesemetalcraft.com%2Fauth%2Fcallback"));
        assert!(url.ends_with("code_challenge=abc&code_challenge_method=s256"));
    }

    #[tokio::test]
    async fn test_sign_in_sends_apikey_and_parses_session() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password")
                    .header("apikey", ANON_KEY)
                    .json_body(json!({"email": "usta@lesemetalcraft.com", "password": "pw"}));
                then.status(200).json_body(token_body());
            })
            .await;

        let client = client_for(&server.base_url());
        let session = client
            .sign_in_with_password("usta@lesemetalcraft.com", "pw")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token, "new-access");
        assert_eq!(session.user.id.to_string(), USER_ID);
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_sign_in_bad_credentials_is_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400).json_body(json!({
                    "code": 400,
                    "error_code": "invalid_credentials",
                    "msg": "Invalid login credentials"
                }));
            })
            .await;

        let client = client_for(&server.base_url());
        let err = client.sign_in_with_password("a@b.c", "nope").await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(m) if m == "Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_sign_up_requiring_confirmation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/signup");
                then.status(200).json_body(json!({
                    "id": USER_ID,
                    "email": "yeni@lesemetalcraft.com",
                    "confirmation_sent_at": "2026-01-02T03:04:05Z"
                }));
            })
            .await;

        let client = client_for(&server.base_url());
        let outcome = client
            .sign_up("yeni@lesemetalcraft.com", "pw123456", "http://localhost/auth")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SignUpOutcome::ConfirmationSent { email: Some(e) } if e == "yeni@lesemetalcraft.com"
        ));
    }

    #[tokio::test]
    async fn test_sign_out_uses_user_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/logout")
                    .header("authorization", format!("Bearer {USER_TOKEN}"));
                then.status(204);
            })
            .await;

        let client = client_for(&server.base_url());
        client.sign_out(USER_TOKEN).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_and_pkce_exchange_use_token_grants() {
        let server = MockServer::start_async().await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "refresh_token")
                    .json_body(json!({"refresh_token": "old-refresh"}));
                then.status(200).json_body(token_body());
            })
            .await;
        let exchange = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "pkce")
                    .json_body(json!({"auth_code": "code-1", "code_verifier": "verifier-1"}));
                then.status(200).json_body(token_body());
            })
            .await;

        let client = client_for(&server.base_url());
        let refreshed = client.refresh_session("old-refresh").await.unwrap();
        assert_eq!(refreshed.refresh_token, "new-refresh");

        let exchanged = client.exchange_code("code-1", "verifier-1").await.unwrap();
        assert_eq!(exchanged.user.id.to_string(), USER_ID);

        refresh.assert_async().await;
        exchange.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_user_with_access_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/auth/v1/user")
                    .header("authorization", format!("Bearer {USER_TOKEN}"));
                then.status(200)
                    .json_body(json!({"id": USER_ID, "email": "usta@lesemetalcraft.com"}));
            })
            .await;

        let client = client_for(&server.base_url());
        let user = client.get_user(USER_TOKEN).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("usta@lesemetalcraft.com"));
    }
}
