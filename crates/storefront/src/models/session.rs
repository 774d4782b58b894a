//! Session-related types.
//!
//! Types stored in the session for authentication state. The backend tokens
//! never leave the server; the browser only holds the session cookie.

use serde::{Deserialize, Serialize};

use lese_core::UserId;

use crate::backend::AuthSession;

/// Session-stored user identity and backend tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User id assigned by the auth service.
    pub id: UserId,
    /// Email address, when the provider shared one.
    pub email: Option<String>,
    /// Backend access token forwarded on user-scoped calls.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: String,
    /// Unix timestamp after which the access token must be refreshed.
    pub expires_at: i64,
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Seconds before `expires_at` at which the token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 60;

impl CurrentUser {
    /// Whether the access token should be refreshed before use.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(chrono::Utc::now().timestamp())
    }

    const fn needs_refresh_at(&self, now: i64) -> bool {
        now >= self.expires_at - REFRESH_MARGIN_SECS
    }

    /// Name shown in the navigation bar.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("Hesabım")
    }
}

impl From<AuthSession> for CurrentUser {
    fn from(session: AuthSession) -> Self {
        Self {
            id: session.user.id,
            email: session.user.email,
            expires_at: session.obtained_at + session.expires_in,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the PKCE verifier of an OAuth sign-in in progress.
    pub const OAUTH_VERIFIER: &str = "oauth_verifier";

    /// Key for the local path to return to after an OAuth sign-in.
    pub const OAUTH_NEXT: &str = "oauth_next";
}
