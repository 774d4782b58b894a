//! Authentication middleware and extractors.
//!
//! The signed-in user lives in the server-side session as a [`CurrentUser`]
//! holding the backend tokens. Extractors refresh an expiring access token
//! before handing the user to a handler, so handlers can always forward
//! `user.access_token` to the backend.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::backend::{AuthUser, BackendError};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// HTML requests without a user are redirected to `/auth?next=<path>`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Merhaba, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in member of the `admins` table.
///
/// The access token is confirmed with the auth service first, so a session
/// revoked elsewhere cannot reach the admin panel until it expires.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that optionally gets the signed-in user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Error returned when authentication or admin rights are missing.
pub enum AuthRejection {
    /// Redirect to the sign-in page (for HTML requests).
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in but not an admin.
    Forbidden,
    /// The admin check itself failed.
    Unavailable,
}

/// Access denied page.
#[derive(Template, WebTemplate)]
#[template(path = "errors/forbidden.html")]
pub struct ForbiddenTemplate;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => {
                Redirect::to(&format!("/auth?next={}", urlencoding::encode(&next))).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, ForbiddenTemplate).into_response(),
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        }
    }
}

/// Load the session user, refreshing the access token when it is about to
/// expire. A failed refresh signs the user out.
async fn load_user(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    let user: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;

    if !user.needs_refresh() {
        return Some(user);
    }

    match state.backend().refresh_session(&user.refresh_token).await {
        Ok(auth) => {
            let refreshed = CurrentUser::from(auth);
            if let Err(e) = set_current_user(session, &refreshed).await {
                tracing::error!(error = %e, "Failed to store refreshed tokens");
            }
            tracing::debug!(user_id = %refreshed.id, "Access token refreshed");
            Some(refreshed)
        }
        Err(e) => {
            tracing::info!(user_id = %user.id, error = %e, "Token refresh failed, signing out");
            if let Err(e) = clear_current_user(session).await {
                tracing::error!(error = %e, "Failed to clear session user");
            }
            clear_sentry_user();
            None
        }
    }
}

/// Match the auth service's answer for the session token against the
/// session user. A rejected or foreign token sends the user back to sign in.
fn check_verified(
    user: &CurrentUser,
    verified: Result<AuthUser, BackendError>,
    next: String,
) -> Result<(), AuthRejection> {
    match verified {
        Ok(auth_user) if auth_user.id == user.id => Ok(()),
        Ok(auth_user) => {
            tracing::warn!(user_id = %user.id, token_user = %auth_user.id, "Session token belongs to another user");
            Err(AuthRejection::RedirectToLogin(next))
        }
        Err(BackendError::Unauthorized(reason)) => {
            tracing::info!(user_id = %user.id, %reason, "Session token revoked");
            Err(AuthRejection::RedirectToLogin(next))
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Token verification failed");
            Err(AuthRejection::Unavailable)
        }
    }
}

/// Path and query of the current request, used as the post-login target.
fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string())
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match load_user(parts, state).await {
            Some(user) => {
                set_sentry_user(&user.id, user.email.as_deref());
                Ok(Self(user))
            }
            None if parts.uri.path().starts_with("/api/") => Err(AuthRejection::Unauthorized),
            None => Err(AuthRejection::RedirectToLogin(requested_path(parts))),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let verified = state.backend().get_user(&user.access_token).await;
        if let Err(rejection) = check_verified(&user, verified, requested_path(parts)) {
            if matches!(rejection, AuthRejection::RedirectToLogin(_)) {
                if let Some(session) = parts.extensions.get::<Session>()
                    && let Err(e) = clear_current_user(session).await
                {
                    tracing::error!(error = %e, "Failed to clear session user");
                }
                clear_sentry_user();
            }
            return Err(rejection);
        }

        match state.backend().is_admin(&user.access_token, user.id).await {
            Ok(true) => Ok(Self(user)),
            Ok(false) => {
                tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin denied");
                Err(AuthRejection::Forbidden)
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Admin check failed");
                Err(AuthRejection::Unavailable)
            }
        }
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(load_user(parts, state).await))
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the signed-in user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
