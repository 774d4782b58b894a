//! Authentication route handlers.
//!
//! Password sign-in and sign-up plus Google OAuth (authorization code with
//! PKCE) against the backend's auth service. The resulting tokens are kept in
//! the server-side session; the browser only sees the session cookie.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use lese_core::Email;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{Flash, FlashQuery, LoginAction, PageContext, safe_next};
use crate::backend::{AuthSession, BackendError, OAuthProvider, Pkce, SignUpOutcome};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::seo::PageMeta;
use crate::state::AppState;

/// Shortest password accepted at sign-up.
const MIN_PASSWORD_CHARS: usize = 6;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Why a sign-up form was refused before reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    InvalidEmail,
    PasswordTooShort,
    PasswordMismatch,
}

impl RegisterError {
    const fn code(self) -> &'static str {
        match self {
            Self::InvalidEmail => "invalid_email",
            Self::PasswordTooShort => "password_too_short",
            Self::PasswordMismatch => "password_mismatch",
        }
    }
}

impl RegisterForm {
    /// Check the form and return the normalized email.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<Email, RegisterError> {
        let email = Email::parse(&self.email).map_err(|_| RegisterError::InvalidEmail)?;
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(RegisterError::PasswordTooShort);
        }
        if self.password != self.password_confirm {
            return Err(RegisterError::PasswordMismatch);
        }
        Ok(email)
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters of the sign-in page.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub next: Option<String>,
    pub action: Option<String>,
    pub mode: Option<String>,
}

/// Query parameters of the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query parameters of the OAuth start.
#[derive(Debug, Deserialize)]
pub struct GoogleQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Sign-in / sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/page.html")]
pub struct AuthTemplate {
    pub ctx: PageContext,
    pub flash: Option<Flash>,
    pub next: String,
    /// Login-prompt headline for the action that required sign-in.
    pub prompt: Option<&'static str>,
    pub register: bool,
}

// =============================================================================
// Helpers
// =============================================================================

/// Back to the sign-in page with an error code, keeping `next`.
fn auth_error(code: &str, next: &str) -> Redirect {
    Redirect::to(&format!(
        "/auth?error={code}&next={}",
        urlencoding::encode(next)
    ))
}

/// Put a fresh backend session into the user's web session.
async fn sign_in(
    session: &Session,
    auth: AuthSession,
) -> Result<CurrentUser, tower_sessions::session::Error> {
    // New identity, new session id.
    session.cycle_id().await?;

    let user = CurrentUser::from(auth);
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, user.email.as_deref());
    Ok(user)
}

// =============================================================================
// Routes
// =============================================================================

/// Display the sign-in page. Signed-in visitors go straight to `next`.
#[instrument(skip(state, user, nonce, flash))]
pub async fn page(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    nonce: CspNonce,
    Query(query): Query<AuthQuery>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    if user.is_some() {
        return Redirect::to(&next).into_response();
    }

    let ctx = PageContext::new(&state, nonce, None, PageMeta::auth(state.config())).await;
    AuthTemplate {
        ctx,
        flash: flash.into_flash(),
        next,
        prompt: query
            .action
            .as_deref()
            .and_then(LoginAction::parse)
            .map(LoginAction::prompt),
        register: query.mode.as_deref() == Some("register"),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Redirect {
    let next = safe_next(form.next.as_deref()).to_string();

    let Ok(email) = Email::parse(&form.email) else {
        return auth_error("invalid_email", &next);
    };

    let auth = match state
        .backend()
        .sign_in_with_password(email.as_str(), &form.password)
        .await
    {
        Ok(auth) => auth,
        Err(BackendError::Unauthorized(_)) => {
            tracing::info!("Login rejected");
            return auth_error("credentials", &next);
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            return auth_error("unexpected", &next);
        }
    };

    match sign_in(&session, auth).await {
        Ok(user) => {
            add_breadcrumb("auth", "Signed in with password", None);
            tracing::info!(user_id = %user.id, "User signed in");
            Redirect::to(&next)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to set session");
            auth_error("session", &next)
        }
    }
}

/// Handle registration form submission.
///
/// When the backend requires email confirmation the user is told to check
/// their inbox; otherwise they are signed in right away.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    let next = safe_next(form.next.as_deref()).to_string();
    let register_error = |code: &str| {
        Redirect::to(&format!(
            "/auth?mode=register&error={code}&next={}",
            urlencoding::encode(&next)
        ))
    };

    let email = match form.validate() {
        Ok(email) => email,
        Err(e) => return register_error(e.code()),
    };

    let redirect_to = state.config().absolute_url("/auth");
    match state
        .backend()
        .sign_up(email.as_str(), &form.password, &redirect_to)
        .await
    {
        Ok(SignUpOutcome::SignedIn(auth)) => match sign_in(&session, auth).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "User registered and signed in");
                Redirect::to(&next)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to set session");
                auth_error("session", &next)
            }
        },
        Ok(SignUpOutcome::ConfirmationSent { .. }) => {
            tracing::info!("Registration pending email confirmation");
            Redirect::to("/auth?notice=confirm_email")
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            register_error("signup_failed")
        }
    }
}

/// Sign out and clear the session.
#[instrument(skip(state, session, user))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Redirect {
    if let Some(user) = user {
        // The local session ends even if the backend call fails.
        if let Err(e) = state.backend().sign_out(&user.access_token).await {
            tracing::warn!(user_id = %user.id, error = %e, "Backend sign-out failed");
        }
        tracing::info!(user_id = %user.id, "User signed out");
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session user");
    }
    if let Err(e) = session.flush().await {
        tracing::error!(error = %e, "Failed to flush session");
    }
    clear_sentry_user();

    Redirect::to("/?notice=signed_out")
}

/// Start Google sign-in.
#[instrument(skip(state, session))]
pub async fn google(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<GoogleQuery>,
) -> Redirect {
    let next = safe_next(query.next.as_deref()).to_string();
    let pkce = Pkce::generate();

    let stored = async {
        session
            .insert(session_keys::OAUTH_VERIFIER, &pkce.verifier)
            .await?;
        session.insert(session_keys::OAUTH_NEXT, &next).await
    };
    if let Err(e) = stored.await {
        tracing::error!(error = %e, "Failed to store OAuth state");
        return auth_error("session", &next);
    }

    let callback = state.config().absolute_url("/auth/callback");
    Redirect::to(&state.backend().authorize_url(
        OAuthProvider::Google,
        &callback,
        &pkce.challenge,
    ))
}

/// Finish Google sign-in: exchange the code with the stored verifier.
#[instrument(skip(state, session, query))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let verifier: Option<String> = session
        .remove(session_keys::OAUTH_VERIFIER)
        .await
        .ok()
        .flatten();
    let next: Option<String> = session
        .remove(session_keys::OAUTH_NEXT)
        .await
        .ok()
        .flatten();
    let next = safe_next(next.as_deref()).to_string();

    if let Some(error) = query.error {
        tracing::warn!(
            error = %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "OAuth provider returned an error"
        );
        return auth_error("oauth", &next);
    }

    let (Some(code), Some(verifier)) = (query.code, verifier) else {
        tracing::warn!("OAuth callback without code or verifier");
        return auth_error("oauth", &next);
    };

    let auth = match state.backend().exchange_code(&code, &verifier).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "OAuth code exchange failed");
            return auth_error("oauth", &next);
        }
    };

    match sign_in(&session, auth).await {
        Ok(user) => {
            add_breadcrumb("auth", "Signed in with Google", None);
            tracing::info!(user_id = %user.id, "User signed in with Google");
            Redirect::to(&next)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to set session");
            auth_error("session", &next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            email: email.into(),
            password: password.into(),
            password_confirm: confirm.into(),
            next: None,
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(form("usta@example.com", "gizli1", "gizli1").validate().is_ok());
        assert_eq!(
            form("usta", "gizli1", "gizli1").validate(),
            Err(RegisterError::InvalidEmail)
        );
        assert_eq!(
            form("usta@example.com", "kısa", "kısa").validate(),
            Err(RegisterError::PasswordTooShort)
        );
        assert_eq!(
            form("usta@example.com", "gizli1", "gizli2").validate(),
            Err(RegisterError::PasswordMismatch)
        );
    }

    #[test]
    fn test_password_length_counts_characters() {
        // Six characters, more than six bytes.
        assert!(form("usta@example.com", "şifreç", "şifreç").validate().is_ok());
    }

    #[test]
    fn test_register_error_codes_have_messages() {
        for e in [
            RegisterError::InvalidEmail,
            RegisterError::PasswordTooShort,
            RegisterError::PasswordMismatch,
        ] {
            let flash = FlashQuery {
                notice: None,
                error: Some(e.code().to_string()),
            };
            assert!(flash.into_flash().is_some(), "{e:?}");
        }
    }
}
