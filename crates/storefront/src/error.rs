//! Handler errors and Sentry helpers.
//!
//! Most handlers recover from backend failures themselves (flash codes,
//! empty states). [`AppError`] covers the rest: malformed input and backend
//! failures with no sensible page to fall back to. Server-side failures are
//! reported to Sentry before the response goes out.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::BackendError;

/// Error returned by handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Managed backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The request could not be understood.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Backend(BackendError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            Self::Backend(BackendError::Rejected(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Backend(BackendError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Backend(
                BackendError::Http(_) | BackendError::Parse(_) | BackendError::Api { .. },
            ) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Text shown to the visitor. Backend details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Backend(BackendError::Rejected(reason)) | Self::BadRequest(reason) => {
                reason.clone()
            }
            Self::Backend(BackendError::NotFound(_)) => "Bulunamadı".to_string(),
            Self::Backend(BackendError::Unauthorized(_)) => {
                "Oturumunuz sona erdi. Lütfen tekrar giriş yapın.".to_string()
            }
            Self::Backend(BackendError::RateLimited(_)) => {
                "Çok fazla istek. Lütfen biraz bekleyin.".to_string()
            }
            Self::Backend(_) => "Beklenmedik bir hata oluştu".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, self.public_message()).into_response()
    }
}

/// Attach the signed-in user to subsequent Sentry events.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Forget the Sentry user on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| scope.set_user(None));
}

/// Record a user action as a Sentry breadcrumb.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Product added to cart", Some(&[("product_id", id.as_str())]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let data = data
        .unwrap_or_default()
        .iter()
        .map(|(key, value)| ((*key).to_string(), serde_json::Value::from(*value)))
        .collect();

    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data,
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_bad_request_keeps_reason() {
        let err = AppError::BadRequest("Adet en az 1 olmalıdır".into());
        assert_eq!(err.public_message(), "Adet en az 1 olmalıdır");
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_backend_error_status_codes() {
        assert_eq!(
            status_of(BackendError::NotFound("product".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BackendError::Rejected("Cart is empty".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BackendError::RateLimited(3).into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(
                BackendError::Api {
                    status: 500,
                    code: None,
                    message: "boom".into()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_backend_details_are_hidden() {
        let err = AppError::from(BackendError::Api {
            status: 500,
            code: Some("XX000".into()),
            message: "relation \"orders\" does not exist".into(),
        });
        assert!(!err.public_message().contains("orders"));
    }
}
