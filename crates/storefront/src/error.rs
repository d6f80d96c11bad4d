//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::auth::AuthFlowError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::identity::{IdentityError, ProfileError};
use crate::services::payment::GatewayError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payment gateway operation failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Identity provider operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Product catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Profile store operation failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Checkout operation rejected.
    #[error("Checkout error: {0}")]
    Checkout(CheckoutError),

    /// Sign-in flow operation rejected.
    #[error("Auth error: {0}")]
    Auth(AuthFlowError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// Collaborator failures wrapped inside a state-machine error are server-side
// problems; everything else in those enums is the client's input or timing.
impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Gateway(inner) => Self::Gateway(inner),
            other => Self::Checkout(other),
        }
    }
}

impl From<AuthFlowError> for AppError {
    fn from(err: AuthFlowError) -> Self {
        match err {
            AuthFlowError::Provider(inner) => Self::Identity(inner),
            AuthFlowError::Profile(inner) => Self::Profile(inner),
            other => Self::Auth(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(
            self,
            Self::Gateway(_) | Self::Identity(_) | Self::Catalog(_) | Self::Profile(_)
                | Self::Internal(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Internal(_) | Self::Profile(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(_) | Self::Identity(_) | Self::Catalog(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) => match err {
                CheckoutError::InvalidAddress { .. } | CheckoutError::EmptyCart => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CheckoutError::InvalidState { .. } => StatusCode::CONFLICT,
                CheckoutError::SignatureMismatch | CheckoutError::UnknownOrder => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Auth(err) => match err {
                AuthFlowError::InvalidPhone(_)
                | AuthFlowError::MalformedCode
                | AuthFlowError::InvalidEmail(_)
                | AuthFlowError::EmptyName => StatusCode::UNPROCESSABLE_ENTITY,
                AuthFlowError::WrongCode => StatusCode::UNAUTHORIZED,
                AuthFlowError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
                AuthFlowError::InvalidState { .. } => StatusCode::CONFLICT,
                AuthFlowError::Provider(_) | AuthFlowError::Profile(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) | Self::Profile(_) => "Internal server error".to_string(),
            Self::Gateway(_) => "Payment service error".to_string(),
            Self::Identity(_) => "Verification service error".to_string(),
            Self::Catalog(_) => "Catalog service error".to_string(),
            _ => self.to_string(),
        };

        let mut body = json!({ "error": message });

        // Field-level detail for address validation, so the form can
        // highlight what is missing.
        if let Self::Checkout(CheckoutError::InvalidAddress { fields }) = &self {
            body["missingFields"] = json!(fields);
        }
        if let Self::Auth(AuthFlowError::CooldownActive { retry_in }) = &self {
            body["retryInSecs"] = json!(retry_in.as_secs());
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
