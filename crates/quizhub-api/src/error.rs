use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use quizhub_core::{CoreError, Rejection};
use quizhub_types::models::SubscriptionTier;

/// Every failure a handler can answer with. Renders as
/// `{ "error": <code>, "message": <text> }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// An optional collaborator is not configured on this server.
    #[error("{0} is not configured on this server")]
    Unavailable(&'static str),

    /// The quiz generator failed; the request consumed no quota.
    #[error("Quiz generation failed: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal,
}

impl From<Rejection> for ApiError {
    fn from(reason: Rejection) -> Self {
        Self::Core(reason.into())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Core(core) => match core {
                CoreError::InvalidOperation(Rejection::EmailTaken) => {
                    (StatusCode::CONFLICT, Rejection::EmailTaken.code(), core.to_string())
                }
                CoreError::InvalidOperation(reason) => (StatusCode::BAD_REQUEST, reason.code(), core.to_string()),
                CoreError::NotFound => (StatusCode::NOT_FOUND, "not_found", core.to_string()),
                CoreError::QuotaExceeded {
                    tier: SubscriptionTier::Free,
                    ..
                } => (
                    StatusCode::PAYMENT_REQUIRED,
                    "quota_exceeded",
                    format!("{core}. Upgrade to premium for more daily generations."),
                ),
                CoreError::QuotaExceeded { .. } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "quota_exceeded",
                    format!("{core}. The limit resets at midnight UTC."),
                ),
                CoreError::PremiumRequired => (StatusCode::FORBIDDEN, "premium_required", core.to_string()),
                CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials", core.to_string()),
                CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation", core.to_string()),
                CoreError::Storage(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                ),
            },
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", self.to_string()),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", self.to_string()),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream", self.to_string()),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal", self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        match &self {
            Self::Core(CoreError::Storage(e)) => error!("Storage failure: {:#}", e),
            Self::Upstream(detail) => warn!("Quiz generator failure: {}", detail),
            _ if status.is_server_error() => error!("HTTP {}: {}", status, self),
            _ => {}
        }

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
