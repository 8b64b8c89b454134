use std::sync::Arc;

use chrono::Duration;
use tracing::error;

use quizhub_core::{CoreResult, Services};
use quizhub_types::models::User;

use crate::error::{ApiError, ApiResult};
use crate::llm::QuizGenerator;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub services: Services,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// `None` when no LLM key is configured; generation then answers 503.
    pub generator: Option<Arc<dyn QuizGenerator>>,
    /// `None` when no webhook secret is configured; the webhook answers 503.
    pub billing_secret: Option<String>,
    /// Echo minted reset tokens in the forgot-password response. Development
    /// only.
    pub expose_reset_tokens: bool,
}

impl AppStateInner {
    /// The caller's current record. A token whose user no longer exists is
    /// treated as unauthenticated.
    pub async fn current_user(self: &Arc<Self>, user_id: i64) -> ApiResult<User> {
        let state = self.clone();
        blocking(move || state.services.accounts.get(user_id))
            .await
            .map_err(|e| match e {
                ApiError::Core(quizhub_core::CoreError::NotFound) => ApiError::Unauthorized,
                other => other,
            })
    }
}

/// Run blocking domain work off the async runtime.
pub async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
