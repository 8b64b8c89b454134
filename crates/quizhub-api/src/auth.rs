use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use quizhub_types::api::{
    AuthResponse, Claims, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, MessageResponse,
    RegisterRequest, ResetPasswordRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

const FORGOT_PASSWORD_MESSAGE: &str = "If an account exists for that email, a reset link has been sent.";

pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> ApiResult<impl IntoResponse> {
    let s = state.clone();
    let user = blocking(move || {
        s.services
            .accounts
            .register(&req.username, &req.email, &req.password, Utc::now())
    })
    .await?;

    let token = issue_token(&state, user.id, &user.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            username: user.username,
            token,
        }),
    ))
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    let s = state.clone();
    let user = blocking(move || s.services.accounts.authenticate(&req.email, &req.password)).await?;

    let token = issue_token(&state, user.id, &user.username)?;
    info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

pub async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.current_user(claims.sub).await?))
}

/// Same answer whether or not the email is known. Mail delivery is not wired
/// up, so a minted token is logged, and echoed back only when the server is
/// configured with `expose_reset_tokens`.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    let s = state.clone();
    let email = req.email.clone();
    let token = blocking(move || s.services.accounts.issue_reset_token(&email, Utc::now())).await?;

    if let Some(token) = &token {
        info!("Password reset token for {}: {}", req.email, token);
    }

    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
        reset_token: token.filter(|_| state.expose_reset_tokens),
    }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    blocking(move || {
        state
            .services
            .accounts
            .reset_password(&req.token, &req.password, Utc::now())
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

fn issue_token(state: &AppState, user_id: i64, username: &str) -> ApiResult<String> {
    create_token(&state.jwt_secret, user_id, username, state.token_ttl, Utc::now()).map_err(|e| {
        error!("Failed to sign token for user {}: {}", user_id, e);
        ApiError::Internal
    })
}

pub fn create_token(
    secret: &str,
    user_id: i64,
    username: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (now + ttl).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;

    Ok(token)
}
