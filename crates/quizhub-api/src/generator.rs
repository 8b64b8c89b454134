use axum::{Extension, Json, extract::State};
use chrono::Utc;
use tracing::info;

use quizhub_types::api::{Claims, GenerateQuizRequest, GeneratedQuizResponse};
use quizhub_types::models::{LimitsInfo, Usage};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

/// Quota check, LLM call, then save the quiz and count the generation
/// together. Nothing is counted unless a quiz was saved.
pub async fn generate_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GenerateQuizRequest>,
) -> ApiResult<Json<GeneratedQuizResponse>> {
    let topic = req.topic.trim().to_string();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("Topic must not be empty".into()));
    }
    let generator = state.generator.clone().ok_or(ApiError::Unavailable("Quiz generation"))?;

    let user = state.current_user(claims.sub).await?;
    let s = state.clone();
    let checked = user.clone();
    blocking(move || s.services.limiter.authorize_generation(&checked, Utc::now())).await?;

    let questions = generator
        .generate(&topic, &req.difficulty, &req.language)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let s = state.clone();
    let quiz = blocking(move || {
        s.services
            .quizzes
            .save_generated(user.id, &topic, &req.difficulty, &req.language, questions, Utc::now())
    })
    .await?;

    info!("Generated quiz {} for user {}", quiz.id, claims.sub);

    Ok(Json(GeneratedQuizResponse {
        id: quiz.id,
        title: quiz.title,
        language: quiz.language,
        difficulty: quiz.difficulty,
        questions: quiz.questions,
    }))
}

pub async fn remaining(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Usage>> {
    let user = state.current_user(claims.sub).await?;
    let usage = blocking(move || state.services.limiter.usage_today(&user, Utc::now())).await?;
    Ok(Json(usage))
}

pub async fn limits(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<LimitsInfo>> {
    let user = state.current_user(claims.sub).await?;
    Ok(Json(state.services.limiter.limits_info(&user, Utc::now())))
}
