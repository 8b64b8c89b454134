use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use quizhub_core::quizzes::{templates as quiz_templates, validate};
use quizhub_types::api::{Claims, PageQuery, QuizCountResponse, ValidationResponse};
use quizhub_types::models::{Quiz, QuizDraft, QuizPatch, QuizTemplate};

use crate::error::ApiResult;
use crate::state::{AppState, blocking};

pub async fn browse(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Quiz>>> {
    let user = state.current_user(claims.sub).await?;
    let quizzes = blocking(move || {
        state
            .services
            .quizzes
            .browse(&user, page.offset, page.limit, Utc::now())
    })
    .await?;
    Ok(Json(quizzes))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(draft): Json<QuizDraft>,
) -> ApiResult<impl IntoResponse> {
    let quiz = blocking(move || state.services.quizzes.create(claims.sub, &draft, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn count(State(state): State<AppState>) -> ApiResult<Json<QuizCountResponse>> {
    let count = blocking(move || state.services.quizzes.count()).await?;
    Ok(Json(QuizCountResponse { count }))
}

pub async fn mine(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<Vec<Quiz>>> {
    let quizzes = blocking(move || state.services.quizzes.mine(claims.sub)).await?;
    Ok(Json(quizzes))
}

/// Dry run of the checks `create` applies.
pub async fn validate_draft(Json(draft): Json<QuizDraft>) -> Json<ValidationResponse> {
    let errors = validate(&draft);
    Json(ValidationResponse {
        valid: errors.is_empty(),
        errors,
    })
}

pub async fn templates() -> Json<Vec<QuizTemplate>> {
    Json(quiz_templates())
}

pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<Json<Quiz>> {
    let user = state.current_user(claims.sub).await?;
    let quiz = blocking(move || state.services.quizzes.get(&user, quiz_id, Utc::now())).await?;
    Ok(Json(quiz))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(patch): Json<QuizPatch>,
) -> ApiResult<Json<Quiz>> {
    let quiz = blocking(move || state.services.quizzes.update(claims.sub, quiz_id, patch, Utc::now())).await?;
    Ok(Json(quiz))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<StatusCode> {
    blocking(move || state.services.quizzes.delete(claims.sub, quiz_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn duplicate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state.current_user(claims.sub).await?;
    let copy = blocking(move || state.services.quizzes.duplicate(&user, quiz_id, Utc::now())).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}
