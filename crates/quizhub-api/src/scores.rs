use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use quizhub_types::api::{AttemptsResponse, Claims, LeaderboardQuery, ScoreCreate};
use quizhub_types::models::{LeaderboardEntry, Score};

use crate::error::ApiResult;
use crate::state::{AppState, blocking};

pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<ScoreCreate>,
) -> ApiResult<impl IntoResponse> {
    let user = state.current_user(claims.sub).await?;
    let score = blocking(move || {
        state
            .services
            .scores
            .submit(&user, quiz_id, req.score, req.max_score, &req.answers, Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(score)))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<Json<Vec<Score>>> {
    let user = state.current_user(claims.sub).await?;
    let scores = blocking(move || state.services.scores.mine(&user, quiz_id, Utc::now())).await?;
    Ok(Json(scores))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let user = state.current_user(claims.sub).await?;
    let board = blocking(move || {
        state
            .services
            .scores
            .leaderboard(&user, quiz_id, query.limit, Utc::now())
    })
    .await?;
    Ok(Json(board))
}

pub async fn friends_leaderboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let user = state.current_user(claims.sub).await?;
    let board = blocking(move || state.services.scores.friends_leaderboard(&user, quiz_id, Utc::now())).await?;
    Ok(Json(board))
}

pub async fn attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> ApiResult<Json<AttemptsResponse>> {
    let user = state.current_user(claims.sub).await?;
    let attempts = blocking(move || state.services.scores.attempts(&user, quiz_id, Utc::now())).await?;
    Ok(Json(AttemptsResponse { attempts }))
}
