use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use quizhub_types::api::{Claims, PageQuery, ReadAllResponse, UnreadCountResponse};
use quizhub_types::models::Notification;

use crate::error::ApiResult;
use crate::state::{AppState, blocking};

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let items = blocking(move || state.services.notifications.list(claims.sub, page.offset, page.limit)).await?;
    Ok(Json(items))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UnreadCountResponse>> {
    let unread = blocking(move || state.services.notifications.count_unread(claims.sub)).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    let n = blocking(move || state.services.notifications.mark_read(claims.sub, notification_id)).await?;
    Ok(Json(n))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ReadAllResponse>> {
    let updated = blocking(move || state.services.notifications.mark_all_read(claims.sub)).await?;
    Ok(Json(ReadAllResponse { updated }))
}
