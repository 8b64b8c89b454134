use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use quizhub_core::friends::RequestOutcome;
use quizhub_types::api::{
    Claims, FriendListItem, FriendRequestBody, FriendshipResponse, OutgoingRequestItem, PendingRequestItem,
    RespondRequest, SearchQuery,
};
use quizhub_types::models::UserLite;

use crate::error::ApiResult;
use crate::state::{AppState, blocking};

pub async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<UserLite>>> {
    let found = blocking(move || state.services.friends.search(&query.query, claims.sub)).await?;
    Ok(Json(found))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<FriendListItem>>> {
    let views = blocking(move || state.services.friends.list_friends(claims.sub)).await?;
    Ok(Json(views.into_iter().map(FriendListItem::from).collect()))
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PendingRequestItem>>> {
    let views = blocking(move || state.services.friends.list_incoming(claims.sub)).await?;
    Ok(Json(views.into_iter().map(PendingRequestItem::from).collect()))
}

pub async fn list_outgoing(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<OutgoingRequestItem>>> {
    let views = blocking(move || state.services.friends.list_outgoing(claims.sub)).await?;
    Ok(Json(views.into_iter().map(OutgoingRequestItem::from).collect()))
}

/// 201 for a new or reopened request, 200 when it completed a mutual one.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendRequestBody>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(move || state.services.friends.request(claims.sub, req.addressee_id, Utc::now())).await?;

    let status = match outcome {
        RequestOutcome::AutoAccepted(_) => StatusCode::OK,
        RequestOutcome::Created(_) | RequestOutcome::Reopened(_) => StatusCode::CREATED,
    };
    Ok((status, Json(FriendshipResponse::from(outcome.friendship()))))
}

pub async fn respond(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friendship_id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> ApiResult<Json<FriendshipResponse>> {
    let updated = blocking(move || {
        state
            .services
            .friends
            .respond(friendship_id, claims.sub, req.status, Utc::now())
    })
    .await?;
    Ok(Json(FriendshipResponse::from(&updated)))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friendship_id): Path<i64>,
) -> ApiResult<StatusCode> {
    blocking(move || state.services.friends.remove(friendship_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
