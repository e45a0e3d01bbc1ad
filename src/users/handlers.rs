use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        extractors::CurrentUser,
        guard::{gated, ANY_ROLE},
    },
    error::AppError,
    state::AppState,
    users::{
        dto::{Page, Pagination, UserResponse},
        repo_types::Role,
    },
};

const STAFF: &[Role] = &[Role::Admin, Role::Moderator];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users/profile", gated(get(profile), state, ANY_ROLE))
        .route("/users/all", gated(get(list_users), state, STAFF))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<UserResponse> {
    Json(state.accounts.profile(&user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    pagination: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    let Query(pagination) = pagination?;
    let page = state
        .accounts
        .list_users(pagination.page, pagination.limit)
        .await?;
    Ok(Json(page))
}
