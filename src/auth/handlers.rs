use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            EmailConfirmQuery, LoginRequest, PasswordChangeRequest, RefreshQuery,
            RegisterRequest, ResetPasswordRequest,
        },
        jwt::TokenPair,
        services::{PasswordChange, Registration},
        validation::{check_email, check_password, check_token},
    },
    error::AppError,
    state::AppState,
    users::dto::UserResponse,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/confirm-email", get(confirm_email))
        .route("/users/login", post(login))
        .route("/users/refresh", get(refresh))
        .route("/users/reset-password-request", post(request_password_reset))
        .route("/users/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let Json(mut payload) = payload?;
    payload.email = payload.email.trim().to_string();
    check_email(&payload.email)?;
    check_password(&payload.password)?;
    if payload.last_name.trim().is_empty() {
        warn!("registration without last name");
        return Err(AppError::validation("lastName should not be empty"));
    }

    let user = state
        .accounts
        .register(Registration {
            email: payload.email,
            password: payload.password,
            last_name: payload.last_name,
            first_name: payload.first_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, query))]
pub async fn confirm_email(
    State(state): State<AppState>,
    query: Result<Query<EmailConfirmQuery>, QueryRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let Query(query) = query?;
    check_token(&query.token)?;
    Ok(Json(state.accounts.confirm_email(&query.token).await?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let Json(payload) = payload?;
    let email = payload.email.trim();
    check_email(email)?;
    if payload.password.is_empty() {
        return Err(AppError::validation("password should not be empty"));
    }
    Ok(Json(state.accounts.login(email, &payload.password).await?))
}

#[instrument(skip(state, query))]
pub async fn refresh(
    State(state): State<AppState>,
    query: Result<Query<RefreshQuery>, QueryRejection>,
) -> Result<Json<TokenPair>, AppError> {
    let Query(query) = query?;
    Ok(Json(state.accounts.refresh_tokens(&query.token).await?))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(payload) = payload?;
    let email = payload.email.trim();
    check_email(email)?;
    state.accounts.request_password_reset(email).await?;
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<PasswordChangeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let Json(payload) = payload?;
    let email = payload.email.trim().to_string();
    check_email(&email)?;
    check_password(&payload.password)?;
    if payload.password != payload.password_repeat {
        return Err(AppError::validation("Passwords should match each other"));
    }
    check_token(&payload.token)?;

    let user = state
        .accounts
        .complete_password_reset(PasswordChange {
            email,
            password: payload.password,
            password_repeat: payload.password_repeat,
            token: payload.token,
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(user)))
}
