use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{LoginRequest, RegisterRequest, SessionGrant, UserView};
use crate::{auth::extractors::Caller, error::AccountResult, state::AppState};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
}

pub fn management_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users))
        .route("/user/block/:id", put(block_user))
        .route("/user/activate/:id", put(activate_user))
        .route("/user/bulk-block", put(bulk_block))
        .route("/user/bulk-activate", put(bulk_activate))
        .route("/user/bulk-delete", delete(bulk_delete))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AccountResult<&'static str> {
    let Json(req) = payload?;
    state
        .identity
        .register(&req.email, &req.password, &req.full_name)
        .await?;
    Ok("Registration successful")
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AccountResult<Json<SessionGrant>> {
    let Json(req) = payload?;
    let grant = state.identity.login(&req.email, &req.password).await?;
    Ok(Json(grant))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> AccountResult<Json<Vec<UserView>>> {
    Ok(Json(state.identity.list_users().await?))
}

#[instrument(skip(state))]
pub async fn block_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> AccountResult<()> {
    state.identity.set_active(id, false).await
}

#[instrument(skip(state))]
pub async fn activate_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> AccountResult<()> {
    state.identity.set_active(id, true).await
}

#[instrument(skip(state, payload))]
pub async fn bulk_block(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<Vec<Uuid>>, JsonRejection>,
) -> AccountResult<()> {
    let Json(ids) = payload?;
    state.identity.bulk_set_active(&ids, false).await?;
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn bulk_activate(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<Vec<Uuid>>, JsonRejection>,
) -> AccountResult<()> {
    let Json(ids) = payload?;
    state.identity.bulk_set_active(&ids, true).await?;
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn bulk_delete(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<Vec<Uuid>>, JsonRejection>,
) -> AccountResult<()> {
    let Json(ids) = payload?;
    state.identity.bulk_delete(&ids).await?;
    Ok(())
}
