use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service::accounts::{Account, AccountInput};
use tracing::info;

use crate::errors::ApiError;
use crate::routes::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Exact, case-sensitive account name.
    pub name: Option<String>,
}

#[utoipa::path(
    get, path = "/accounts", tag = "accounts",
    params(ListQuery),
    responses(
        (status = 200, description = "Accounts", body = [crate::openapi::AccountDoc]),
        (status = 404, description = "No account has that name", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Account>>, ApiError> {
    let accounts = state.accounts.list(q.name.as_deref()).await?;
    info!(count = accounts.len(), filtered = q.name.is_some(), "list accounts");
    Ok(Json(accounts))
}

#[utoipa::path(
    get, path = "/accounts/{id}", tag = "accounts",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = crate::openapi::AccountDoc),
        (status = 404, description = "Not Found", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.accounts.get(&id).await?))
}

#[utoipa::path(
    post, path = "/accounts", tag = "accounts",
    request_body = crate::openapi::AccountInputDoc,
    responses(
        (status = 201, description = "Created", body = crate::openapi::AccountDoc),
        (status = 400, description = "Missing fields", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<AccountInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let Json(input) = payload?;
    let account = state.accounts.create(input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    put, path = "/accounts/{id}", tag = "accounts",
    params(("id" = String, Path, description = "Account id")),
    request_body = crate::openapi::AccountInputDoc,
    responses(
        (status = 200, description = "Updated", body = crate::openapi::AccountDoc),
        (status = 400, description = "Missing fields", body = crate::openapi::ErrorDoc),
        (status = 404, description = "Not Found", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AccountInput>, JsonRejection>,
) -> Result<Json<Account>, ApiError> {
    let Json(input) = payload?;
    Ok(Json(state.accounts.update(&id, input).await?))
}

#[utoipa::path(
    put, path = "/accounts/{id}/deactivate", tag = "accounts",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Deactivated", body = crate::openapi::AccountDoc),
        (status = 404, description = "Not Found", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.accounts.deactivate(&id).await?))
}

#[utoipa::path(
    delete, path = "/accounts/{id}", tag = "accounts",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 204, description = "Deleted, or never existed"),
        (status = 404, description = "Reserved id", body = crate::openapi::ErrorDoc)
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
