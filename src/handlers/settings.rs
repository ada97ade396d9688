// src/handlers/settings.rs

use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::CurrentUser,
        rbac::{PermTenantAdmin, RequireRole},
    },
    models::settings::UpdateSettingsPayload,
};

#[utoipa::path(
    get,
    path = "/api/settings",
    responses((status = 200)),
    tag = "settings",
    security(("bearer" = []))
)]
pub async fn get_settings(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermTenantAdmin>,
) -> Result<impl IntoResponse, AppError> {
    let settings = app_state.settings_repo.get(user.tenant_id).await?;
    Ok(Json(settings))
}

#[utoipa::path(
    put,
    path = "/api/settings",
    request_body = UpdateSettingsPayload,
    responses((status = 200)),
    tag = "settings",
    security(("bearer" = []))
)]
pub async fn update_settings(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermTenantAdmin>,
    Json(payload): Json<UpdateSettingsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let settings = app_state.settings_repo.upsert(user.tenant_id, &payload).await?;
    Ok(Json(settings))
}
