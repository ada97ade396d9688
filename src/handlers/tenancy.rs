// src/handlers/tenancy.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::CurrentUser,
        rbac::{PermTenantAdmin, RequireRole, RequireSuperAdmin},
    },
    models::tenancy::{CreateTenantPayload, InviteMemberPayload, RespondInvitePayload},
};

/// Criação de workspace com administrador (super-admin).
#[utoipa::path(
    post,
    path = "/api/tenants",
    request_body = CreateTenantPayload,
    responses((status = 201), (status = 403), (status = 409)),
    tag = "tenants",
    security(("bearer" = []))
)]
pub async fn create_tenant(
    State(app_state): State<AppState>,
    _guard: RequireSuperAdmin,
    Json(payload): Json<CreateTenantPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (tenant, admin) = app_state
        .tenant_service
        .create_tenant_with_admin(
            &payload.name,
            &payload.admin_name,
            &payload.admin_email,
            &payload.admin_password,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "tenant": tenant, "admin": admin })),
    ))
}

/// Detalhe do tenant ativo com plano e ocupação.
#[utoipa::path(
    get,
    path = "/api/tenants/my",
    responses((status = 200)),
    tag = "tenants",
    security(("bearer" = []))
)]
pub async fn my_tenant(
    State(app_state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let response = app_state.tenant_service.my_tenant(user.tenant_id).await?;
    Ok(Json(response))
}

/// Workspaces disponíveis para o seletor.
#[utoipa::path(
    get,
    path = "/api/tenants/available",
    responses((status = 200)),
    tag = "tenants",
    security(("bearer" = []))
)]
pub async fn available_tenants(
    State(app_state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let tenants = app_state.tenant_service.list_user_tenants(user.id).await?;
    Ok(Json(tenants))
}

#[utoipa::path(
    post,
    path = "/api/tenants/invite",
    request_body = InviteMemberPayload,
    responses((status = 201), (status = 403), (status = 404), (status = 409)),
    tag = "tenants",
    security(("bearer" = []))
)]
pub async fn invite_member(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermTenantAdmin>,
    Json(payload): Json<InviteMemberPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let member = app_state
        .tenant_service
        .invite_member(&user, &payload.email, payload.role)
        .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

/// Convites pendentes do usuário autenticado.
#[utoipa::path(
    get,
    path = "/api/tenants/invites",
    responses((status = 200)),
    tag = "tenants",
    security(("bearer" = []))
)]
pub async fn list_invites(
    State(app_state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let invites = app_state
        .tenant_service
        .list_pending_invites(user.id, &user.email)
        .await?;
    Ok(Json(invites))
}

#[utoipa::path(
    post,
    path = "/api/tenants/invites/{id}/respond",
    params(("id" = Uuid, Path, description = "ID do convite")),
    request_body = RespondInvitePayload,
    responses((status = 200), (status = 404)),
    tag = "tenants",
    security(("bearer" = []))
)]
pub async fn respond_invite(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Path(invite_id): Path<Uuid>,
    Json(payload): Json<RespondInvitePayload>,
) -> Result<impl IntoResponse, AppError> {
    let member = app_state
        .tenant_service
        .respond_invite(user.id, invite_id, payload.accept)
        .await?;
    Ok(Json(member))
}
