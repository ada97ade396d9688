// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{ClientMeta, CurrentUser},
    models::auth::{
        AuthResponse, ForgotPasswordPayload, LoginPayload, RefreshPayload, RegisterPayload,
        ResetPasswordPayload, SwitchTenantPayload,
    },
};

/// Cadastro com criação do tenant pessoal.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, body = AuthResponse),
        (status = 409, description = "E-mail ou CPF já cadastrado"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(app_state): State<AppState>,
    meta: ClientMeta,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = app_state
        .auth_service
        .register(
            &payload.name,
            &payload.email,
            &payload.password,
            payload.cpf.as_deref(),
            payload.phone.as_deref(),
            meta.ip,
            meta.user_agent,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginPayload,
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Credenciais inválidas"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(app_state): State<AppState>,
    meta: ClientMeta,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let response = app_state
        .auth_service
        .login(&payload.email, &payload.password, meta.ip, meta.user_agent)
        .await?;

    Ok(Json(response))
}

/// Rotação: a credencial apresentada morre e um novo par é emitido.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshPayload,
    responses((status = 200, body = AuthResponse), (status = 401)),
    tag = "auth"
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = app_state.auth_service.refresh(&payload.refresh_token).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = RefreshPayload,
    responses((status = 204)),
    tag = "auth",
    security(("bearer" = []))
)]
pub async fn logout(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<RefreshPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .auth_service
        .logout(user.id, &payload.refresh_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Troca de workspace: emite um novo par de credenciais carregando o
/// tenant alvo; o par anterior continua válido.
#[utoipa::path(
    post,
    path = "/api/auth/switch-tenant",
    request_body = SwitchTenantPayload,
    responses((status = 200, body = AuthResponse), (status = 403)),
    tag = "auth",
    security(("bearer" = []))
)]
pub async fn switch_tenant(
    State(app_state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<SwitchTenantPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = app_state
        .auth_service
        .switch_tenant(user.id, payload.target_tenant_id)
        .await?;
    Ok(Json(response))
}

/// Sempre responde 204, exista ou não o e-mail (evita enumeração).
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordPayload,
    responses((status = 204)),
    tag = "auth"
)]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    app_state
        .auth_service
        .request_password_reset(&payload.email, payload.channel)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordPayload,
    responses((status = 204), (status = 401), (status = 403)),
    tag = "auth"
)]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    app_state
        .auth_service
        .reset_password(&payload.email, &payload.otp, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
