// src/handlers/signing.rs
//
// Rotas públicas do signatário, todas atrás do middleware que resolve o
// token opaco da URL e injeta a SignerSession.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::ClientMeta,
    models::signers::{CommitPayload, IdentifyPayload, PositionPayload, VerifyOtpPayload},
    services::signing_service::SignerSession,
};

/// Resumo da sessão de assinatura. A primeira visualização muda o
/// signatário para VIEWED e audita.
#[utoipa::path(
    get,
    path = "/api/sign/{token}",
    params(("token" = String, Path, description = "Token opaco do convite")),
    responses((status = 200), (status = 403), (status = 404)),
    tag = "sign"
)]
pub async fn summary(
    State(app_state): State<AppState>,
    session: SignerSession,
    meta: ClientMeta,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state
        .signing_service
        .summary(&session, meta.ip, meta.user_agent)
        .await?;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/api/sign/{token}/identify",
    params(("token" = String, Path, description = "Token opaco do convite")),
    request_body = IdentifyPayload,
    responses((status = 200), (status = 400)),
    tag = "sign"
)]
pub async fn identify(
    State(app_state): State<AppState>,
    session: SignerSession,
    Json(payload): Json<IdentifyPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let signer = app_state
        .signing_service
        .identify(&session, payload.cpf.as_deref(), payload.phone.as_deref())
        .await?;
    Ok(Json(crate::models::signers::SignerPublic::from(signer)))
}

#[utoipa::path(
    post,
    path = "/api/sign/{token}/position",
    params(("token" = String, Path, description = "Token opaco do convite")),
    request_body = PositionPayload,
    responses((status = 200)),
    tag = "sign"
)]
pub async fn save_position(
    State(app_state): State<AppState>,
    session: SignerSession,
    Json(payload): Json<PositionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let signer = app_state
        .signing_service
        .save_position(
            &session,
            payload.position_x,
            payload.position_y,
            payload.position_page,
        )
        .await?;
    Ok(Json(crate::models::signers::SignerPublic::from(signer)))
}

/// Emite um código por canal habilitado do signatário. A entrega é
/// fire-and-forget; a resposta não espera os provedores.
#[utoipa::path(
    post,
    path = "/api/sign/{token}/otp/start",
    params(("token" = String, Path, description = "Token opaco do convite")),
    responses((status = 204), (status = 400)),
    tag = "sign"
)]
pub async fn start_otp(
    State(app_state): State<AppState>,
    session: SignerSession,
    meta: ClientMeta,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .signing_service
        .start_otp(&session, meta.ip, meta.user_agent)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/sign/{token}/otp/verify",
    params(("token" = String, Path, description = "Token opaco do convite")),
    request_body = VerifyOtpPayload,
    responses((status = 204), (status = 401), (status = 403)),
    tag = "sign"
)]
pub async fn verify_otp(
    State(app_state): State<AppState>,
    session: SignerSession,
    meta: ClientMeta,
    Json(payload): Json<VerifyOtpPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    app_state
        .signing_service
        .verify_otp(&session, &payload.otp, meta.ip, meta.user_agent)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// O commit do signatário. Quando for o último, o documento é carimbado e
/// selado na mesma operação.
#[utoipa::path(
    post,
    path = "/api/sign/{token}/commit",
    params(("token" = String, Path, description = "Token opaco do convite")),
    request_body = CommitPayload,
    responses((status = 200), (status = 400), (status = 403)),
    tag = "sign"
)]
pub async fn commit(
    State(app_state): State<AppState>,
    session: SignerSession,
    meta: ClientMeta,
    Json(payload): Json<CommitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let response = app_state
        .signing_service
        .commit(
            &session,
            &payload.client_fingerprint,
            &payload.signature_image,
            meta.ip,
            meta.user_agent,
        )
        .await?;
    Ok(Json(response))
}
