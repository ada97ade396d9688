// src/handlers/documents.rs

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::{ClientMeta, CurrentUser},
        rbac::{PermDocumentsRead, PermDocumentsWrite, RequireRole},
    },
    models::{
        documents::{CreateFolderPayload, ListDocumentsQuery, MoveFolderPayload},
        signers::InviteSignersPayload,
    },
};

// Campos do multipart de upload.
struct UploadForm {
    bytes: Vec<u8>,
    file_name: String,
    mime_type: String,
    title: Option<String>,
    deadline_at: Option<DateTime<Utc>>,
    folder_id: Option<Uuid>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut bytes = None;
    let mut file_name = None;
    let mut mime_type = None;
    let mut title = None;
    let mut deadline_at = None;
    let mut folder_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart inválido: {}", e)))?
    {
        match field.name() {
            Some("documentFile") => {
                file_name = field.file_name().map(|n| n.to_string());
                mime_type = field.content_type().map(|c| c.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Falha ao ler o arquivo: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            Some("title") => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| AppError::BadRequest("Campo title inválido.".into()))?,
                );
            }
            Some("deadlineAt") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest("Campo deadlineAt inválido.".into()))?;
                if !raw.trim().is_empty() {
                    let parsed = DateTime::parse_from_rfc3339(raw.trim()).map_err(|_| {
                        AppError::BadRequest("deadlineAt deve ser uma data RFC 3339.".into())
                    })?;
                    deadline_at = Some(parsed.with_timezone(&Utc));
                }
            }
            Some("folderId") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|_| AppError::BadRequest("Campo folderId inválido.".into()))?;
                if !raw.trim().is_empty() {
                    folder_id = Some(Uuid::parse_str(raw.trim()).map_err(|_| {
                        AppError::BadRequest("folderId deve ser um UUID.".into())
                    })?);
                }
            }
            _ => {}
        }
    }

    let bytes =
        bytes.ok_or_else(|| AppError::BadRequest("O campo documentFile é obrigatório.".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("O arquivo enviado está vazio.".into()));
    }

    Ok(UploadForm {
        bytes,
        file_name: file_name.unwrap_or_else(|| "documento.pdf".to_string()),
        mime_type: mime_type.unwrap_or_else(|| "application/pdf".to_string()),
        title,
        deadline_at,
        folder_id,
    })
}

/// Upload de documento (multipart, campo `documentFile`).
#[utoipa::path(
    post,
    path = "/api/documents",
    responses((status = 201), (status = 403), (status = 400)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn upload_document(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsWrite>,
    meta: ClientMeta,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_upload_form(multipart).await?;

    let document = app_state
        .document_service
        .upload(
            &user,
            form.bytes,
            &form.file_name,
            &form.mime_type,
            form.title,
            form.deadline_at,
            form.folder_id,
            meta.ip,
            meta.user_agent,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    get,
    path = "/api/documents",
    params(ListDocumentsQuery),
    responses((status = 200)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn list_documents(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let documents = app_state
        .document_service
        .list(user.tenant_id, query.status.as_deref(), query.folder_id)
        .await?;
    Ok(Json(documents))
}

#[utoipa::path(
    get,
    path = "/api/documents/stats",
    responses((status = 200)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn document_stats(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
) -> Result<impl IntoResponse, AppError> {
    let stats = app_state.document_service.stats(user.tenant_id).await?;
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn get_document(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state
        .document_service
        .detail(user.tenant_id, document_id)
        .await?;
    Ok(Json(detail))
}

/// Convida signatários e dispara os links de assinatura.
#[utoipa::path(
    post,
    path = "/api/documents/{id}/invite",
    params(("id" = Uuid, Path, description = "ID do documento")),
    request_body = InviteSignersPayload,
    responses((status = 201), (status = 400), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn invite_signers(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsWrite>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<InviteSignersPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let signers = app_state
        .signing_service
        .invite_signers(&user, document_id, &payload)
        .await?;

    let signers: Vec<crate::models::signers::SignerPublic> =
        signers.into_iter().map(Into::into).collect();
    Ok((StatusCode::CREATED, Json(signers)))
}

#[utoipa::path(
    post,
    path = "/api/documents/{id}/cancel",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200), (status = 400), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn cancel_document(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsWrite>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let document = app_state.document_service.cancel(&user, document_id).await?;
    Ok(Json(document))
}

#[utoipa::path(
    post,
    path = "/api/documents/{id}/expire",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200), (status = 400), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn expire_document(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsWrite>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let document = app_state.document_service.expire(&user, document_id).await?;
    Ok(Json(document))
}

/// Reconfere o arquivo em disco contra o sha256 gravado.
#[utoipa::path(
    get,
    path = "/api/documents/{id}/integrity",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn document_integrity(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let intact = app_state
        .document_service
        .recheck_integrity(user.tenant_id, document_id)
        .await?;
    Ok(Json(serde_json::json!({ "intact": intact })))
}

/// Trilha de auditoria do documento (e de seus signatários).
#[utoipa::path(
    get,
    path = "/api/documents/{id}/audit",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn document_audit(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Garante o escopo de tenant antes de abrir a trilha.
    app_state
        .document_service
        .detail(user.tenant_id, document_id)
        .await?;

    let signer_ids = app_state.signer_repo.ids_by_document(document_id).await?;
    let events = app_state
        .audit_service
        .list_for_document(document_id, &signer_ids)
        .await?;
    Ok(Json(events))
}

/// Reverifica a corrente de hashes da trilha do documento.
#[utoipa::path(
    get,
    path = "/api/documents/{id}/verify-chain",
    params(("id" = Uuid, Path, description = "ID do documento")),
    responses((status = 200), (status = 404)),
    tag = "documents",
    security(("bearer" = []))
)]
pub async fn verify_document_chain(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .document_service
        .detail(user.tenant_id, document_id)
        .await?;

    let signer_ids = app_state.signer_repo.ids_by_document(document_id).await?;
    let verification = app_state
        .audit_service
        .verify_chain_for_document(document_id, &signer_ids)
        .await?;
    Ok(Json(verification))
}

/// Validação pública: reapresente um arquivo e descubra se ele é um
/// documento assinado neste sistema.
#[utoipa::path(
    post,
    path = "/api/documents/validate-file",
    responses((status = 200)),
    tag = "documents"
)]
pub async fn validate_file(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart inválido: {}", e)))?
    {
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Falha ao ler o arquivo: {}", e)))?;
        bytes = Some(data.to_vec());
        break;
    }
    let bytes = bytes.ok_or_else(|| AppError::BadRequest("Envie um arquivo.".into()))?;

    let response = app_state.document_service.validate_buffer(&bytes).await?;
    Ok(Json(response))
}

// ---
// Pastas
// ---

#[utoipa::path(
    post,
    path = "/api/folders",
    request_body = CreateFolderPayload,
    responses((status = 201), (status = 404)),
    tag = "folders",
    security(("bearer" = []))
)]
pub async fn create_folder(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsWrite>,
    Json(payload): Json<CreateFolderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let folder = app_state
        .document_service
        .create_folder(&user, &payload.name, payload.color.as_deref(), payload.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

#[utoipa::path(
    get,
    path = "/api/folders",
    responses((status = 200)),
    tag = "folders",
    security(("bearer" = []))
)]
pub async fn list_folders(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsRead>,
) -> Result<impl IntoResponse, AppError> {
    let folders = app_state.document_service.list_folders(user.tenant_id).await?;
    Ok(Json(folders))
}

#[utoipa::path(
    post,
    path = "/api/folders/{id}/move",
    params(("id" = Uuid, Path, description = "ID da pasta")),
    request_body = MoveFolderPayload,
    responses((status = 200), (status = 400), (status = 404)),
    tag = "folders",
    security(("bearer" = []))
)]
pub async fn move_folder(
    State(app_state): State<AppState>,
    user: CurrentUser,
    _guard: RequireRole<PermDocumentsWrite>,
    Path(folder_id): Path<Uuid>,
    Json(payload): Json<MoveFolderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let folder = app_state
        .document_service
        .move_folder(user.tenant_id, folder_id, payload.parent_id)
        .await?;
    Ok(Json(folder))
}
