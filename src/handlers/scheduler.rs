// src/handlers/scheduler.rs
//
// Endpoints que o agendador externo (cron) invoca. Restritos a super-admin.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;

use crate::{
    common::error::AppError, config::AppState, middleware::rbac::RequireSuperAdmin,
};

/// Enumera os documentos com lembrete devido nas próximas 24 horas.
#[utoipa::path(
    post,
    path = "/api/scheduler/reminders",
    responses((status = 200)),
    tag = "scheduler",
    security(("bearer" = []))
)]
pub async fn due_reminders(
    State(app_state): State<AppState>,
    _guard: RequireSuperAdmin,
) -> Result<impl IntoResponse, AppError> {
    let documents = app_state.scheduler_service.due_reminders(Utc::now()).await?;
    Ok(Json(documents))
}

/// Expira documentos pendentes com prazo vencido.
#[utoipa::path(
    post,
    path = "/api/scheduler/expire",
    responses((status = 200)),
    tag = "scheduler",
    security(("bearer" = []))
)]
pub async fn expire_overdue(
    State(app_state): State<AppState>,
    _guard: RequireSuperAdmin,
) -> Result<impl IntoResponse, AppError> {
    let expired = app_state.scheduler_service.expire_overdue(Utc::now()).await?;
    Ok(Json(serde_json::json!({ "expired": expired })))
}
