// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    extract::TypedHeader,
    headers::{authorization::Bearer, Authorization, UserAgent},
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::auth::UserRole,
    services::auth_service::decode_access_token,
};

// O principal da requisição. O tenant e o papel vêm da CREDENCIAL, não da
// linha persistida do usuário: é isso que faz a troca de tenant funcionar
// sem estado obsoleto no banco.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub role: UserRole,
}

// Middleware de autenticação: valida a credencial de acesso, confere que o
// usuário segue ATIVO e injeta o principal na requisição.
pub async fn auth_guard(
    State(app_state): State<AppState>,
    TypedHeader(auth_header): TypedHeader<Authorization<Bearer>>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = auth_header.token();

    let claims = decode_access_token(&app_state.jwt_secret, token)?;

    let user = app_state
        .user_repo
        .find_active_by_id(claims.sub)
        .await?
        .ok_or(AppError::InvalidToken)?;

    let principal = CurrentUser {
        id: user.id,
        email: user.email,
        tenant_id: claims.tenant_id,
        role: claims.role,
    };

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

// ---
// Extrator do principal (para os handlers)
// ---

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(serde_json::json!({
                        "message": "Credencial de acesso ausente ou inválida"
                    })),
                )
                    .into_response()
            })
    }
}

// ---
// Metadados do cliente (IP e user agent), para auditoria
// ---

#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Atrás de proxy, o IP real chega no X-Forwarded-For.
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| {
                parts
                    .headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string())
            });

        let user_agent = TypedHeader::<UserAgent>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(ua)| ua.to_string());

        Ok(ClientMeta { ip, user_agent })
    }
}
