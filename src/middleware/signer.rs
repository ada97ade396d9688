// src/middleware/signer.rs
//
// Resolução do token opaco da URL /sign/{token}: o hash SHA-256 do valor
// bruto localiza o ShareToken, que autoriza o par (documento, signatário).
// O valor bruto nunca é logado nem persistido.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{common::error::AppError, config::AppState, services::signing_service::SignerSession};

pub async fn signer_guard(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session = app_state.signing_service.resolve_token(&token).await?;
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for SignerSession
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SignerSession>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    axum::Json(serde_json::json!({
                        "message": "Link de assinatura inválido"
                    })),
                )
                    .into_response()
            })
    }
}
