// src/middleware/rbac.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use std::marker::PhantomData;

use crate::{middleware::auth::CurrentUser, models::auth::UserRole};

/// 1. O Trait que define um conjunto de papéis aceitos
pub trait RoleSet: Send + Sync + 'static {
    fn allowed() -> &'static [UserRole];
}

/// 2. O Extractor (Guardião). SUPER_ADMIN passa por qualquer guarda; os
/// demais papéis precisam constar no conjunto.
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleSet,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(principal) = parts.extensions.get::<CurrentUser>() else {
            return Err(forbidden_response(
                StatusCode::UNAUTHORIZED,
                "Usuário não autenticado",
            ));
        };

        if principal.role == UserRole::SuperAdmin || T::allowed().contains(&principal.role) {
            return Ok(RequireRole(PhantomData));
        }

        Err(forbidden_response(
            StatusCode::FORBIDDEN,
            "Acesso negado",
        ))
    }
}

/// Guarda estrita de super-admin: aqui não há herança de papel.
pub struct RequireSuperAdmin;

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentUser>() {
            Some(principal) if principal.role == UserRole::SuperAdmin => Ok(RequireSuperAdmin),
            Some(_) => Err(forbidden_response(StatusCode::FORBIDDEN, "Acesso negado")),
            None => Err(forbidden_response(
                StatusCode::UNAUTHORIZED,
                "Usuário não autenticado",
            )),
        }
    }
}

fn forbidden_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        axum::Json(serde_json::json!({ "message": message })),
    )
        .into_response()
}

// ---
// DEFINIÇÃO DOS CONJUNTOS DE PAPÉIS
// ---

/// Escrita em documentos: upload, convite de signatários, cancelar, expirar.
pub struct PermDocumentsWrite;
impl RoleSet for PermDocumentsWrite {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::Admin, UserRole::Manager]
    }
}

/// Leitura de documentos, estatísticas e trilha de auditoria.
pub struct PermDocumentsRead;
impl RoleSet for PermDocumentsRead {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::Admin, UserRole::Manager, UserRole::Viewer]
    }
}

/// Administração do tenant: convites de membro e configurações.
pub struct PermTenantAdmin;
impl RoleSet for PermTenantAdmin {
    fn allowed() -> &'static [UserRole] {
        &[UserRole::Admin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjuntos_de_papeis() {
        assert!(PermDocumentsWrite::allowed().contains(&UserRole::Manager));
        assert!(!PermDocumentsWrite::allowed().contains(&UserRole::Viewer));
        assert!(PermDocumentsRead::allowed().contains(&UserRole::Viewer));
        assert!(!PermTenantAdmin::allowed().contains(&UserRole::Manager));
        // SUPER_ADMIN não precisa constar: o guardião o deixa passar.
        for set in [
            PermDocumentsWrite::allowed(),
            PermDocumentsRead::allowed(),
            PermTenantAdmin::allowed(),
        ] {
            assert!(!set.contains(&UserRole::SuperAdmin));
        }
    }
}
