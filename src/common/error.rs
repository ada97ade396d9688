// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Toda variante conhece o seu status HTTP; o corpo é sempre `{"message": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já cadastrado")]
    EmailAlreadyExists,

    #[error("CPF já cadastrado")]
    CpfAlreadyExists,

    #[error("Já existe um membro com este e-mail neste workspace")]
    MemberAlreadyExists,

    #[error("Violação de restrição única: {0}")]
    UniqueConstraintViolation(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido ou expirado")]
    InvalidToken,

    #[error("Sessão inválida")]
    SessionInvalid,

    #[error("Acesso negado")]
    ForbiddenAccess,

    #[error("Assinatura do plano irregular. Regularize o pagamento para continuar.")]
    SubscriptionIrregular,

    #[error("Limite de usuários do plano atingido")]
    UserLimitReached,

    #[error("Limite de documentos do plano atingido")]
    DocumentLimitReached,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Tenant não encontrado")]
    TenantNotFound,

    #[error("Plano não encontrado")]
    PlanNotFound,

    #[error("Documento não encontrado")]
    DocumentNotFound,

    #[error("Pasta não encontrada")]
    FolderNotFound,

    #[error("Convite não encontrado")]
    InviteNotFound,

    #[error("Link de assinatura inválido")]
    InvalidLink,

    #[error("Link de assinatura expirado")]
    ExpiredLink,

    #[error("Este link de assinatura já foi encerrado")]
    LinkClosed,

    #[error("Código expirado. Solicite um novo código.")]
    OtpExpired,

    #[error("Código inválido")]
    OtpInvalid,

    #[error("Este signatário não possui telefone cadastrado")]
    MissingPhone,

    #[error("Operação inválida para o estado atual do documento")]
    InvalidDocumentState,

    #[error("{0}")]
    BadRequest(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::MissingPhone
            | AppError::BadRequest(_)
            | AppError::InvalidDocumentState => StatusCode::BAD_REQUEST,

            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::SessionInvalid
            | AppError::OtpInvalid
            | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,

            AppError::ForbiddenAccess
            | AppError::SubscriptionIrregular
            | AppError::UserLimitReached
            | AppError::DocumentLimitReached
            | AppError::ExpiredLink
            | AppError::LinkClosed
            | AppError::OtpExpired => StatusCode::FORBIDDEN,

            AppError::UserNotFound
            | AppError::TenantNotFound
            | AppError::PlanNotFound
            | AppError::DocumentNotFound
            | AppError::FolderNotFound
            | AppError::InviteNotFound
            | AppError::InvalidLink => StatusCode::NOT_FOUND,

            AppError::EmailAlreadyExists
            | AppError::CpfAlreadyExists
            | AppError::MemberAlreadyExists
            | AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,

            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::FontNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Erros internos são logados com detalhe e mascarados para o cliente.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("🔥 Erro interno: {:?}", self);
            "Erro interno do servidor".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({ "message": message }));
        (status, body).into_response()
    }
}

// Mapeia violações de chave única do Postgres para erros de conflito
// específicos, pelo nome da constraint criada na migration.
pub fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(constraint) = db_err.constraint() {
                return match constraint {
                    "users_email_key" => AppError::EmailAlreadyExists,
                    "users_cpf_key" => AppError::CpfAlreadyExists,
                    "tenant_members_tenant_id_email_key" => AppError::MemberAlreadyExists,
                    _ => AppError::UniqueConstraintViolation(constraint.to_string()),
                };
            }
        }
    }
    err.into()
}
