// src/models/documents.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::signers::SignerPublic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "document_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,
    Ready,
    PartiallySigned,
    Signed,
    Expired,
    Cancelled,
}

impl DocumentStatus {
    /// Estados em que o documento ainda aceita assinaturas.
    pub fn is_pending(self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::PartiallySigned)
    }

    /// Estados terminais: nenhuma mutação de conteúdo é permitida.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentStatus::Signed | DocumentStatus::Cancelled | DocumentStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub storage_key: Option<String>,
    pub mime_type: String,
    #[serde(rename = "size")]
    pub size_bytes: i64,
    pub sha256: Option<String>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub auto_reminders: bool,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// Listagem e estatísticas
// ---

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListDocumentsQuery {
    /// Filtro de situação: `pendentes`, `concluidos` ou `lixeira`.
    pub status: Option<String>,
    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentDocument {
    pub id: Uuid,
    pub title: String,
    pub status: DocumentStatus,
    pub owner_name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub pending: i64,
    pub signed: i64,
    pub expired: i64,
    pub draft: i64,
    pub total: i64,
    pub storage_bytes: i64,
    pub recent: Vec<RecentDocument>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub signers: Vec<SignerPublic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<crate::models::signers::Certificate>,
}

// ---
// Validação pública de arquivo
// ---

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSigner {
    pub name: String,
    pub email: String,
    pub status: crate::models::signers::SignerStatus,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFileResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub hash_calculated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signers: Option<Vec<ValidatedSigner>>,
}

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderPayload {
    #[validate(length(min = 1, message = "O nome da pasta é obrigatório."))]
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveFolderPayload {
    pub parent_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializa_em_caixa_alta() {
        assert_eq!(
            serde_json::to_string(&DocumentStatus::PartiallySigned).unwrap(),
            "\"PARTIALLY_SIGNED\""
        );
        let parsed: DocumentStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, DocumentStatus::Cancelled);
    }
}
