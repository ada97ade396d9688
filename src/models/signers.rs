// src/models/signers.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::AuthChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "signer_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerStatus {
    Pending,
    Viewed,
    Signed,
    Declined,
    Expired,
}

impl SignerStatus {
    /// O signatário ainda pode assinar?
    pub fn can_sign(self) -> bool {
        matches!(self, SignerStatus::Pending | SignerStatus::Viewed)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Signer {
    pub id: Uuid,
    pub document_id: Uuid,
    pub name: String,
    pub email: String,
    pub cpf: Option<String>,
    pub phone_e164: Option<String>,
    pub qualification: Option<String>,
    pub auth_channels: Vec<AuthChannel>,
    pub sign_order: i32,
    pub status: SignerStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub ip: Option<String>,
    pub signature_uuid: Option<Uuid>,
    pub signature_hash: Option<String>,
    pub signature_artefact_path: Option<String>,
    pub position_x: Option<f32>,
    pub position_y: Option<f32>,
    pub position_page: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Projeção do signatário para o dono do documento.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignerPublic {
    pub id: Uuid,
    pub document_id: Uuid,
    pub name: String,
    pub email: String,
    pub qualification: Option<String>,
    pub auth_channels: Vec<AuthChannel>,
    #[serde(rename = "order")]
    pub sign_order: i32,
    pub status: SignerStatus,
    pub signed_at: Option<DateTime<Utc>>,
}

impl From<Signer> for SignerPublic {
    fn from(s: Signer) -> Self {
        Self {
            id: s.id,
            document_id: s.document_id,
            name: s.name,
            email: s.email,
            qualification: s.qualification,
            auth_channels: s.auth_channels,
            sign_order: s.sign_order,
            status: s.status,
            signed_at: s.signed_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShareToken {
    pub id: Uuid,
    pub document_id: Uuid,
    pub signer_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub times_used: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub document_id: Uuid,
    pub storage_key: String,
    pub sha256: String,
    pub issued_at: DateTime<Utc>,
}

// ---
// Payloads da sessão de assinatura
// ---

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignerInput {
    #[validate(length(min = 1, message = "O nome do signatário é obrigatório."))]
    pub name: String,
    #[validate(email(message = "O e-mail do signatário é inválido."))]
    pub email: String,
    #[validate(length(equal = 11, message = "O CPF deve ter 11 dígitos."))]
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub auth_channels: Option<Vec<AuthChannel>>,
    #[serde(rename = "order")]
    pub sign_order: Option<i32>,
    pub position_x: Option<f32>,
    pub position_y: Option<f32>,
    pub position_page: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteSignersPayload {
    #[validate(length(min = 1, message = "Informe ao menos um signatário."), nested)]
    pub signers: Vec<SignerInput>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IdentifyPayload {
    #[validate(length(equal = 11, message = "O CPF deve ter 11 dígitos."))]
    pub cpf: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpPayload {
    #[validate(length(equal = 6, message = "O código deve ter 6 dígitos."))]
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionPayload {
    pub position_x: f32,
    pub position_y: f32,
    pub position_page: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitPayload {
    #[validate(length(min = 1, message = "O fingerprint do cliente é obrigatório."))]
    pub client_fingerprint: String,
    #[validate(length(min = 1, message = "A imagem da assinatura é obrigatória."))]
    pub signature_image: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub short_code: String,
    pub signature_hash: String,
    pub is_complete: bool,
}

// O que o signatário vê ao abrir o link (sem tokens, sem dados do dono).
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignerSessionSummary {
    pub document_id: Uuid,
    pub document_title: String,
    pub document_status: crate::models::documents::DocumentStatus,
    pub signer_id: Uuid,
    pub signer_name: String,
    pub signer_status: SignerStatus,
    pub auth_channels: Vec<AuthChannel>,
    pub deadline_at: Option<DateTime<Utc>>,
}
