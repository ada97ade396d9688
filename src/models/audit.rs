// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "actor_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorKind {
    User,
    Signer,
    System,
}

impl ActorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorKind::User => "USER",
            ActorKind::Signer => "SIGNER",
            ActorKind::System => "SYSTEM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "audit_entity_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Document,
    Signer,
    Token,
    Otp,
    Storage,
    System,
    User,
    Tenant,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Document => "DOCUMENT",
            EntityType::Signer => "SIGNER",
            EntityType::Token => "TOKEN",
            EntityType::Otp => "OTP",
            EntityType::Storage => "STORAGE",
            EntityType::System => "SYSTEM",
            EntityType::User => "USER",
            EntityType::Tenant => "TENANT",
        }
    }
}

// Ações auditáveis. Gravadas como TEXT para que a trilha sobreviva a
// versões futuras do enum sem migração.
pub mod actions {
    pub const USER_CREATED: &str = "USER_CREATED";
    pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
    pub const PASSWORD_RESET_REQUESTED: &str = "PASSWORD_RESET_REQUESTED";
    pub const PASSWORD_RESET_DONE: &str = "PASSWORD_RESET_DONE";
    pub const TENANT_CREATED: &str = "TENANT_CREATED";
    pub const MEMBER_INVITED: &str = "MEMBER_INVITED";
    pub const STORAGE_UPLOADED: &str = "STORAGE_UPLOADED";
    pub const STATUS_CHANGED: &str = "STATUS_CHANGED";
    pub const SIGNER_ADDED: &str = "SIGNER_ADDED";
    pub const TOKEN_CREATED: &str = "TOKEN_CREATED";
    pub const VIEWED: &str = "VIEWED";
    pub const OTP_SENT: &str = "OTP_SENT";
    pub const OTP_VERIFIED: &str = "OTP_VERIFIED";
    pub const OTP_FAILED: &str = "OTP_FAILED";
    pub const SIGNED: &str = "SIGNED";
    pub const CERTIFICATE_ISSUED: &str = "CERTIFICATE_ISSUED";
    pub const REMINDER_DUE: &str = "REMINDER_DUE";
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub seq: i64,
    pub tenant_id: Uuid,
    pub actor_kind: ActorKind,
    pub actor_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub payload_json: Option<serde_json::Value>,
    pub prev_event_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

// O que um chamador entrega ao anexar um evento; o serviço resolve o elo
// anterior, o hash e o instante.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub tenant_id: Uuid,
    pub actor_kind: ActorKind,
    pub actor_id: Option<Uuid>,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: &'static str,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub payload: Option<serde_json::Value>,
}

// Resultado da verificação da cadeia de um documento.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub is_valid: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
