// src/models/settings.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Configurações de marca e de notificação por tenant. As credenciais aqui
// têm precedência sobre as credenciais globais do processo (ver
// NotificationService).
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantSettings {
    pub tenant_id: Uuid,
    pub app_name: Option<String>,
    pub primary_color: Option<String>,
    pub logo_url: Option<String>,
    #[serde(skip_serializing)]
    pub zapi_instance_id: Option<String>,
    #[serde(skip_serializing)]
    pub zapi_token: Option<String>,
    #[serde(skip_serializing)]
    pub zapi_client_token: Option<String>,
    pub zapi_active: bool,
    #[serde(skip_serializing)]
    pub resend_api_key: Option<String>,
    pub resend_active: bool,
    pub final_email_template: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TenantSettings {
    pub fn empty(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            app_name: None,
            primary_color: None,
            logo_url: None,
            zapi_instance_id: None,
            zapi_token: None,
            zapi_client_token: None,
            zapi_active: false,
            resend_api_key: None,
            resend_active: false,
            final_email_template: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsPayload {
    pub app_name: Option<String>,
    pub primary_color: Option<String>,
    pub logo_url: Option<String>,
    pub zapi_instance_id: Option<String>,
    pub zapi_token: Option<String>,
    pub zapi_client_token: Option<String>,
    pub zapi_active: Option<bool>,
    pub resend_api_key: Option<String>,
    pub resend_active: Option<bool>,
    pub final_email_template: Option<String>,
}
