// src/db/settings_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::settings::{TenantSettings, UpdateSettingsPayload},
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Tenant sem linha de configuração é tratado como "vazio", não como erro.
    pub async fn get(&self, tenant_id: Uuid) -> Result<TenantSettings, AppError> {
        let settings = sqlx::query_as::<_, TenantSettings>(
            "SELECT * FROM tenant_settings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings.unwrap_or_else(|| TenantSettings::empty(tenant_id)))
    }

    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        payload: &UpdateSettingsPayload,
    ) -> Result<TenantSettings, AppError> {
        let settings = sqlx::query_as::<_, TenantSettings>(
            r#"
            INSERT INTO tenant_settings
                (tenant_id, app_name, primary_color, logo_url,
                 zapi_instance_id, zapi_token, zapi_client_token, zapi_active,
                 resend_api_key, resend_active, final_email_template, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, FALSE),
                    $9, COALESCE($10, FALSE), $11, now())
            ON CONFLICT (tenant_id) DO UPDATE SET
                app_name = COALESCE($2, tenant_settings.app_name),
                primary_color = COALESCE($3, tenant_settings.primary_color),
                logo_url = COALESCE($4, tenant_settings.logo_url),
                zapi_instance_id = COALESCE($5, tenant_settings.zapi_instance_id),
                zapi_token = COALESCE($6, tenant_settings.zapi_token),
                zapi_client_token = COALESCE($7, tenant_settings.zapi_client_token),
                zapi_active = COALESCE($8, tenant_settings.zapi_active),
                resend_api_key = COALESCE($9, tenant_settings.resend_api_key),
                resend_active = COALESCE($10, tenant_settings.resend_active),
                final_email_template = COALESCE($11, tenant_settings.final_email_template),
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&payload.app_name)
        .bind(&payload.primary_color)
        .bind(&payload.logo_url)
        .bind(&payload.zapi_instance_id)
        .bind(&payload.zapi_token)
        .bind(&payload.zapi_client_token)
        .bind(payload.zapi_active)
        .bind(&payload.resend_api_key)
        .bind(payload.resend_active)
        .bind(&payload.final_email_template)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }
}
