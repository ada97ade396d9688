// src/db/otp_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{AuthChannel, OtpCode, OtpContext},
};

#[derive(Clone)]
pub struct OtpRepository {
    pool: PgPool,
}

impl OtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        recipient: &str,
        channel: AuthChannel,
        code_hash: &str,
        expires_at: DateTime<Utc>,
        context: OtpContext,
    ) -> Result<OtpCode, AppError> {
        let otp = sqlx::query_as::<_, OtpCode>(
            r#"
            INSERT INTO otp_codes (recipient, channel, code_hash, expires_at, context)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(recipient)
        .bind(channel)
        .bind(code_hash)
        .bind(expires_at)
        .bind(context)
        .fetch_one(&self.pool)
        .await?;
        Ok(otp)
    }

    // O código mais recente emitido para qualquer um dos endereços do
    // destinatário (e-mail ou telefone) no contexto dado.
    pub async fn latest_for_recipients(
        &self,
        context: OtpContext,
        recipients: &[String],
    ) -> Result<Option<OtpCode>, AppError> {
        let otp = sqlx::query_as::<_, OtpCode>(
            r#"
            SELECT * FROM otp_codes
            WHERE context = $1 AND recipient = ANY($2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(context)
        .bind(recipients)
        .fetch_optional(&self.pool)
        .await?;
        Ok(otp)
    }

    pub async fn increment_attempts(&self, otp_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE otp_codes SET attempts = attempts + 1 WHERE id = $1")
            .bind(otp_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Destruição no verify: a mesma transação que valida o código apaga a
    // linha, impedindo replay.
    pub async fn delete<'e, E>(&self, executor: E, otp_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM otp_codes WHERE id = $1")
            .bind(otp_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
