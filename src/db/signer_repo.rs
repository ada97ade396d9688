// src/db/signer_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::AuthChannel,
        signers::{Certificate, ShareToken, Signer, SignerStatus},
    },
};

// Signatários, tokens de compartilhamento e certificados: tudo que um
// documento possui com exclusividade.
#[derive(Clone)]
pub struct SignerRepository {
    pool: PgPool,
}

impl SignerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Signatários
    // ---

    #[allow(clippy::too_many_arguments)]
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        name: &str,
        email: &str,
        cpf: Option<&str>,
        phone_e164: Option<&str>,
        qualification: Option<&str>,
        auth_channels: &[AuthChannel],
        sign_order: i32,
        position: Option<(f32, f32, i32)>,
    ) -> Result<Signer, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (px, py, ppage) = match position {
            Some((x, y, page)) => (Some(x), Some(y), Some(page)),
            None => (None, None, None),
        };

        let signer = sqlx::query_as::<_, Signer>(
            r#"
            INSERT INTO signers
                (document_id, name, email, cpf, phone_e164, qualification, auth_channels,
                 sign_order, status, position_x, position_y, position_page)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'PENDING', $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(name)
        .bind(email)
        .bind(cpf)
        .bind(phone_e164)
        .bind(qualification)
        .bind(auth_channels)
        .bind(sign_order)
        .bind(px)
        .bind(py)
        .bind(ppage)
        .fetch_one(executor)
        .await?;
        Ok(signer)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Signer>, AppError> {
        let signer = sqlx::query_as::<_, Signer>("SELECT * FROM signers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(signer)
    }

    pub async fn list_by_document<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
    ) -> Result<Vec<Signer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let signers = sqlx::query_as::<_, Signer>(
            "SELECT * FROM signers WHERE document_id = $1 ORDER BY sign_order, created_at",
        )
        .bind(document_id)
        .fetch_all(executor)
        .await?;
        Ok(signers)
    }

    pub async fn ids_by_document(&self, document_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM signers WHERE document_id = $1")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn update_identity(
        &self,
        signer_id: Uuid,
        cpf: Option<&str>,
        phone_e164: Option<&str>,
    ) -> Result<Signer, AppError> {
        let signer = sqlx::query_as::<_, Signer>(
            r#"
            UPDATE signers
            SET cpf = COALESCE($2, cpf),
                phone_e164 = COALESCE($3, phone_e164),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(signer_id)
        .bind(cpf)
        .bind(phone_e164)
        .fetch_one(&self.pool)
        .await?;
        Ok(signer)
    }

    pub async fn update_position(
        &self,
        signer_id: Uuid,
        x: f32,
        y: f32,
        page: i32,
    ) -> Result<Signer, AppError> {
        let signer = sqlx::query_as::<_, Signer>(
            r#"
            UPDATE signers
            SET position_x = $2, position_y = $3, position_page = $4, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(signer_id)
        .bind(x)
        .bind(y)
        .bind(page)
        .fetch_one(&self.pool)
        .await?;
        Ok(signer)
    }

    // Primeira abertura do link: PENDING vira VIEWED.
    pub async fn mark_viewed<'e, E>(&self, executor: E, signer_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE signers SET status = 'VIEWED', updated_at = now() WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(signer_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    // Commit do signatário. O predicado de status no WHERE garante que, de
    // dois commits concorrentes para o mesmo signatário, só um vence.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_signed<'e, E>(
        &self,
        executor: E,
        signer_id: Uuid,
        signed_at: DateTime<Utc>,
        ip: &str,
        signature_uuid: Uuid,
        signature_hash: &str,
        signature_artefact_path: &str,
    ) -> Result<Option<Signer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let signer = sqlx::query_as::<_, Signer>(
            r#"
            UPDATE signers
            SET status = 'SIGNED', signed_at = $2, ip = $3, signature_uuid = $4,
                signature_hash = $5, signature_artefact_path = $6, updated_at = now()
            WHERE id = $1 AND status IN ('PENDING', 'VIEWED')
            RETURNING *
            "#,
        )
        .bind(signer_id)
        .bind(signed_at)
        .bind(ip)
        .bind(signature_uuid)
        .bind(signature_hash)
        .bind(signature_artefact_path)
        .fetch_optional(executor)
        .await?;
        Ok(signer)
    }

    pub async fn expire_pending_of_document<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE signers SET status = 'EXPIRED', updated_at = now()
            WHERE document_id = $1 AND status IN ('PENDING', 'VIEWED')
            "#,
        )
        .bind(document_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub fn all_signed(signers: &[Signer]) -> bool {
        !signers.is_empty() && signers.iter().all(|s| s.status == SignerStatus::Signed)
    }

    // ---
    // Tokens de compartilhamento
    // ---

    pub async fn insert_token<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        signer_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ShareToken, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let token = sqlx::query_as::<_, ShareToken>(
            r#"
            INSERT INTO share_tokens (document_id, signer_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(signer_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(executor)
        .await?;
        Ok(token)
    }

    pub async fn find_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ShareToken>, AppError> {
        let token =
            sqlx::query_as::<_, ShareToken>("SELECT * FROM share_tokens WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token)
    }

    pub async fn touch_token(&self, token_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE share_tokens SET times_used = times_used + 1 WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---
    // Certificados
    // ---

    pub async fn insert_certificate<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        storage_key: &str,
        sha256: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<Certificate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cert = sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (document_id, storage_key, sha256, issued_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(storage_key)
        .bind(sha256)
        .bind(issued_at)
        .fetch_one(executor)
        .await?;
        Ok(cert)
    }

    pub async fn find_certificate(
        &self,
        document_id: Uuid,
    ) -> Result<Option<Certificate>, AppError> {
        let cert =
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE document_id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signers::Signer;
    use chrono::Utc;

    fn signer_with_status(status: SignerStatus) -> Signer {
        Signer {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            name: "Fulano".into(),
            email: "fulano@exemplo.com".into(),
            cpf: None,
            phone_e164: None,
            qualification: None,
            auth_channels: vec![AuthChannel::Email],
            sign_order: 0,
            status,
            signed_at: None,
            ip: None,
            signature_uuid: None,
            signature_hash: None,
            signature_artefact_path: None,
            position_x: None,
            position_y: None,
            position_page: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn all_signed_exige_todos() {
        let mut signers = vec![
            signer_with_status(SignerStatus::Signed),
            signer_with_status(SignerStatus::Viewed),
        ];
        assert!(!SignerRepository::all_signed(&signers));

        signers[1].status = SignerStatus::Signed;
        assert!(SignerRepository::all_signed(&signers));
    }

    #[test]
    fn all_signed_com_lista_vazia_e_falso() {
        assert!(!SignerRepository::all_signed(&[]));
    }
}
