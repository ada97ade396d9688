// src/db/document_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::documents::{Document, DocumentStats, DocumentStatus, Folder, RecentDocument},
};

#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Documentos
    // ---

    // Passo 1 do upload: a linha nasce DRAFT, sem storage_key e sem sha256.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_draft<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        title: &str,
        mime_type: &str,
        size_bytes: i64,
        deadline_at: Option<DateTime<Utc>>,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let doc = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents
                (tenant_id, owner_id, folder_id, title, mime_type, size_bytes, deadline_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'DRAFT')
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .bind(folder_id)
        .bind(title)
        .bind(mime_type)
        .bind(size_bytes)
        .bind(deadline_at)
        .fetch_one(executor)
        .await?;
        Ok(doc)
    }

    // Passo final do upload: registra o conteúdo persistido e promove a READY.
    pub async fn finalize_upload<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        storage_key: &str,
        sha256: &str,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let doc = sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents
            SET storage_key = $2, sha256 = $3, status = 'READY', updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(storage_key)
        .bind(sha256)
        .fetch_one(executor)
        .await?;
        Ok(doc)
    }

    // Busca restrita ao tenant. Documento de outro tenant é indistinguível
    // de documento inexistente (evita enumeração).
    pub async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Option<Document>, AppError> {
        let doc = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE id = $1 AND tenant_id = $2",
        )
        .bind(document_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    pub async fn find_by_id(&self, document_id: Uuid) -> Result<Option<Document>, AppError> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    pub async fn find_by_sha256(&self, sha256: &str) -> Result<Option<Document>, AppError> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE sha256 = $1")
            .bind(sha256)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    // Trava a linha do documento dentro da transação. É o que serializa
    // dois "últimos commits" concorrentes no fechamento.
    pub async fn lock_for_update<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1 FOR UPDATE")
            .bind(document_id)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::DocumentNotFound)?;
        Ok(doc)
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        statuses: &[DocumentStatus],
        folder_id: Option<Uuid>,
    ) -> Result<Vec<Document>, AppError> {
        let docs = sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents
            WHERE tenant_id = $1
              AND status = ANY($2)
              AND ($3::uuid IS NULL OR folder_id = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(statuses)
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub async fn count_by_tenant<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let doc = sqlx::query_as::<_, Document>(
            "UPDATE documents SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(document_id)
        .bind(status)
        .fetch_one(executor)
        .await?;
        Ok(doc)
    }

    // Fechamento: grava a nova chave de storage e o novo hash do artefato
    // carimbado, já com status SIGNED.
    pub async fn seal_signed<'e, E>(
        &self,
        executor: E,
        document_id: Uuid,
        storage_key: &str,
        sha256: &str,
    ) -> Result<Document, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let doc = sqlx::query_as::<_, Document>(
            r#"
            UPDATE documents
            SET storage_key = $2, sha256 = $3, status = 'SIGNED', updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(storage_key)
        .bind(sha256)
        .fetch_one(executor)
        .await?;
        Ok(doc)
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<DocumentStats, AppError> {
        let (pending, signed, expired, draft, total, storage_bytes): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status IN ('READY', 'PARTIALLY_SIGNED')),
                COUNT(*) FILTER (WHERE status = 'SIGNED'),
                COUNT(*) FILTER (WHERE status = 'EXPIRED'),
                COUNT(*) FILTER (WHERE status = 'DRAFT'),
                COUNT(*) FILTER (WHERE status <> 'CANCELLED'),
                COALESCE(SUM(size_bytes) FILTER (WHERE status <> 'CANCELLED'), 0)::BIGINT
            FROM documents
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let recent = sqlx::query_as::<_, RecentDocument>(
            r#"
            SELECT d.id, d.title, d.status, u.name AS owner_name, d.updated_at
            FROM documents d
            JOIN users u ON u.id = d.owner_id
            WHERE d.tenant_id = $1 AND d.status <> 'CANCELLED'
            ORDER BY d.updated_at DESC
            LIMIT 5
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(DocumentStats {
            pending,
            signed,
            expired,
            draft,
            total,
            storage_bytes,
            recent,
        })
    }

    // ---
    // Ganchos do agendador externo
    // ---

    // Documentos pendentes com lembrete automático e prazo nas próximas 24h.
    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Document>, AppError> {
        let docs = sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents
            WHERE status IN ('READY', 'PARTIALLY_SIGNED')
              AND auto_reminders = TRUE
              AND deadline_at IS NOT NULL
              AND deadline_at > $1
              AND deadline_at <= $1 + INTERVAL '24 hours'
            ORDER BY deadline_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    pub async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Document>, AppError> {
        let docs = sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents
            WHERE status IN ('READY', 'PARTIALLY_SIGNED')
              AND deadline_at IS NOT NULL
              AND deadline_at < $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }

    // ---
    // Pastas
    // ---

    pub async fn create_folder(
        &self,
        tenant_id: Uuid,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
        color: &str,
    ) -> Result<Folder, AppError> {
        let folder = sqlx::query_as::<_, Folder>(
            r#"
            INSERT INTO folders (tenant_id, owner_id, parent_id, name, color)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(owner_id)
        .bind(parent_id)
        .bind(name)
        .bind(color)
        .fetch_one(&self.pool)
        .await?;
        Ok(folder)
    }

    pub async fn find_folder(
        &self,
        tenant_id: Uuid,
        folder_id: Uuid,
    ) -> Result<Option<Folder>, AppError> {
        let folder =
            sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 AND tenant_id = $2")
                .bind(folder_id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(folder)
    }

    pub async fn list_folders(&self, tenant_id: Uuid) -> Result<Vec<Folder>, AppError> {
        let folders =
            sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE tenant_id = $1 ORDER BY name")
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(folders)
    }

    pub async fn set_folder_parent(
        &self,
        folder_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<Folder, AppError> {
        let folder = sqlx::query_as::<_, Folder>(
            "UPDATE folders SET parent_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(folder_id)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(folder)
    }
}
