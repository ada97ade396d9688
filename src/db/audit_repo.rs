// src/db/audit_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::audit::{ActorKind, AuditLog, EntityType},
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Trava consultiva por entidade, com escopo da transação corrente.
    // Dois appends paralelos para a mesma entidade serializam aqui; o
    // segundo só lê o último hash depois que o primeiro commitou sua linha
    // na MESMA transação ou liberou a trava.
    pub async fn acquire_entity_lock<'e, E>(
        &self,
        executor: E,
        entity_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut key = [0u8; 8];
        key.copy_from_slice(&entity_id.as_bytes()[..8]);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(i64::from_be_bytes(key))
            .execute(executor)
            .await?;
        Ok(())
    }

    // Último hash da cadeia da entidade, lido dentro da transação para que
    // dois appends na mesma transação se enxerguem.
    pub async fn last_event_hash<'e, E>(
        &self,
        executor: E,
        entity_id: Uuid,
    ) -> Result<Option<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT event_hash FROM audit_logs
            WHERE entity_id = $1
            ORDER BY created_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(entity_id)
        .fetch_optional(executor)
        .await?;
        Ok(row.map(|(hash,)| hash))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_kind: ActorKind,
        actor_id: Option<Uuid>,
        entity_type: EntityType,
        entity_id: Uuid,
        action: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
        payload_json: Option<&serde_json::Value>,
        prev_event_hash: &str,
        event_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<AuditLog, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs
                (tenant_id, actor_kind, actor_id, entity_type, entity_id, action,
                 ip, user_agent, payload_json, prev_event_hash, event_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(actor_kind)
        .bind(actor_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(ip)
        .bind(user_agent)
        .bind(payload_json)
        .bind(prev_event_hash)
        .bind(event_hash)
        .bind(created_at)
        .fetch_one(executor)
        .await?;
        Ok(event)
    }

    // Eventos do documento e de seus signatários, na ordem da cadeia.
    pub async fn list_for_document_chain(
        &self,
        document_id: Uuid,
        signer_ids: &[Uuid],
    ) -> Result<Vec<AuditLog>, AppError> {
        let events = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT * FROM audit_logs
            WHERE (entity_type = 'DOCUMENT' AND entity_id = $1)
               OR (entity_type = 'SIGNER' AND entity_id = ANY($2))
            ORDER BY created_at, seq
            "#,
        )
        .bind(document_id)
        .bind(signer_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    // Trilha de um único entity_id (usada pela verificação elo a elo).
    pub async fn list_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditLog>, AppError> {
        let events = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE entity_id = $1 ORDER BY created_at, seq",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}
