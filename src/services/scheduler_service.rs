// src/services/scheduler_service.rs
//
// Gancho do agendador externo: este serviço não agenda nada, só expõe as
// duas operações que o cron de fora invoca via HTTP.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, SessionRepository, SignerRepository},
    models::{
        audit::{actions, ActorKind, EntityType, NewAuditEvent},
        documents::{Document, DocumentStatus},
    },
    services::audit_service::AuditService,
};

#[derive(Clone)]
pub struct SchedulerService {
    document_repo: DocumentRepository,
    signer_repo: SignerRepository,
    session_repo: SessionRepository,
    audit_service: AuditService,
    pool: sqlx::PgPool,
}

impl SchedulerService {
    pub fn new(
        document_repo: DocumentRepository,
        signer_repo: SignerRepository,
        session_repo: SessionRepository,
        audit_service: AuditService,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            document_repo,
            signer_repo,
            session_repo,
            audit_service,
            pool,
        }
    }

    /// Documentos pendentes, com lembrete automático ligado e prazo nas
    /// próximas 24 horas. Quem manda o lembrete é o chamador.
    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Document>, AppError> {
        self.document_repo.due_reminders(now).await
    }

    /// Expira todos os documentos pendentes com prazo vencido. Cada
    /// transição é auditada com ator SYSTEM.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let candidates = self.document_repo.find_overdue(now).await?;
        let mut expired = 0u64;

        for candidate in candidates {
            let mut tx = self.pool.begin().await?;

            // Reconfere o status sob trava: o último signatário pode ter
            // selado o documento entre a listagem e agora.
            let document = self
                .document_repo
                .lock_for_update(&mut *tx, candidate.id)
                .await?;
            if !document.status.is_pending() {
                continue;
            }

            self.document_repo
                .update_status(&mut *tx, document.id, DocumentStatus::Expired)
                .await?;
            self.signer_repo
                .expire_pending_of_document(&mut *tx, document.id)
                .await?;

            self.audit_service
                .append_event(
                    &mut *tx,
                    NewAuditEvent {
                        tenant_id: document.tenant_id,
                        actor_kind: ActorKind::System,
                        actor_id: None,
                        entity_type: EntityType::Document,
                        entity_id: document.id,
                        action: actions::STATUS_CHANGED,
                        ip: None,
                        user_agent: None,
                        payload: Some(json!({ "newStatus": DocumentStatus::Expired })),
                    },
                )
                .await?;

            tx.commit().await?;
            expired += 1;
        }

        // Aproveita a passada para limpar sessões de refresh vencidas.
        let purged = self.session_repo.delete_expired(now).await?;
        if purged > 0 {
            tracing::info!("🧹 {} sessão(ões) expiradas removidas", purged);
        }

        if expired > 0 {
            tracing::info!("⏰ {} documento(s) expirados pelo agendador", expired);
        }
        Ok(expired)
    }
}
