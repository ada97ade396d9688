// src/services/document_service.rs

use std::path::{Path, PathBuf};

use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{crypto::sha256_hex, error::AppError},
    db::{DocumentRepository, SignerRepository, TenantRepository, UserRepository},
    models::{
        audit::{actions, ActorKind, EntityType, NewAuditEvent},
        documents::{
            Document, DocumentDetail, DocumentStats, DocumentStatus, Folder,
            ValidateFileResponse, ValidatedSigner,
        },
    },
    middleware::auth::CurrentUser,
    services::{audit_service::AuditService, quota_service::QuotaService},
};

// Palavras-chave de filtro da listagem → conjuntos de status.
pub fn statuses_for_filter(filter: Option<&str>) -> Vec<DocumentStatus> {
    match filter {
        Some("pendentes") => vec![DocumentStatus::Ready, DocumentStatus::PartiallySigned],
        Some("concluidos") => vec![DocumentStatus::Signed],
        Some("lixeira") => vec![DocumentStatus::Cancelled, DocumentStatus::Expired],
        // Padrão: tudo menos a lixeira de cancelados.
        _ => vec![
            DocumentStatus::Draft,
            DocumentStatus::Ready,
            DocumentStatus::PartiallySigned,
            DocumentStatus::Signed,
            DocumentStatus::Expired,
        ],
    }
}

// Caminho absoluto de uma storage_key relativa ("uploads/...").
pub fn resolve_upload_path(root: &Path, storage_key: &str) -> PathBuf {
    root.join(storage_key.strip_prefix("uploads/").unwrap_or(storage_key))
}

// Extensão do nome original, com o ponto. Sem extensão, vazio.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct DocumentService {
    document_repo: DocumentRepository,
    signer_repo: SignerRepository,
    user_repo: UserRepository,
    tenant_repo: TenantRepository,
    quota_service: QuotaService,
    audit_service: AuditService,
    uploads_dir: PathBuf,
    pool: sqlx::PgPool,
}

impl DocumentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_repo: DocumentRepository,
        signer_repo: SignerRepository,
        user_repo: UserRepository,
        tenant_repo: TenantRepository,
        quota_service: QuotaService,
        audit_service: AuditService,
        uploads_dir: PathBuf,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            document_repo,
            signer_repo,
            user_repo,
            tenant_repo,
            quota_service,
            audit_service,
            uploads_dir,
            pool,
        }
    }

    // ---
    // Upload: linha DRAFT → bytes no disco → sha256 → READY, com auditoria.
    // ---
    #[allow(clippy::too_many_arguments)]
    pub async fn upload(
        &self,
        principal: &CurrentUser,
        bytes: Vec<u8>,
        original_name: &str,
        mime_type: &str,
        title: Option<String>,
        deadline_at: Option<chrono::DateTime<chrono::Utc>>,
        folder_id: Option<Uuid>,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Document, AppError> {
        let tenant = self
            .tenant_repo
            .find_by_id(principal.tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)?;

        self.quota_service
            .check_upload_allowed(&tenant, principal.role)
            .await?;

        // A pasta, se veio, precisa pertencer ao tenant.
        if let Some(folder_id) = folder_id {
            self.document_repo
                .find_folder(principal.tenant_id, folder_id)
                .await?
                .ok_or(AppError::FolderNotFound)?;
        }

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| original_name.to_string());
        let ext = extension_of(original_name);

        let mut tx = self.pool.begin().await?;

        let draft = self
            .document_repo
            .insert_draft(
                &mut *tx,
                principal.tenant_id,
                principal.id,
                folder_id,
                &title,
                mime_type,
                bytes.len() as i64,
                deadline_at,
            )
            .await?;

        // Bytes no disco. Se algo falhar depois daqui, o arquivo órfão é
        // removido em melhor esforço e a transação sofre rollback.
        let storage_key = format!("uploads/{}/{}{}", principal.tenant_id, draft.id, ext);
        let absolute = self.resolve_storage_path(&storage_key);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("Falha ao criar diretório de uploads: {}", e))?;
        }
        tokio::fs::write(&absolute, &bytes)
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao gravar o arquivo: {}", e))?;

        let sha256 = sha256_hex(&bytes);

        let finalize = async {
            let document = self
                .document_repo
                .finalize_upload(&mut *tx, draft.id, &storage_key, &sha256)
                .await?;

            self.audit_service
                .append_event(
                    &mut *tx,
                    NewAuditEvent {
                        tenant_id: principal.tenant_id,
                        actor_kind: ActorKind::User,
                        actor_id: Some(principal.id),
                        entity_type: EntityType::Document,
                        entity_id: document.id,
                        action: actions::STORAGE_UPLOADED,
                        ip: ip.clone(),
                        user_agent: user_agent.clone(),
                        payload: Some(json!({
                            "fileName": original_name,
                            "sha256": sha256,
                        })),
                    },
                )
                .await?;

            Ok::<Document, AppError>(document)
        }
        .await;

        match finalize {
            Ok(document) => {
                tx.commit().await?;
                tracing::info!("📄 Documento {} recebido ({} bytes)", document.id, bytes.len());
                Ok(document)
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&absolute).await;
                Err(err)
            }
        }
    }

    // ---
    // Consultas
    // ---

    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: Option<&str>,
        folder_id: Option<Uuid>,
    ) -> Result<Vec<Document>, AppError> {
        let statuses = statuses_for_filter(filter);
        self.document_repo.list(tenant_id, &statuses, folder_id).await
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<DocumentStats, AppError> {
        self.document_repo.stats(tenant_id).await
    }

    pub async fn detail(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<DocumentDetail, AppError> {
        let document = self
            .document_repo
            .find_for_tenant(tenant_id, document_id)
            .await?
            .ok_or(AppError::DocumentNotFound)?;

        let signers = self
            .signer_repo
            .list_by_document(&self.pool, document.id)
            .await?;
        let certificate = self.signer_repo.find_certificate(document.id).await?;

        Ok(DocumentDetail {
            document,
            signers: signers.into_iter().map(Into::into).collect(),
            certificate,
        })
    }

    // ---
    // Transições manuais: cancelar e expirar.
    // ---

    pub async fn cancel(
        &self,
        principal: &CurrentUser,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        self.transition(principal, document_id, DocumentStatus::Cancelled)
            .await
    }

    pub async fn expire(
        &self,
        principal: &CurrentUser,
        document_id: Uuid,
    ) -> Result<Document, AppError> {
        self.transition(principal, document_id, DocumentStatus::Expired)
            .await
    }

    async fn transition(
        &self,
        principal: &CurrentUser,
        document_id: Uuid,
        new_status: DocumentStatus,
    ) -> Result<Document, AppError> {
        // O escopo de tenant resolve antes de qualquer coisa: documento de
        // outro tenant é 404.
        self.document_repo
            .find_for_tenant(principal.tenant_id, document_id)
            .await?
            .ok_or(AppError::DocumentNotFound)?;

        let mut tx = self.pool.begin().await?;

        let document = self.document_repo.lock_for_update(&mut *tx, document_id).await?;
        if !document.status.is_pending() {
            return Err(AppError::InvalidDocumentState);
        }

        let document = self
            .document_repo
            .update_status(&mut *tx, document_id, new_status)
            .await?;

        if new_status == DocumentStatus::Expired {
            self.signer_repo
                .expire_pending_of_document(&mut *tx, document_id)
                .await?;
        }

        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: principal.tenant_id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(principal.id),
                    entity_type: EntityType::Document,
                    entity_id: document_id,
                    action: actions::STATUS_CHANGED,
                    ip: None,
                    user_agent: None,
                    payload: Some(json!({ "newStatus": new_status })),
                },
            )
            .await?;

        tx.commit().await?;
        Ok(document)
    }

    // ---
    // Validação pública: alguém reapresenta um PDF e perguntamos ao banco
    // se aquele exato conteúdo é um documento assinado.
    // ---
    pub async fn validate_buffer(&self, bytes: &[u8]) -> Result<ValidateFileResponse, AppError> {
        let hash_calculated = sha256_hex(bytes);

        let Some(document) = self.document_repo.find_by_sha256(&hash_calculated).await? else {
            return Ok(ValidateFileResponse {
                valid: false,
                reason: Some("NOT_FOUND".to_string()),
                hash_calculated,
                title: None,
                signed_at: None,
                owner_name: None,
                signers: None,
            });
        };

        if document.status != DocumentStatus::Signed {
            return Ok(ValidateFileResponse {
                valid: false,
                reason: Some("NOT_SIGNED".to_string()),
                hash_calculated,
                title: None,
                signed_at: None,
                owner_name: None,
                signers: None,
            });
        }

        let owner_name = self.user_repo.name_of(document.owner_id).await?;
        let signers = self
            .signer_repo
            .list_by_document(&self.pool, document.id)
            .await?
            .into_iter()
            .map(|s| ValidatedSigner {
                name: s.name,
                email: s.email,
                status: s.status,
                signed_at: s.signed_at,
            })
            .collect();

        Ok(ValidateFileResponse {
            valid: true,
            reason: None,
            hash_calculated,
            title: Some(document.title),
            signed_at: Some(document.updated_at),
            owner_name,
            signers: Some(signers),
        })
    }

    // Reconfere a integridade do arquivo em disco contra o hash gravado.
    pub async fn recheck_integrity(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<bool, AppError> {
        let document = self
            .document_repo
            .find_for_tenant(tenant_id, document_id)
            .await?
            .ok_or(AppError::DocumentNotFound)?;

        let (Some(storage_key), Some(expected)) = (&document.storage_key, &document.sha256) else {
            return Ok(false);
        };

        let bytes = tokio::fs::read(self.resolve_storage_path(storage_key))
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao ler o arquivo do documento: {}", e))?;
        Ok(&sha256_hex(&bytes) == expected)
    }

    // ---
    // Pastas
    // ---

    pub async fn create_folder(
        &self,
        principal: &CurrentUser,
        name: &str,
        color: Option<&str>,
        parent_id: Option<Uuid>,
    ) -> Result<Folder, AppError> {
        if let Some(parent_id) = parent_id {
            self.document_repo
                .find_folder(principal.tenant_id, parent_id)
                .await?
                .ok_or(AppError::FolderNotFound)?;
        }
        self.document_repo
            .create_folder(
                principal.tenant_id,
                principal.id,
                parent_id,
                name,
                color.unwrap_or("#6366F1"),
            )
            .await
    }

    pub async fn list_folders(&self, tenant_id: Uuid) -> Result<Vec<Folder>, AppError> {
        self.document_repo.list_folders(tenant_id).await
    }

    // Mover pasta: o novo pai não pode ser a própria pasta nem um
    // descendente dela (sem ciclos).
    pub async fn move_folder(
        &self,
        tenant_id: Uuid,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<Folder, AppError> {
        self.document_repo
            .find_folder(tenant_id, folder_id)
            .await?
            .ok_or(AppError::FolderNotFound)?;

        if let Some(new_parent_id) = new_parent_id {
            let mut cursor = Some(new_parent_id);
            while let Some(current) = cursor {
                if current == folder_id {
                    return Err(AppError::BadRequest(
                        "Mover a pasta criaria um ciclo.".to_string(),
                    ));
                }
                cursor = self
                    .document_repo
                    .find_folder(tenant_id, current)
                    .await?
                    .ok_or(AppError::FolderNotFound)?
                    .parent_id;
            }
        }

        self.document_repo.set_folder_parent(folder_id, new_parent_id).await
    }

    pub fn resolve_storage_path(&self, storage_key: &str) -> PathBuf {
        resolve_upload_path(&self.uploads_dir, storage_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtro_de_listagem() {
        assert_eq!(
            statuses_for_filter(Some("pendentes")),
            vec![DocumentStatus::Ready, DocumentStatus::PartiallySigned]
        );
        assert_eq!(statuses_for_filter(Some("concluidos")), vec![DocumentStatus::Signed]);
        assert_eq!(
            statuses_for_filter(Some("lixeira")),
            vec![DocumentStatus::Cancelled, DocumentStatus::Expired]
        );
        // Padrão e palavras desconhecidas excluem CANCELLED.
        for filter in [None, Some("qualquer-coisa")] {
            let statuses = statuses_for_filter(filter);
            assert!(!statuses.contains(&DocumentStatus::Cancelled));
            assert!(statuses.contains(&DocumentStatus::Signed));
        }
    }

    #[test]
    fn extensao_do_nome_original() {
        assert_eq!(extension_of("contrato.pdf"), ".pdf");
        assert_eq!(extension_of("Contrato.PDF"), ".pdf");
        assert_eq!(extension_of("arquivo.tar.gz"), ".gz");
        assert_eq!(extension_of("sem-extensao"), "");
    }

    #[test]
    fn maquina_de_estados_do_documento() {
        assert!(DocumentStatus::Ready.is_pending());
        assert!(DocumentStatus::PartiallySigned.is_pending());
        assert!(!DocumentStatus::Signed.is_pending());
        assert!(DocumentStatus::Signed.is_terminal());
        assert!(DocumentStatus::Cancelled.is_terminal());
        assert!(DocumentStatus::Expired.is_terminal());
        assert!(!DocumentStatus::Draft.is_terminal());
    }
}
