// src/services/signing_service.rs
//
// Sessão do signatário (token opaco vira documento+signatário), OTP de
// assinatura e o commit transacional, incluindo o caminho do último
// signatário: carimbar o PDF, selar o documento e emitir o certificado.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        crypto::{
            mint_otp6, mint_share_token, password_hash, password_verify, sha256_hex,
            short_code_from_signature_hash,
        },
        error::AppError,
    },
    db::{
        DocumentRepository, OtpRepository, SettingsRepository, SignerRepository, UserRepository,
    },
    models::{
        audit::{actions, ActorKind, EntityType, NewAuditEvent},
        auth::{AuthChannel, OtpContext},
        documents::{Document, DocumentStatus},
        signers::{
            CommitResponse, InviteSignersPayload, ShareToken, Signer, SignerSessionSummary,
            SignerStatus,
        },
    },
    middleware::auth::CurrentUser,
    services::{
        audit_service::AuditService,
        document_service::resolve_upload_path,
        notification_service::{
            apply_email_template, mask_recipient, NotificationService,
            DEFAULT_FINAL_EMAIL_TEMPLATE,
        },
        pdf_service::{SignatureStamper, StampInfo},
    },
};

const SIGNING_OTP_TTL_MINUTES: i64 = 10;
const SHARE_TOKEN_TTL_DAYS: i64 = 30;

// O contexto autenticado de um signatário, resolvido a partir do token
// bruto da URL e injetado na requisição pelo middleware.
#[derive(Debug, Clone)]
pub struct SignerSession {
    pub document: Document,
    pub signer: Signer,
    pub token: ShareToken,
}

// Chave de storage do artefato carimbado: "uploads/t/doc.pdf" vira
// "uploads/t/doc-signed.pdf".
pub fn signed_storage_key(storage_key: &str) -> String {
    match storage_key.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-signed.{}", stem, ext),
        _ => format!("{}-signed", storage_key),
    }
}

// Aceita tanto o PNG puro em base64 quanto o data-URL do canvas.
pub fn decode_signature_image(payload: &str) -> Result<Vec<u8>, AppError> {
    let raw = match payload.split_once(";base64,") {
        Some((_, data)) => data,
        None => payload,
    };
    BASE64_STANDARD
        .decode(raw.trim())
        .map_err(|_| AppError::BadRequest("Imagem da assinatura inválida.".to_string()))
}

#[derive(Clone)]
pub struct SigningService {
    document_repo: DocumentRepository,
    signer_repo: SignerRepository,
    otp_repo: OtpRepository,
    user_repo: UserRepository,
    settings_repo: SettingsRepository,
    audit_service: AuditService,
    notification_service: NotificationService,
    stamper: SignatureStamper,
    uploads_dir: std::path::PathBuf,
    front_url: String,
    pool: sqlx::PgPool,
}

impl SigningService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_repo: DocumentRepository,
        signer_repo: SignerRepository,
        otp_repo: OtpRepository,
        user_repo: UserRepository,
        settings_repo: SettingsRepository,
        audit_service: AuditService,
        notification_service: NotificationService,
        stamper: SignatureStamper,
        uploads_dir: std::path::PathBuf,
        front_url: String,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            document_repo,
            signer_repo,
            otp_repo,
            user_repo,
            settings_repo,
            audit_service,
            notification_service,
            stamper,
            uploads_dir,
            front_url,
            pool,
        }
    }

    // ---
    // Convite de signatários (operação do dono do documento).
    // ---
    pub async fn invite_signers(
        &self,
        principal: &CurrentUser,
        document_id: Uuid,
        payload: &InviteSignersPayload,
    ) -> Result<Vec<Signer>, AppError> {
        let document = self
            .document_repo
            .find_for_tenant(principal.tenant_id, document_id)
            .await?
            .ok_or(AppError::DocumentNotFound)?;

        if !document.status.is_pending() {
            return Err(AppError::InvalidDocumentState);
        }

        let expires_at = document
            .deadline_at
            .unwrap_or_else(|| Utc::now() + Duration::days(SHARE_TOKEN_TTL_DAYS));

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(payload.signers.len());
        let mut links = Vec::with_capacity(payload.signers.len());

        for input in &payload.signers {
            let channels = input
                .auth_channels
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| vec![AuthChannel::Email]);

            let position = match (input.position_x, input.position_y, input.position_page) {
                (Some(x), Some(y), Some(page)) => Some((x, y, page)),
                _ => None,
            };

            let signer = self
                .signer_repo
                .insert(
                    &mut *tx,
                    document.id,
                    &input.name,
                    &input.email,
                    input.cpf.as_deref(),
                    input.phone.as_deref(),
                    input.qualification.as_deref(),
                    &channels,
                    input.sign_order.unwrap_or(0),
                    position,
                )
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
                        action: actions::SIGNER_ADDED,
                        ip: None,
                        user_agent: None,
                        payload: Some(json!({
                            "signerId": signer.id,
                            "email": mask_recipient(&signer.email),
                        })),
                    },
                )
                .await?;

            // Token opaco: o valor bruto sai UMA vez, pelo canal do convite.
            let (raw_token, token_hash) = mint_share_token();
            self.signer_repo
                .insert_token(&mut *tx, document.id, signer.id, &token_hash, expires_at)
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
                        action: actions::TOKEN_CREATED,
                        ip: None,
                        user_agent: None,
                        payload: Some(json!({
                            "signerId": signer.id,
                            "expiresAt": expires_at.to_rfc3339(),
                        })),
                    },
                )
                .await?;

            links.push((signer.clone(), raw_token, channels));
            created.push(signer);
        }

        tx.commit().await?;

        // Entrega dos links fora da transação, melhor esforço por canal.
        let notifier = self.notification_service.clone();
        let front_url = self.front_url.clone();
        let tenant_id = principal.tenant_id;
        let document_title = document.title.clone();
        let invite_message = payload.message.clone();
        tokio::spawn(async move {
            for (signer, raw_token, channels) in links {
                let link = format!("{}/sign/{}", front_url, raw_token);
                for channel in channels {
                    let result = match channel {
                        AuthChannel::Email => {
                            let html = format!(
                                "<p>Olá, {}!</p>\
                                 <p>Você foi convidado a assinar o documento <b>{}</b>.</p>\
                                 {}<p><a href=\"{}\">Assinar documento</a></p>",
                                signer.name,
                                document_title,
                                invite_message
                                    .as_deref()
                                    .map(|m| format!("<p>{}</p>", m))
                                    .unwrap_or_default(),
                                link
                            );
                            notifier
                                .send_email(
                                    tenant_id,
                                    &signer.email,
                                    &format!("Assinatura pendente: {}", document_title),
                                    &html,
                                )
                                .await
                        }
                        AuthChannel::Whatsapp | AuthChannel::Sms => {
                            let Some(phone) = signer.phone_e164.as_deref() else {
                                tracing::warn!(
                                    "Signatário {} sem telefone; canal ignorado",
                                    signer.id
                                );
                                continue;
                            };
                            let text = format!(
                                "Olá, {}! Você foi convidado a assinar o documento \"{}\". Acesse: {}",
                                signer.name, document_title, link
                            );
                            notifier.send_whatsapp_text(tenant_id, phone, &text).await
                        }
                    };
                    if let Err(e) = result {
                        tracing::warn!("Falha ao entregar convite de assinatura: {:?}", e);
                    }
                }
            }
        });

        Ok(created)
    }

    // ---
    // Resolução do token bruto (middleware da rota /sign).
    // ---
    pub async fn resolve_token(&self, raw_token: &str) -> Result<SignerSession, AppError> {
        let token_hash = sha256_hex(raw_token.as_bytes());

        let token = self
            .signer_repo
            .find_token_by_hash(&token_hash)
            .await?
            .ok_or(AppError::InvalidLink)?;

        if Utc::now() > token.expires_at {
            return Err(AppError::ExpiredLink);
        }

        let signer = self
            .signer_repo
            .find_by_id(token.signer_id)
            .await?
            .ok_or(AppError::InvalidLink)?;
        if matches!(signer.status, SignerStatus::Signed | SignerStatus::Declined) {
            return Err(AppError::LinkClosed);
        }

        let document = self
            .document_repo
            .find_by_id(token.document_id)
            .await?
            .ok_or(AppError::InvalidLink)?;
        if matches!(
            document.status,
            DocumentStatus::Cancelled | DocumentStatus::Expired | DocumentStatus::Signed
        ) {
            return Err(AppError::LinkClosed);
        }

        Ok(SignerSession {
            document,
            signer,
            token,
        })
    }

    // Primeira visualização: PENDING vira VIEWED, com auditoria.
    pub async fn summary(
        &self,
        session: &SignerSession,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<SignerSessionSummary, AppError> {
        self.signer_repo.touch_token(session.token.id).await?;

        let mut signer_status = session.signer.status;
        if signer_status == SignerStatus::Pending {
            let mut tx = self.pool.begin().await?;
            self.signer_repo.mark_viewed(&mut *tx, session.signer.id).await?;
            self.audit_service
                .append_event(
                    &mut *tx,
                    NewAuditEvent {
                        tenant_id: session.document.tenant_id,
                        actor_kind: ActorKind::Signer,
                        actor_id: Some(session.signer.id),
                        entity_type: EntityType::Document,
                        entity_id: session.document.id,
                        action: actions::VIEWED,
                        ip,
                        user_agent,
                        payload: None,
                    },
                )
                .await?;
            tx.commit().await?;
            signer_status = SignerStatus::Viewed;
        }

        Ok(SignerSessionSummary {
            document_id: session.document.id,
            document_title: session.document.title.clone(),
            document_status: session.document.status,
            signer_id: session.signer.id,
            signer_name: session.signer.name.clone(),
            signer_status,
            auth_channels: session.signer.auth_channels.clone(),
            deadline_at: session.document.deadline_at,
        })
    }

    pub async fn identify(
        &self,
        session: &SignerSession,
        cpf: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Signer, AppError> {
        self.signer_repo
            .update_identity(session.signer.id, cpf, phone)
            .await
    }

    pub async fn save_position(
        &self,
        session: &SignerSession,
        x: f32,
        y: f32,
        page: i32,
    ) -> Result<Signer, AppError> {
        self.signer_repo
            .update_position(session.signer.id, x, y, page)
            .await
    }

    // ---
    // OTP de assinatura: um código por canal habilitado do signatário.
    // ---
    pub async fn start_otp(
        &self,
        session: &SignerSession,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AppError> {
        let channels = if session.signer.auth_channels.is_empty() {
            vec![AuthChannel::Email]
        } else {
            session.signer.auth_channels.clone()
        };

        for channel in channels {
            let recipient = match channel {
                AuthChannel::Email => session.signer.email.clone(),
                AuthChannel::Sms | AuthChannel::Whatsapp => session
                    .signer
                    .phone_e164
                    .clone()
                    .ok_or(AppError::MissingPhone)?,
            };

            let otp = mint_otp6();
            let code_hash = password_hash(&otp).await?;
            self.otp_repo
                .create(
                    &recipient,
                    channel,
                    &code_hash,
                    Utc::now() + Duration::minutes(SIGNING_OTP_TTL_MINUTES),
                    OtpContext::Signing,
                )
                .await?;

            // Entrega fire-and-forget: erro de canal não desfaz o OTP.
            let notifier = self.notification_service.clone();
            let tenant_id = session.document.tenant_id;
            let signer_name = session.signer.name.clone();
            let to = recipient.clone();
            tokio::spawn(async move {
                let body = format!(
                    "Olá, {}! Seu código de assinatura é: {}. Ele vale por {} minutos.",
                    signer_name, otp, SIGNING_OTP_TTL_MINUTES
                );
                let result = match channel {
                    AuthChannel::Email => {
                        notifier
                            .send_email(tenant_id, &to, "Código de assinatura", &body)
                            .await
                    }
                    AuthChannel::Sms | AuthChannel::Whatsapp => {
                        notifier.send_whatsapp_text(tenant_id, &to, &body).await
                    }
                };
                if let Err(e) = result {
                    tracing::warn!("Falha ao entregar OTP de assinatura: {:?}", e);
                }
            });

            let mut tx = self.pool.begin().await?;
            self.audit_service
                .append_event(
                    &mut *tx,
                    NewAuditEvent {
                        tenant_id: session.document.tenant_id,
                        actor_kind: ActorKind::Signer,
                        actor_id: Some(session.signer.id),
                        entity_type: EntityType::Document,
                        entity_id: session.document.id,
                        action: actions::OTP_SENT,
                        ip: ip.clone(),
                        user_agent: user_agent.clone(),
                        payload: Some(json!({
                            "channel": channel,
                            "recipient": mask_recipient(&recipient),
                        })),
                    },
                )
                .await?;
            tx.commit().await?;
        }

        Ok(())
    }

    pub async fn verify_otp(
        &self,
        session: &SignerSession,
        submitted: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AppError> {
        let mut recipients = vec![session.signer.email.clone()];
        if let Some(phone) = &session.signer.phone_e164 {
            recipients.push(phone.clone());
        }

        let code = self
            .otp_repo
            .latest_for_recipients(OtpContext::Signing, &recipients)
            .await?;

        let code = match code {
            Some(code) if code.expires_at >= Utc::now() => code,
            _ => {
                self.append_otp_failed(session, "expired", ip, user_agent).await?;
                return Err(AppError::OtpExpired);
            }
        };

        if !password_verify(submitted, &code.code_hash).await? {
            self.otp_repo.increment_attempts(code.id).await?;
            self.append_otp_failed(session, "mismatch", ip, user_agent).await?;
            return Err(AppError::OtpInvalid);
        }

        // Sucesso: auditoria e destruição do código na mesma transação
        // (prevenção de replay).
        let mut tx = self.pool.begin().await?;
        self.otp_repo.delete(&mut *tx, code.id).await?;
        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: session.document.tenant_id,
                    actor_kind: ActorKind::Signer,
                    actor_id: Some(session.signer.id),
                    entity_type: EntityType::Document,
                    entity_id: session.document.id,
                    action: actions::OTP_VERIFIED,
                    ip,
                    user_agent,
                    payload: None,
                },
            )
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn append_otp_failed(
        &self,
        session: &SignerSession,
        reason: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: session.document.tenant_id,
                    actor_kind: ActorKind::Signer,
                    actor_id: Some(session.signer.id),
                    entity_type: EntityType::Document,
                    entity_id: session.document.id,
                    action: actions::OTP_FAILED,
                    ip,
                    user_agent,
                    payload: Some(json!({ "reason": reason })),
                },
            )
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---
    // O commit do signatário. Tudo de banco numa transação; a linha do
    // documento é travada logo na entrada, então dois "últimos commits"
    // concorrentes colapsam em uma única finalização.
    // ---
    pub async fn commit(
        &self,
        session: &SignerSession,
        client_fingerprint: &str,
        signature_image_base64: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<CommitResponse, AppError> {
        if !session.signer.status.can_sign() {
            return Err(AppError::LinkClosed);
        }

        let png_bytes = decode_signature_image(signature_image_base64)?;

        let mut tx = self.pool.begin().await?;

        let document = self
            .document_repo
            .lock_for_update(&mut *tx, session.document.id)
            .await?;
        if !document.status.is_pending() {
            return Err(AppError::LinkClosed);
        }
        let document_sha256 = document
            .sha256
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Documento pendente sem sha256"))?;

        let signed_at = Utc::now();
        let timestamp = signed_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let signature_hash = sha256_hex(
            format!(
                "{}{}{}{}",
                document_sha256, session.signer.id, timestamp, client_fingerprint
            )
            .as_bytes(),
        );
        let short_code = short_code_from_signature_hash(&signature_hash);
        let signature_uuid = Uuid::new_v4();

        // Persiste a arte da assinatura. Escrita fora da transação, mas já
        // validada; em caso de rollback o PNG órfão é inofensivo.
        let artefact_key = format!(
            "uploads/{}/signatures/{}.png",
            document.tenant_id, session.signer.id
        );
        let artefact_path = resolve_upload_path(&self.uploads_dir, &artefact_key);
        if let Some(parent) = artefact_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("Falha ao criar diretório de assinaturas: {}", e))?;
        }
        tokio::fs::write(&artefact_path, &png_bytes)
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao gravar a imagem da assinatura: {}", e))?;

        // De dois commits concorrentes do MESMO signatário, só um vence.
        let ip_text = ip.clone().unwrap_or_else(|| "desconhecido".to_string());
        self.signer_repo
            .mark_signed(
                &mut *tx,
                session.signer.id,
                signed_at,
                &ip_text,
                signature_uuid,
                &signature_hash,
                &artefact_key,
            )
            .await?
            .ok_or(AppError::LinkClosed)?;

        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: document.tenant_id,
                    actor_kind: ActorKind::Signer,
                    actor_id: Some(session.signer.id),
                    entity_type: EntityType::Document,
                    entity_id: document.id,
                    action: actions::SIGNED,
                    ip: ip.clone(),
                    user_agent: user_agent.clone(),
                    payload: Some(json!({
                        "signatureHash": signature_hash,
                        "artefactPath": artefact_key,
                        "shortCode": short_code,
                        "clientFingerprint": client_fingerprint,
                        "ip": ip_text,
                    })),
                },
            )
            .await?;

        // Relê os signatários DENTRO da transação para decidir o fechamento.
        let signers = self
            .signer_repo
            .list_by_document(&mut *tx, document.id)
            .await?;

        if !SignerRepository::all_signed(&signers) {
            if document.status == DocumentStatus::Ready {
                self.document_repo
                    .update_status(&mut *tx, document.id, DocumentStatus::PartiallySigned)
                    .await?;
            }
            tx.commit().await?;
            return Ok(CommitResponse {
                short_code,
                signature_hash,
                is_complete: false,
            });
        }

        // --- Fechamento: todos assinaram. ---
        let document = self
            .finalize(&mut tx, &document, &signers, &timestamp, ip, user_agent)
            .await?;
        tx.commit().await?;

        self.fan_out_completion(&document, &signers);

        Ok(CommitResponse {
            short_code,
            signature_hash,
            is_complete: true,
        })
    }

    // Carimba o PDF, sela o documento e emite o certificado. Roda dentro da
    // transação do commit; o chamador já detém a trava da linha.
    async fn finalize(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        document: &Document,
        signers: &[Signer],
        timestamp: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Document, AppError> {
        let storage_key = document
            .storage_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Documento sem arquivo persistido"))?;
        let original_sha = document
            .sha256
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Documento sem sha256"))?;

        let original_bytes = tokio::fs::read(resolve_upload_path(&self.uploads_dir, &storage_key))
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao ler o PDF original: {}", e))?;

        let info = StampInfo {
            document_id: document.id,
            title: document.title.clone(),
            sha256: original_sha,
            validation_url: format!("{}/validar?documento={}", self.front_url, document.id),
        };

        // Render e merge são CPU puro; saem do executor.
        let stamper = self.stamper.clone();
        let signers_for_stamp = signers.to_vec();
        let stamped = tokio::task::spawn_blocking(move || {
            stamper.embed_signatures(&original_bytes, &signers_for_stamp, &info)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de carimbo: {}", e))??;

        let new_key = signed_storage_key(&storage_key);
        let new_path = resolve_upload_path(&self.uploads_dir, &new_key);
        tokio::fs::write(&new_path, &stamped)
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao gravar o PDF carimbado: {}", e))?;

        let new_sha256 = sha256_hex(&stamped);

        let sealed = self
            .document_repo
            .seal_signed(&mut **tx, document.id, &new_key, &new_sha256)
            .await?;

        self.audit_service
            .append_event(
                &mut **tx,
                NewAuditEvent {
                    tenant_id: document.tenant_id,
                    actor_kind: ActorKind::System,
                    actor_id: None,
                    entity_type: EntityType::Document,
                    entity_id: document.id,
                    action: actions::STATUS_CHANGED,
                    ip: ip.clone(),
                    user_agent: user_agent.clone(),
                    payload: Some(json!({
                        "newStatus": DocumentStatus::Signed,
                        "newSha256": new_sha256,
                    })),
                },
            )
            .await?;

        // Certificado: linha única por documento, com hash de rastreio.
        let issued_at = Utc::now();
        let certificate_sha =
            sha256_hex(format!("CERT-{}{}", document.id, timestamp).as_bytes());
        self.signer_repo
            .insert_certificate(
                &mut **tx,
                document.id,
                &format!("certificates/{}.pdf", document.id),
                &certificate_sha,
                issued_at,
            )
            .await?;

        self.audit_service
            .append_event(
                &mut **tx,
                NewAuditEvent {
                    tenant_id: document.tenant_id,
                    actor_kind: ActorKind::System,
                    actor_id: None,
                    entity_type: EntityType::Document,
                    entity_id: document.id,
                    action: actions::CERTIFICATE_ISSUED,
                    ip,
                    user_agent,
                    payload: Some(json!({ "sha256": certificate_sha })),
                },
            )
            .await?;

        tracing::info!("✅ Documento {} selado; novo sha256 {}", document.id, new_sha256);
        Ok(sealed)
    }

    // Fan-out de conclusão para o dono e para todos os signatários.
    // Pós-commit, melhor esforço: falha de entrega só gera log.
    fn fan_out_completion(&self, document: &Document, signers: &[Signer]) {
        let notifier = self.notification_service.clone();
        let settings_repo = self.settings_repo.clone();
        let user_repo = self.user_repo.clone();
        let document = document.clone();
        let signers = signers.to_vec();
        let doc_link = format!("{}/validar?documento={}", self.front_url, document.id);

        tokio::spawn(async move {
            let template = match settings_repo.get(document.tenant_id).await {
                Ok(settings) => settings
                    .final_email_template
                    .unwrap_or_else(|| DEFAULT_FINAL_EMAIL_TEMPLATE.to_string()),
                Err(e) => {
                    tracing::warn!("Falha ao carregar template do tenant: {:?}", e);
                    DEFAULT_FINAL_EMAIL_TEMPLATE.to_string()
                }
            };

            let mut recipients: Vec<(String, String)> = signers
                .iter()
                .map(|s| (s.name.clone(), s.email.clone()))
                .collect();
            match user_repo.find_by_id(document.owner_id).await {
                Ok(Some(owner)) => recipients.push((owner.name, owner.email)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Falha ao resolver dono do documento: {:?}", e),
            }

            for (name, email) in recipients {
                let html = apply_email_template(
                    &template,
                    &name,
                    &document.title,
                    &doc_link,
                    &document.id.to_string(),
                );
                if let Err(e) = notifier
                    .send_email(
                        document.tenant_id,
                        &email,
                        &format!("Documento concluído: {}", document.title),
                        &html,
                    )
                    .await
                {
                    tracing::warn!("Falha no e-mail de conclusão para {}: {:?}", mask_recipient(&email), e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chave_do_artefato_carimbado() {
        assert_eq!(
            signed_storage_key("uploads/t1/doc.pdf"),
            "uploads/t1/doc-signed.pdf"
        );
        assert_eq!(signed_storage_key("uploads/t1/doc"), "uploads/t1/doc-signed");
    }

    #[test]
    fn decodifica_data_url_e_base64_puro() {
        let png = [0x89u8, b'P', b'N', b'G'];
        let b64 = BASE64_STANDARD.encode(png);

        assert_eq!(decode_signature_image(&b64).unwrap(), png);
        assert_eq!(
            decode_signature_image(&format!("data:image/png;base64,{}", b64)).unwrap(),
            png
        );
        assert!(decode_signature_image("not-base64!!!").is_err());
    }
}
