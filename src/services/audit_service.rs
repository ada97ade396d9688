// src/services/audit_service.rs
//
// Trilha de auditoria encadeada por hash, com escopo POR ENTIDADE: cada
// entity_id tem sua própria corrente. O hash de um evento cobre o hash do
// anterior, os campos canônicos e o instante de criação; qualquer linha
// alterada, reordenada ou removida quebra a recomputação.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::{crypto::sha256_hex, error::AppError},
    db::AuditRepository,
    models::audit::{AuditLog, ChainVerification, NewAuditEvent},
};

const GENESIS_SEED: &[u8] = b"genesis_block_for_entity";

// Dicionário canônico com ordem fixa de chaves: os campos do envelope na
// ordem de declaração, seguidos das chaves do payload (ordenadas pelo
// serde_json). Append e verificação usam exatamente a mesma serialização.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashEnvelope<'a> {
    actor_kind: &'a str,
    actor_id: Option<Uuid>,
    entity_type: &'a str,
    entity_id: Uuid,
    action: &'a str,
    ip: Option<&'a str>,
    user_agent: Option<&'a str>,
    #[serde(flatten)]
    payload: Option<&'a serde_json::Value>,
}

pub fn genesis_hash() -> String {
    sha256_hex(GENESIS_SEED)
}

// O Postgres guarda `timestamptz` com precisão de microssegundo. Truncamos
// ANTES de calcular o hash para que a verificação, relendo a coluna,
// recomponha exatamente a mesma string de instante.
fn truncate_to_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    let micros = t.timestamp_subsec_micros();
    t.with_nanosecond(micros * 1000).unwrap_or(t)
}

#[allow(clippy::too_many_arguments)]
fn compute_event_hash(
    prev_event_hash: &str,
    actor_kind: &str,
    actor_id: Option<Uuid>,
    entity_type: &str,
    entity_id: Uuid,
    action: &str,
    ip: Option<&str>,
    user_agent: Option<&str>,
    payload: Option<&serde_json::Value>,
    created_at: &DateTime<Utc>,
) -> Result<String, AppError> {
    let envelope = HashEnvelope {
        actor_kind,
        actor_id,
        entity_type,
        entity_id,
        action,
        ip,
        user_agent,
        payload,
    };
    let serialized = serde_json::to_string(&envelope)
        .map_err(|e| anyhow::anyhow!("Falha ao serializar envelope de auditoria: {}", e))?;
    let instant = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    Ok(sha256_hex(
        format!("{}{}{}", prev_event_hash, serialized, instant).as_bytes(),
    ))
}

#[derive(Clone)]
pub struct AuditService {
    audit_repo: AuditRepository,
}

impl AuditService {
    pub fn new(audit_repo: AuditRepository) -> Self {
        Self { audit_repo }
    }

    /// Anexa um evento à corrente da entidade, DENTRO da transação do
    /// chamador: o evento só existe se a transação commitar.
    pub async fn append_event(
        &self,
        conn: &mut PgConnection,
        event: NewAuditEvent,
    ) -> Result<AuditLog, AppError> {
        // Serializa appends paralelos para a mesma entidade.
        self.audit_repo
            .acquire_entity_lock(&mut *conn, event.entity_id)
            .await?;

        let prev = self
            .audit_repo
            .last_event_hash(&mut *conn, event.entity_id)
            .await?
            .unwrap_or_else(genesis_hash);

        let created_at = truncate_to_micros(Utc::now());
        let event_hash = compute_event_hash(
            &prev,
            event.actor_kind.as_str(),
            event.actor_id,
            event.entity_type.as_str(),
            event.entity_id,
            event.action,
            event.ip.as_deref(),
            event.user_agent.as_deref(),
            event.payload.as_ref(),
            &created_at,
        )?;

        self.audit_repo
            .insert(
                &mut *conn,
                event.tenant_id,
                event.actor_kind,
                event.actor_id,
                event.entity_type,
                event.entity_id,
                event.action,
                event.ip.as_deref(),
                event.user_agent.as_deref(),
                event.payload.as_ref(),
                &prev,
                &event_hash,
                created_at,
            )
            .await
    }

    /// Reconstrói e confere as correntes de um documento e de seus
    /// signatários. Eventos são agrupados por entity_id (cada entidade tem
    /// corrente própria) e cada corrente é percorrida elo a elo.
    pub async fn verify_chain_for_document(
        &self,
        document_id: Uuid,
        signer_ids: &[Uuid],
    ) -> Result<ChainVerification, AppError> {
        let events = self
            .audit_repo
            .list_for_document_chain(document_id, signer_ids)
            .await?;
        Ok(verify_rows(&events))
    }

    pub async fn list_for_document(
        &self,
        document_id: Uuid,
        signer_ids: &[Uuid],
    ) -> Result<Vec<AuditLog>, AppError> {
        self.audit_repo
            .list_for_document_chain(document_id, signer_ids)
            .await
    }
}

// Verificação pura sobre linhas em memória. Na primeira divergência,
// devolve o evento quebrado e o motivo.
pub fn verify_rows(events: &[AuditLog]) -> ChainVerification {
    // Agrupa preservando a ordem (created_at, seq) da consulta.
    let mut chains: Vec<(Uuid, Vec<&AuditLog>)> = Vec::new();
    for event in events {
        match chains.iter_mut().find(|(id, _)| *id == event.entity_id) {
            Some((_, chain)) => chain.push(event),
            None => chains.push((event.entity_id, vec![event])),
        }
    }

    for (_, chain) in &chains {
        for (i, event) in chain.iter().enumerate() {
            // Elo com o anterior (o primeiro da corrente não tem elo).
            if i > 0 && event.prev_event_hash != chain[i - 1].event_hash {
                return ChainVerification {
                    is_valid: false,
                    count: events.len(),
                    broken_event_id: Some(event.id),
                    reason: Some("Broken Link".to_string()),
                };
            }

            // Recomputação do hash a partir dos campos gravados.
            let recomputed = compute_event_hash(
                &event.prev_event_hash,
                event.actor_kind.as_str(),
                event.actor_id,
                event.entity_type.as_str(),
                event.entity_id,
                &event.action,
                event.ip.as_deref(),
                event.user_agent.as_deref(),
                event.payload_json.as_ref(),
                &event.created_at,
            );
            match recomputed {
                Ok(hash) if hash == event.event_hash => {}
                _ => {
                    return ChainVerification {
                        is_valid: false,
                        count: events.len(),
                        broken_event_id: Some(event.id),
                        reason: Some("Hash Mismatch".to_string()),
                    };
                }
            }
        }
    }

    ChainVerification {
        is_valid: true,
        count: events.len(),
        broken_event_id: None,
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::{actions, ActorKind, EntityType};
    use serde_json::json;

    // Monta uma corrente válida em memória, do jeito que append_event faria.
    fn build_chain(entity_id: Uuid, n: usize) -> Vec<AuditLog> {
        let tenant_id = Uuid::new_v4();
        let mut prev = genesis_hash();
        let mut out = Vec::new();
        for i in 0..n {
            let created_at = truncate_to_micros(Utc::now());
            let payload = json!({ "indice": i.to_string() });
            let event_hash = compute_event_hash(
                &prev,
                ActorKind::User.as_str(),
                None,
                EntityType::Document.as_str(),
                entity_id,
                actions::STATUS_CHANGED,
                Some("127.0.0.1"),
                None,
                Some(&payload),
                &created_at,
            )
            .unwrap();

            out.push(AuditLog {
                id: Uuid::new_v4(),
                seq: i as i64,
                tenant_id,
                actor_kind: ActorKind::User,
                actor_id: None,
                entity_type: EntityType::Document,
                entity_id,
                action: actions::STATUS_CHANGED.to_string(),
                ip: Some("127.0.0.1".to_string()),
                user_agent: None,
                payload_json: Some(payload),
                prev_event_hash: prev.clone(),
                event_hash: event_hash.clone(),
                created_at,
            });
            prev = event_hash;
        }
        out
    }

    #[test]
    fn corrente_integra_passa() {
        let chain = build_chain(Uuid::new_v4(), 5);
        let result = verify_rows(&chain);
        assert!(result.is_valid);
        assert_eq!(result.count, 5);
    }

    #[test]
    fn corrente_vazia_e_valida() {
        let result = verify_rows(&[]);
        assert!(result.is_valid);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn payload_adulterado_e_detectado() {
        let mut chain = build_chain(Uuid::new_v4(), 4);
        chain[2].payload_json = Some(json!({ "indice": "999", "action": "DOWNLOADED" }));
        let result = verify_rows(&chain);
        assert!(!result.is_valid);
        assert_eq!(result.broken_event_id, Some(chain[2].id));
        assert_eq!(result.reason.as_deref(), Some("Hash Mismatch"));
    }

    #[test]
    fn elo_removido_e_detectado() {
        let mut chain = build_chain(Uuid::new_v4(), 4);
        chain.remove(1);
        let result = verify_rows(&chain);
        assert!(!result.is_valid);
        assert_eq!(result.reason.as_deref(), Some("Broken Link"));
    }

    #[test]
    fn reordenacao_e_detectada() {
        let mut chain = build_chain(Uuid::new_v4(), 4);
        chain.swap(1, 2);
        let result = verify_rows(&chain);
        assert!(!result.is_valid);
        assert_eq!(result.reason.as_deref(), Some("Broken Link"));
    }

    #[test]
    fn hash_e_sensivel_a_cada_campo() {
        let entity_id = Uuid::new_v4();
        let created_at = truncate_to_micros(Utc::now());
        let base = |ip: Option<&str>, action: &str| {
            compute_event_hash(
                &genesis_hash(),
                ActorKind::Signer.as_str(),
                None,
                EntityType::Document.as_str(),
                entity_id,
                action,
                ip,
                None,
                None,
                &created_at,
            )
            .unwrap()
        };

        let reference = base(Some("10.0.0.1"), actions::VIEWED);
        assert_eq!(reference, base(Some("10.0.0.1"), actions::VIEWED));
        assert_ne!(reference, base(Some("10.0.0.2"), actions::VIEWED));
        assert_ne!(reference, base(Some("10.0.0.1"), actions::SIGNED));
        assert_ne!(reference, base(None, actions::VIEWED));
    }

    #[test]
    fn correntes_de_entidades_distintas_sao_independentes() {
        let mut all = build_chain(Uuid::new_v4(), 3);
        all.extend(build_chain(Uuid::new_v4(), 2));
        let result = verify_rows(&all);
        assert!(result.is_valid);
        assert_eq!(result.count, 5);
    }

    #[test]
    fn genesis_e_estavel() {
        assert_eq!(genesis_hash(), genesis_hash());
        assert_eq!(genesis_hash().len(), 64);
    }

    #[test]
    fn truncamento_de_microssegundos_e_idempotente() {
        let t = truncate_to_micros(Utc::now());
        assert_eq!(t, truncate_to_micros(t));
        assert_eq!(t.timestamp_subsec_nanos() % 1000, 0);
    }
}
