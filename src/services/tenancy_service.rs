// src/services/tenancy_service.rs

use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{crypto::password_hash, error::AppError},
    db::{TenantRepository, UserRepository},
    models::{
        audit::{actions, ActorKind, EntityType, NewAuditEvent},
        auth::{UserPublic, UserRole},
        tenancy::{MemberStatus, MyTenantResponse, Tenant, TenantMember, TenantSummary},
    },
    services::{
        audit_service::AuditService, notification_service::NotificationService,
        quota_service::QuotaService,
    },
};

// Slug URL-safe derivado do nome: minúsculas, blocos não alfanuméricos
// colapsados em '-'.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut previous_dash = true; // suprime '-' inicial
    for c in name.chars() {
        let c = match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            previous_dash = false;
        } else if !previous_dash {
            slug.push('-');
            previous_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("workspace");
    }
    slug
}

// Em colisão, anexa um sufixo aleatório de 4 caracteres. A constraint
// UNIQUE do banco continua sendo a garantia final contra a corrida.
pub async fn unique_slug(repo: &TenantRepository, name: &str) -> Result<String, AppError> {
    let base = slugify(name);
    if !repo.slug_exists(&base).await? {
        return Ok(base);
    }
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    Ok(format!("{}-{}", base, suffix))
}

#[derive(Clone)]
pub struct TenantService {
    tenant_repo: TenantRepository,
    user_repo: UserRepository,
    quota_service: QuotaService,
    audit_service: AuditService,
    notification_service: NotificationService,
    front_url: String,
    pool: sqlx::PgPool,
}

impl TenantService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_repo: TenantRepository,
        user_repo: UserRepository,
        quota_service: QuotaService,
        audit_service: AuditService,
        notification_service: NotificationService,
        front_url: String,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            tenant_repo,
            user_repo,
            quota_service,
            audit_service,
            notification_service,
            front_url,
            pool,
        }
    }

    // ---
    // Criação de workspace com administrador (operação de super-admin).
    // ---
    pub async fn create_tenant_with_admin(
        &self,
        name: &str,
        admin_name: &str,
        admin_email: &str,
        admin_password: &str,
    ) -> Result<(Tenant, UserPublic), AppError> {
        let hashed_password = password_hash(admin_password).await?;
        let slug = unique_slug(&self.tenant_repo, name).await?;
        let plan = self
            .tenant_repo
            .find_plan_by_slug("basico")
            .await?
            .ok_or(AppError::PlanNotFound)?;

        let mut tx = self.pool.begin().await?;

        let tenant = self
            .tenant_repo
            .create_tenant(&mut *tx, name, &slug, plan.id)
            .await?;

        let admin = self
            .user_repo
            .create_user(
                &mut *tx,
                tenant.id,
                admin_name,
                admin_email,
                &hashed_password,
                None,
                None,
                UserRole::Admin,
            )
            .await?;

        self.tenant_repo
            .add_active_member(&mut *tx, tenant.id, admin.id, admin_email, UserRole::Admin)
            .await?;

        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: tenant.id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(admin.id),
                    entity_type: EntityType::Tenant,
                    entity_id: tenant.id,
                    action: actions::TENANT_CREATED,
                    ip: None,
                    user_agent: None,
                    payload: Some(json!({ "slug": slug })),
                },
            )
            .await?;

        tx.commit().await?;

        Ok((tenant, admin.into()))
    }

    // ---
    // Seletor de workspaces: o pessoal + memberships ATIVOS.
    // ---
    pub async fn list_user_tenants(&self, user_id: Uuid) -> Result<Vec<TenantSummary>, AppError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let personal = self
            .tenant_repo
            .find_by_id(user.tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)?;

        let mut out = vec![TenantSummary {
            tenant_id: personal.id,
            name: personal.name,
            role: UserRole::Admin,
            is_personal: true,
        }];

        for (member, tenant_name) in self.tenant_repo.list_active_memberships(user_id).await? {
            // O tenant pessoal já entrou na lista.
            if member.tenant_id == user.tenant_id {
                continue;
            }
            out.push(TenantSummary {
                tenant_id: member.tenant_id,
                name: tenant_name,
                role: member.role,
                is_personal: false,
            });
        }

        Ok(out)
    }

    // Detalhe do tenant ativo com plano e ocupação (para a tela de conta).
    pub async fn my_tenant(&self, tenant_id: Uuid) -> Result<MyTenantResponse, AppError> {
        let tenant = self
            .tenant_repo
            .find_by_id(tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)?;
        let plan = self
            .tenant_repo
            .find_plan_by_id(tenant.plan_id)
            .await?
            .ok_or(AppError::PlanNotFound)?;

        let (users_in_use, documents_in_use) =
            self.quota_service.current_usage(tenant_id).await?;

        Ok(MyTenantResponse {
            tenant,
            plan,
            users_in_use,
            documents_in_use,
        })
    }

    // ---
    // Convites
    // ---
    pub async fn invite_member(
        &self,
        principal: &crate::middleware::auth::CurrentUser,
        email: &str,
        role: UserRole,
    ) -> Result<TenantMember, AppError> {
        let current_tenant_id = principal.tenant_id;
        let actor_id = principal.id;
        // Papel de membro nunca é SUPER_ADMIN nem USER.
        if !matches!(role, UserRole::Admin | UserRole::Manager | UserRole::Viewer) {
            return Err(AppError::BadRequest(
                "Papel de convite inválido. Use ADMIN, MANAGER ou VIEWER.".to_string(),
            ));
        }

        let tenant = self
            .tenant_repo
            .find_by_id(current_tenant_id)
            .await?
            .ok_or(AppError::TenantNotFound)?;

        // Super-admin atravessa só o bloqueio de assinatura; o limite de
        // vagas vale para todos.
        if principal.role != UserRole::SuperAdmin {
            self.quota_service.ensure_subscription_regular(&tenant).await?;
        }
        self.quota_service.ensure_user_seat_available(&tenant).await?;

        // O sistema não cria contas-sombra: o convidado precisa existir.
        let target = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if self
            .tenant_repo
            .find_active_member(current_tenant_id, target.id)
            .await?
            .is_some()
        {
            return Err(AppError::MemberAlreadyExists);
        }

        let mut tx = self.pool.begin().await?;
        let member = self
            .tenant_repo
            .upsert_invite(&mut *tx, current_tenant_id, email, target.id, role)
            .await?;

        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: current_tenant_id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(actor_id),
                    entity_type: EntityType::Tenant,
                    entity_id: current_tenant_id,
                    action: actions::MEMBER_INVITED,
                    ip: None,
                    user_agent: None,
                    payload: Some(json!({ "email": email, "role": role })),
                },
            )
            .await?;
        tx.commit().await?;

        // Entrega do convite fora da transação, melhor esforço.
        let notifier = self.notification_service.clone();
        let onboarding_link = format!("{}/onboarding", self.front_url);
        let tenant_name = tenant.name.clone();
        let to = email.to_string();
        tokio::spawn(async move {
            let html = format!(
                "<p>Você foi convidado para o workspace <b>{}</b>.</p>\
                 <p>Acesse <a href=\"{}\">{}</a> para aceitar o convite.</p>",
                tenant_name, onboarding_link, onboarding_link
            );
            if let Err(e) = notifier
                .send_email(current_tenant_id, &to, "Convite para workspace", &html)
                .await
            {
                tracing::warn!("Falha ao entregar convite: {:?}", e);
            }
        });

        Ok(member)
    }

    pub async fn list_pending_invites(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<TenantMember>, AppError> {
        self.tenant_repo.list_pending_invites(user_id, email).await
    }

    pub async fn respond_invite(
        &self,
        user_id: Uuid,
        invite_id: Uuid,
        accept: bool,
    ) -> Result<TenantMember, AppError> {
        let invite = self
            .tenant_repo
            .find_member_by_id(invite_id)
            .await?
            .ok_or(AppError::InviteNotFound)?;

        if invite.status != MemberStatus::Pending {
            return Err(AppError::InviteNotFound);
        }

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        // O convite pertence ao usuário pelo user_id ou, se foi emitido
        // antes do cadastro, pelo e-mail atual (que então adota o user_id).
        let owns_invite = invite.user_id == Some(user_id)
            || (invite.user_id.is_none() && invite.email == user.email);
        if !owns_invite {
            return Err(AppError::InviteNotFound);
        }

        let status = if accept {
            MemberStatus::Active
        } else {
            MemberStatus::Declined
        };
        self.tenant_repo.respond_invite(invite_id, user_id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_colapsa_nao_alfanumericos() {
        assert_eq!(slugify("Acme Corporação Ltda."), "acme-corporacao-ltda");
        assert_eq!(slugify("  João & Maria  "), "joao-maria");
        assert_eq!(slugify("___"), "workspace");
        assert_eq!(slugify("Empresa-123"), "empresa-123");
    }

    #[test]
    fn slugify_nao_gera_hifen_nas_pontas() {
        let slug = slugify("!Empresa!");
        assert!(!slug.starts_with('-'));
        assert!(!slug.ends_with('-'));
    }
}
