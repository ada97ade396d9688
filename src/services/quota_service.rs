// src/services/quota_service.rs
//
// Portão de plano e assinatura, invocado no upload de documento e no
// convite de membro. Super-admin atravessa apenas o bloqueio de
// assinatura; os limites numéricos valem para todos.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, TenantRepository, UserRepository},
    models::{
        auth::UserRole,
        tenancy::{SubscriptionStatus, Tenant},
    },
};

#[derive(Clone)]
pub struct QuotaService {
    tenant_repo: TenantRepository,
    user_repo: UserRepository,
    document_repo: DocumentRepository,
    pool: sqlx::PgPool,
}

impl QuotaService {
    pub fn new(
        tenant_repo: TenantRepository,
        user_repo: UserRepository,
        document_repo: DocumentRepository,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            tenant_repo,
            user_repo,
            document_repo,
            pool,
        }
    }

    // Planos pagos com assinatura em atraso ou cancelada ficam bloqueados
    // para escrita. Leitura não passa por aqui.
    pub async fn ensure_subscription_regular(&self, tenant: &Tenant) -> Result<(), AppError> {
        let plan = self
            .tenant_repo
            .find_plan_by_id(tenant.plan_id)
            .await?
            .ok_or(AppError::PlanNotFound)?;

        if plan.price > Decimal::ZERO
            && matches!(
                tenant.subscription_status,
                Some(SubscriptionStatus::Overdue) | Some(SubscriptionStatus::Canceled)
            )
        {
            return Err(AppError::SubscriptionIrregular);
        }
        Ok(())
    }

    // Ocupação de vagas: usuários ATIVOS do tenant + convites não recusados.
    pub async fn ensure_user_seat_available(&self, tenant: &Tenant) -> Result<(), AppError> {
        let plan = self
            .tenant_repo
            .find_plan_by_id(tenant.plan_id)
            .await?
            .ok_or(AppError::PlanNotFound)?;

        let occupancy = self.user_occupancy(tenant.id).await?;
        if occupancy >= plan.user_limit as i64 {
            return Err(AppError::UserLimitReached);
        }
        Ok(())
    }

    pub async fn ensure_document_slot_available(&self, tenant: &Tenant) -> Result<(), AppError> {
        let plan = self
            .tenant_repo
            .find_plan_by_id(tenant.plan_id)
            .await?
            .ok_or(AppError::PlanNotFound)?;

        let count = self.document_repo.count_by_tenant(&self.pool, tenant.id).await?;
        if count >= plan.document_limit as i64 {
            return Err(AppError::DocumentLimitReached);
        }
        Ok(())
    }

    // Gate completo do upload, com o bypass de super-admin na assinatura.
    pub async fn check_upload_allowed(
        &self,
        tenant: &Tenant,
        actor_role: UserRole,
    ) -> Result<(), AppError> {
        if actor_role != UserRole::SuperAdmin {
            self.ensure_subscription_regular(tenant).await?;
        }
        self.ensure_document_slot_available(tenant).await
    }

    pub async fn current_usage(&self, tenant_id: Uuid) -> Result<(i64, i64), AppError> {
        let users = self.user_occupancy(tenant_id).await?;
        let documents = self.document_repo.count_by_tenant(&self.pool, tenant_id).await?;
        Ok((users, documents))
    }

    async fn user_occupancy(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let active_users = self
            .user_repo
            .count_active_by_tenant(&self.pool, tenant_id)
            .await?;
        let seats_held = self
            .tenant_repo
            .count_members_holding_seat(&self.pool, tenant_id)
            .await?;
        Ok(active_users + seats_held)
    }
}
