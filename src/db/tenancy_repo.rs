// src/db/tenancy_repo.rs

use chrono::Utc;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_unique_violation, AppError},
    models::{
        auth::UserRole,
        tenancy::{MemberStatus, Plan, Tenant, TenantMember},
    },
};

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Tenants
    // ---

    pub async fn create_tenant<'e, E>(
        &self,
        executor: E,
        name: &str,
        slug: &str,
        plan_id: Uuid,
    ) -> Result<Tenant, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name, slug, status, plan_id)
            VALUES ($1, $2, 'ACTIVE', $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(plan_id)
        .fetch_one(executor)
        .await
        .map_err(map_unique_violation)?;
        Ok(tenant)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    pub async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM tenants WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    // ---
    // Planos
    // ---

    pub async fn find_plan_by_slug(&self, slug: &str) -> Result<Option<Plan>, AppError> {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    pub async fn find_plan_by_id(&self, id: Uuid) -> Result<Option<Plan>, AppError> {
        let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    // ---
    // Membros e convites
    // ---

    pub async fn find_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMember>, AppError> {
        let member = sqlx::query_as::<_, TenantMember>(
            "SELECT * FROM tenant_members WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    pub async fn find_member_by_id(&self, id: Uuid) -> Result<Option<TenantMember>, AppError> {
        let member = sqlx::query_as::<_, TenantMember>("SELECT * FROM tenant_members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    // Membership já ATIVO, criado junto com o tenant (dono/admin inicial).
    pub async fn add_active_member<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<TenantMember, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let member = sqlx::query_as::<_, TenantMember>(
            r#"
            INSERT INTO tenant_members (tenant_id, email, user_id, role, status)
            VALUES ($1, $2, $3, $4, 'ACTIVE')
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(user_id)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(map_unique_violation)?;
        Ok(member)
    }

    // Upsert pela chave (tenant_id, email): reconvidar alguém que recusou
    // reativa o convite como PENDING.
    pub async fn upsert_invite<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        email: &str,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<TenantMember, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let member = sqlx::query_as::<_, TenantMember>(
            r#"
            INSERT INTO tenant_members (tenant_id, email, user_id, role, status, invited_at)
            VALUES ($1, $2, $3, $4, 'PENDING', $5)
            ON CONFLICT ON CONSTRAINT tenant_members_tenant_id_email_key
            DO UPDATE SET user_id = $3, role = $4, status = 'PENDING', invited_at = $5,
                          updated_at = now()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .bind(user_id)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(executor)
        .await?;
        Ok(member)
    }

    pub async fn list_pending_invites(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<TenantMember>, AppError> {
        let invites = sqlx::query_as::<_, TenantMember>(
            r#"
            SELECT * FROM tenant_members
            WHERE (user_id = $1 OR email = $2) AND status = 'PENDING'
            ORDER BY invited_at DESC
            "#,
        )
        .bind(user_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(invites)
    }

    pub async fn respond_invite(
        &self,
        invite_id: Uuid,
        user_id: Uuid,
        status: MemberStatus,
    ) -> Result<TenantMember, AppError> {
        let member = sqlx::query_as::<_, TenantMember>(
            r#"
            UPDATE tenant_members
            SET status = $3, user_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invite_id)
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    // Memberships ATIVOS do usuário, com o nome do tenant (para o seletor).
    pub async fn list_active_memberships(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(TenantMember, String)>, AppError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            member: TenantMember,
            tenant_name: String,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT m.*, t.name AS tenant_name
            FROM tenant_members m
            JOIN tenants t ON t.id = m.tenant_id
            WHERE m.user_id = $1 AND m.status = 'ACTIVE'
            ORDER BY t.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| (r.member, r.tenant_name)).collect())
    }

    // Ocupação de membros do tenant: todo convite não recusado conta vaga.
    pub async fn count_members_holding_seat<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tenant_members WHERE tenant_id = $1 AND status <> 'DECLINED'",
        )
        .bind(tenant_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn find_active_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TenantMember>, AppError> {
        let member = sqlx::query_as::<_, TenantMember>(
            r#"
            SELECT * FROM tenant_members
            WHERE tenant_id = $1 AND user_id = $2 AND status = 'ACTIVE'
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }
}
