// src/services/auth_service.rs

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::json;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    common::{
        crypto::{mint_otp6, password_hash, password_verify, sha256_hex},
        error::AppError,
    },
    db::{OtpRepository, SessionRepository, TenantRepository, UserRepository},
    models::{
        audit::{actions, ActorKind, EntityType, NewAuditEvent},
        auth::{
            AccessClaims, AuthChannel, AuthResponse, OtpContext, RefreshClaims, User, UserRole,
        },
    },
    services::{audit_service::AuditService, notification_service::NotificationService,
        tenancy_service::unique_slug},
};

const ACCESS_TTL_MINUTES: i64 = 30;
const REFRESH_TTL_DAYS: i64 = 7;
const RESET_OTP_TTL_MINUTES: i64 = 15;

// ---
// Emissão e validação de credenciais (funções puras sobre o segredo)
// ---

pub fn issue_access_token(
    secret: &str,
    user_id: Uuid,
    tenant_id: Uuid,
    role: UserRole,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id,
        tenant_id,
        role,
        exp: (now + Duration::minutes(ACCESS_TTL_MINUTES)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn issue_refresh_token(
    secret: &str,
    user_id: Uuid,
    tenant_id: Uuid,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = RefreshClaims {
        sub: user_id,
        tenant_id,
        jti: Uuid::new_v4(),
        exp: (now + Duration::days(REFRESH_TTL_DAYS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_access_token(secret: &str, token: &str) -> Result<AccessClaims, AppError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;
    Ok(data.claims)
}

pub fn decode_refresh_token(secret: &str, token: &str) -> Result<RefreshClaims, AppError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| AppError::SessionInvalid)?;
    Ok(data.claims)
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    tenant_repo: TenantRepository,
    session_repo: SessionRepository,
    otp_repo: OtpRepository,
    audit_service: AuditService,
    notification_service: NotificationService,
    jwt_secret: String,
    jwt_refresh_secret: String,
    pool: sqlx::PgPool,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: UserRepository,
        tenant_repo: TenantRepository,
        session_repo: SessionRepository,
        otp_repo: OtpRepository,
        audit_service: AuditService,
        notification_service: NotificationService,
        jwt_secret: String,
        jwt_refresh_secret: String,
        pool: sqlx::PgPool,
    ) -> Self {
        Self {
            user_repo,
            tenant_repo,
            session_repo,
            otp_repo,
            audit_service,
            notification_service,
            jwt_secret,
            jwt_refresh_secret,
            pool,
        }
    }

    // ---
    // Registro: tenant pessoal + usuário ADMIN + membership, tudo ou nada.
    // ---
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        cpf: Option<&str>,
        phone: Option<&str>,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthResponse, AppError> {
        // Hashing fora da transação (não toca o banco).
        let hashed_password = password_hash(password).await?;

        let slug = unique_slug(&self.tenant_repo, name).await?;
        let plan = self
            .tenant_repo
            .find_plan_by_slug("gratuito")
            .await?
            .ok_or(AppError::PlanNotFound)?;

        let mut tx = self.pool.begin().await?;

        let tenant = self
            .tenant_repo
            .create_tenant(&mut *tx, name, &slug, plan.id)
            .await?;

        let user = self
            .user_repo
            .create_user(
                &mut *tx,
                tenant.id,
                name,
                email,
                &hashed_password,
                cpf,
                phone,
                UserRole::Admin,
            )
            .await?;

        self.tenant_repo
            .add_active_member(&mut *tx, tenant.id, user.id, email, UserRole::Admin)
            .await?;

        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: tenant.id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(user.id),
                    entity_type: EntityType::User,
                    entity_id: user.id,
                    action: actions::USER_CREATED,
                    ip: ip.clone(),
                    user_agent: user_agent.clone(),
                    payload: Some(json!({ "email": email })),
                },
            )
            .await?;

        tx.commit().await?;

        self.issue_pair(&user, tenant.id, UserRole::Admin).await
    }

    // ---
    // Login. E-mail inexistente e senha errada são indistinguíveis.
    // ---
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !password_verify(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let role = if user.role == UserRole::SuperAdmin {
            UserRole::SuperAdmin
        } else {
            UserRole::Admin
        };

        let mut tx = self.pool.begin().await?;
        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: user.tenant_id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(user.id),
                    entity_type: EntityType::User,
                    entity_id: user.id,
                    action: actions::LOGIN_SUCCESS,
                    ip,
                    user_agent,
                    payload: None,
                },
            )
            .await?;
        tx.commit().await?;

        self.issue_pair(&user, user.tenant_id, role).await
    }

    // ---
    // Rotação: cada credencial de atualização serve exatamente uma vez.
    // ---
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<AuthResponse, AppError> {
        let claims = decode_refresh_token(&self.jwt_refresh_secret, raw_refresh_token)?;

        let user = self
            .user_repo
            .find_active_by_id(claims.sub)
            .await?
            .ok_or(AppError::SessionInvalid)?;

        // Localiza a sessão cujo hash bate com o token bruto apresentado.
        let presented = sha256_hex(raw_refresh_token.as_bytes());
        let sessions = self.session_repo.list_by_user(user.id).await?;
        let session = sessions
            .into_iter()
            .find(|s| {
                bool::from(
                    s.refresh_token_hash
                        .as_bytes()
                        .ct_eq(presented.as_bytes()),
                )
            })
            .ok_or(AppError::SessionInvalid)?;

        if session.expires_at < Utc::now() {
            self.session_repo.delete(session.id).await?;
            return Err(AppError::SessionInvalid);
        }

        // Rotação obrigatória: a sessão antiga morre antes do novo par nascer.
        self.session_repo.delete(session.id).await?;

        // Preserva o tenant carregado na credencial antiga (não o pessoal).
        let role = self.resolve_role(&user, claims.tenant_id).await?;
        self.issue_pair(&user, claims.tenant_id, role).await
    }

    // Idempotente: ausência da sessão não é erro.
    pub async fn logout(&self, user_id: Uuid, raw_refresh_token: &str) -> Result<(), AppError> {
        let presented = sha256_hex(raw_refresh_token.as_bytes());
        let sessions = self.session_repo.list_by_user(user_id).await?;
        if let Some(session) = sessions.into_iter().find(|s| {
            bool::from(
                s.refresh_token_hash
                    .as_bytes()
                    .ct_eq(presented.as_bytes()),
            )
        }) {
            self.session_repo.delete(session.id).await?;
        }
        Ok(())
    }

    // ---
    // Troca de tenant: emite um novo par SEM revogar o anterior (aditivo).
    // ---
    pub async fn switch_tenant(
        &self,
        user_id: Uuid,
        target_tenant_id: Uuid,
    ) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_active_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let role = self.resolve_role(&user, target_tenant_id).await?;
        self.issue_pair(&user, target_tenant_id, role).await
    }

    // ---
    // Reset de senha em dois passos.
    // ---
    pub async fn request_password_reset(
        &self,
        email: &str,
        channel: Option<AuthChannel>,
    ) -> Result<(), AppError> {
        let channel = channel.unwrap_or(AuthChannel::Email);

        // Silencioso quando o usuário não existe (evita enumeração).
        let Some(user) = self.user_repo.find_by_email(email).await? else {
            return Ok(());
        };

        let recipient = match channel {
            AuthChannel::Whatsapp | AuthChannel::Sms => user
                .phone_e164
                .clone()
                .ok_or(AppError::MissingPhone)?,
            AuthChannel::Email => user.email.clone(),
        };

        let otp = mint_otp6();
        let code_hash = password_hash(&otp).await?;
        self.otp_repo
            .create(
                &recipient,
                channel,
                &code_hash,
                Utc::now() + Duration::minutes(RESET_OTP_TTL_MINUTES),
                OtpContext::PasswordReset,
            )
            .await?;

        // Entrega sem bloquear a resposta; falha de canal não desfaz o OTP.
        let notifier = self.notification_service.clone();
        let tenant_id = user.tenant_id;
        let user_name = user.name.clone();
        tokio::spawn(async move {
            let body = format!(
                "Olá, {}! Seu código para redefinição de senha é: {}. Ele vale por {} minutos.",
                user_name, otp, RESET_OTP_TTL_MINUTES
            );
            let result = match channel {
                AuthChannel::Whatsapp | AuthChannel::Sms => {
                    notifier.send_whatsapp_text(tenant_id, &recipient, &body).await
                }
                AuthChannel::Email => {
                    notifier
                        .send_email(tenant_id, &recipient, "Redefinição de senha", &body)
                        .await
                }
            };
            if let Err(e) = result {
                tracing::warn!("Falha ao entregar OTP de redefinição: {:?}", e);
            }
        });

        let mut tx = self.pool.begin().await?;
        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: user.tenant_id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(user.id),
                    entity_type: EntityType::User,
                    entity_id: user.id,
                    action: actions::PASSWORD_RESET_REQUESTED,
                    ip: None,
                    user_agent: None,
                    payload: Some(json!({ "channel": format!("{:?}", channel).to_uppercase() })),
                },
            )
            .await?;
        tx.commit().await?;

        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::OtpInvalid)?;

        let mut recipients = vec![user.email.clone()];
        if let Some(phone) = &user.phone_e164 {
            recipients.push(phone.clone());
        }

        let code = self
            .otp_repo
            .latest_for_recipients(OtpContext::PasswordReset, &recipients)
            .await?
            .ok_or(AppError::OtpExpired)?;

        if code.expires_at < Utc::now() {
            return Err(AppError::OtpExpired);
        }
        if !password_verify(otp, &code.code_hash).await? {
            self.otp_repo.increment_attempts(code.id).await?;
            return Err(AppError::OtpInvalid);
        }

        let hashed = password_hash(new_password).await?;

        // Troca da senha e destruição do código na mesma transação.
        let mut tx = self.pool.begin().await?;
        self.user_repo
            .update_password(&mut *tx, user.id, &hashed)
            .await?;
        self.otp_repo.delete(&mut *tx, code.id).await?;
        self.audit_service
            .append_event(
                &mut *tx,
                NewAuditEvent {
                    tenant_id: user.tenant_id,
                    actor_kind: ActorKind::User,
                    actor_id: Some(user.id),
                    entity_type: EntityType::User,
                    entity_id: user.id,
                    action: actions::PASSWORD_RESET_DONE,
                    ip: None,
                    user_agent: None,
                    payload: None,
                },
            )
            .await?;
        tx.commit().await?;

        Ok(())
    }

    // ---
    // Internos
    // ---

    // Papel do usuário em um tenant: no pessoal, ADMIN (ou SUPER_ADMIN);
    // nos demais, o papel do membership ATIVO.
    async fn resolve_role(&self, user: &User, tenant_id: Uuid) -> Result<UserRole, AppError> {
        if tenant_id == user.tenant_id {
            return Ok(if user.role == UserRole::SuperAdmin {
                UserRole::SuperAdmin
            } else {
                UserRole::Admin
            });
        }
        let member = self
            .tenant_repo
            .find_active_member(tenant_id, user.id)
            .await?
            .ok_or(AppError::ForbiddenAccess)?;
        Ok(member.role)
    }

    async fn issue_pair(
        &self,
        user: &User,
        tenant_id: Uuid,
        role: UserRole,
    ) -> Result<AuthResponse, AppError> {
        let access_token = issue_access_token(&self.jwt_secret, user.id, tenant_id, role)?;
        let refresh_token = issue_refresh_token(&self.jwt_refresh_secret, user.id, tenant_id)?;

        self.session_repo
            .create(
                &self.pool,
                user.id,
                &sha256_hex(refresh_token.as_bytes()),
                Utc::now() + Duration::days(REFRESH_TTL_DAYS),
            )
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            user: user.clone().into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "segredo-de-teste-com-entropia-suficiente-1234567890";

    #[test]
    fn par_de_claims_faz_roundtrip() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let access = issue_access_token(SECRET, user_id, tenant_id, UserRole::Manager).unwrap();
        let claims = decode_access_token(SECRET, &access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, tenant_id);
        assert_eq!(claims.role, UserRole::Manager);

        let refresh = issue_refresh_token(SECRET, user_id, tenant_id).unwrap();
        let claims = decode_refresh_token(SECRET, &refresh).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, tenant_id);
    }

    #[test]
    fn segredo_errado_e_rejeitado() {
        let token =
            issue_access_token(SECRET, Uuid::new_v4(), Uuid::new_v4(), UserRole::Admin).unwrap();
        assert!(decode_access_token("outro-segredo", &token).is_err());
    }

    #[test]
    fn tokens_de_refresh_sao_unicos_pelo_jti() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let a = issue_refresh_token(SECRET, user_id, tenant_id).unwrap();
        let b = issue_refresh_token(SECRET, user_id, tenant_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn access_nao_passa_como_refresh() {
        // O access token não tem o campo `jti`; a decodificação tipada falha.
        let access =
            issue_access_token(SECRET, Uuid::new_v4(), Uuid::new_v4(), UserRole::Admin).unwrap();
        assert!(decode_refresh_token(SECRET, &access).is_err());
    }
}
