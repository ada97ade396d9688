// src/config.rs

use std::{env, path::PathBuf, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        AuditRepository, DocumentRepository, OtpRepository, SessionRepository,
        SettingsRepository, SignerRepository, TenantRepository, UserRepository,
    },
    services::{
        audit_service::AuditService,
        auth_service::AuthService,
        document_service::DocumentService,
        notification_service::{GlobalNotificationConfig, NotificationService},
        pdf_service::SignatureStamper,
        quota_service::QuotaService,
        scheduler_service::SchedulerService,
        signing_service::SigningService,
        tenancy_service::TenantService,
    },
};

// Configuração carregada do ambiente. JWT_SECRET e JWT_REFRESH_SECRET são
// obrigatórios; o resto tem default de desenvolvimento.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub front_url: String,
    pub uploads_dir: PathBuf,
    pub fonts_dir: String,
    pub default_admin_email: Option<String>,
    pub default_admin_password: Option<String>,
    pub notifications: GlobalNotificationConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET deve ser definido"))?;
        let jwt_refresh_secret = env::var("JWT_REFRESH_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_REFRESH_SECRET deve ser definido"))?;

        // Segredos fracos não sobem nem em desenvolvimento.
        if jwt_secret.len() < 32 || jwt_refresh_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET e JWT_REFRESH_SECRET precisam de pelo menos 32 bytes");
        }

        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url,
            jwt_secret,
            jwt_refresh_secret,
            front_url: env::var("FRONT_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            uploads_dir: PathBuf::from(
                env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            fonts_dir: env::var("FONTS_DIR").unwrap_or_else(|_| "fonts".to_string()),
            default_admin_email: env::var("DEFAULT_ADMIN_EMAIL").ok(),
            default_admin_password: env::var("DEFAULT_ADMIN_PASSWORD").ok(),
            notifications: GlobalNotificationConfig {
                resend_api_key: env::var("RESEND_API_KEY").ok(),
                resend_from_email: env::var("RESEND_FROM_EMAIL").ok(),
                zapi_instance_id: env::var("ZAPI_INSTANCE_ID").ok(),
                zapi_token: env::var("ZAPI_TOKEN").ok(),
                zapi_client_token: env::var("ZAPI_CLIENT_TOKEN").ok(),
            },
        })
    }
}

// O estado compartilhado da aplicação: pool, repositórios e serviços já
// montados no gráfico de dependências.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub config: Config,

    pub user_repo: UserRepository,
    pub tenant_repo: TenantRepository,
    pub signer_repo: SignerRepository,
    pub settings_repo: SettingsRepository,

    pub audit_service: AuditService,
    pub auth_service: AuthService,
    pub tenant_service: TenantService,
    pub document_service: DocumentService,
    pub signing_service: SigningService,
    pub scheduler_service: SchedulerService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let tenant_repo = TenantRepository::new(db_pool.clone());
        let session_repo = SessionRepository::new(db_pool.clone());
        let otp_repo = OtpRepository::new(db_pool.clone());
        let document_repo = DocumentRepository::new(db_pool.clone());
        let signer_repo = SignerRepository::new(db_pool.clone());
        let audit_repo = AuditRepository::new(db_pool.clone());
        let settings_repo = SettingsRepository::new(db_pool.clone());

        let audit_service = AuditService::new(audit_repo);
        let notification_service =
            NotificationService::new(settings_repo.clone(), config.notifications.clone())
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        let quota_service = QuotaService::new(
            tenant_repo.clone(),
            user_repo.clone(),
            document_repo.clone(),
            db_pool.clone(),
        );

        let auth_service = AuthService::new(
            user_repo.clone(),
            tenant_repo.clone(),
            session_repo.clone(),
            otp_repo.clone(),
            audit_service.clone(),
            notification_service.clone(),
            config.jwt_secret.clone(),
            config.jwt_refresh_secret.clone(),
            db_pool.clone(),
        );

        let tenant_service = TenantService::new(
            tenant_repo.clone(),
            user_repo.clone(),
            quota_service.clone(),
            audit_service.clone(),
            notification_service.clone(),
            config.front_url.clone(),
            db_pool.clone(),
        );

        let document_service = DocumentService::new(
            document_repo.clone(),
            signer_repo.clone(),
            user_repo.clone(),
            tenant_repo.clone(),
            quota_service.clone(),
            audit_service.clone(),
            config.uploads_dir.clone(),
            db_pool.clone(),
        );

        let stamper =
            SignatureStamper::new(config.fonts_dir.clone(), config.uploads_dir.clone());

        let signing_service = SigningService::new(
            document_repo.clone(),
            signer_repo.clone(),
            otp_repo.clone(),
            user_repo.clone(),
            settings_repo.clone(),
            audit_service.clone(),
            notification_service.clone(),
            stamper,
            config.uploads_dir.clone(),
            config.front_url.clone(),
            db_pool.clone(),
        );

        let scheduler_service = SchedulerService::new(
            document_repo,
            signer_repo.clone(),
            session_repo,
            audit_service.clone(),
            db_pool.clone(),
        );

        Ok(Self {
            db_pool,
            jwt_secret: config.jwt_secret.clone(),
            config,
            user_repo,
            tenant_repo,
            signer_repo,
            settings_repo,
            audit_service,
            auth_service,
            tenant_service,
            document_service,
            signing_service,
            scheduler_service,
        })
    }
}
