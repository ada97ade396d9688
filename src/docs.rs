// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::switch_tenant,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,

        // --- Tenancy ---
        handlers::tenancy::create_tenant,
        handlers::tenancy::my_tenant,
        handlers::tenancy::available_tenants,
        handlers::tenancy::invite_member,
        handlers::tenancy::list_invites,
        handlers::tenancy::respond_invite,

        // --- Documents ---
        handlers::documents::upload_document,
        handlers::documents::list_documents,
        handlers::documents::document_stats,
        handlers::documents::get_document,
        handlers::documents::invite_signers,
        handlers::documents::cancel_document,
        handlers::documents::expire_document,
        handlers::documents::document_integrity,
        handlers::documents::document_audit,
        handlers::documents::verify_document_chain,
        handlers::documents::validate_file,
        handlers::documents::create_folder,
        handlers::documents::list_folders,
        handlers::documents::move_folder,

        // --- Assinatura ---
        handlers::signing::summary,
        handlers::signing::identify,
        handlers::signing::save_position,
        handlers::signing::start_otp,
        handlers::signing::verify_otp,
        handlers::signing::commit,

        // --- Settings / Scheduler ---
        handlers::settings::get_settings,
        handlers::settings::update_settings,
        handlers::scheduler::due_reminders,
        handlers::scheduler::expire_overdue,
    ),
    components(
        schemas(
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::RefreshPayload,
            models::auth::SwitchTenantPayload,
            models::auth::ForgotPasswordPayload,
            models::auth::ResetPasswordPayload,
            models::auth::AuthResponse,
            models::auth::UserPublic,
            models::auth::UserRole,
            models::auth::UserStatus,
            models::auth::AuthChannel,
            models::tenancy::CreateTenantPayload,
            models::tenancy::InviteMemberPayload,
            models::tenancy::RespondInvitePayload,
            models::tenancy::Tenant,
            models::tenancy::Plan,
            models::tenancy::TenantMember,
            models::tenancy::TenantSummary,
            models::tenancy::MyTenantResponse,
            models::documents::Document,
            models::documents::DocumentStatus,
            models::documents::DocumentStats,
            models::documents::DocumentDetail,
            models::documents::Folder,
            models::documents::CreateFolderPayload,
            models::documents::MoveFolderPayload,
            models::documents::ValidateFileResponse,
            models::signers::InviteSignersPayload,
            models::signers::SignerInput,
            models::signers::SignerPublic,
            models::signers::SignerStatus,
            models::signers::IdentifyPayload,
            models::signers::VerifyOtpPayload,
            models::signers::PositionPayload,
            models::signers::CommitPayload,
            models::signers::CommitResponse,
            models::signers::SignerSessionSummary,
            models::signers::Certificate,
            models::settings::TenantSettings,
            models::settings::UpdateSettingsPayload,
            models::audit::AuditLog,
            models::audit::ActorKind,
            models::audit::EntityType,
            models::audit::ChainVerification,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Identidade e sessões"),
        (name = "tenants", description = "Workspaces e membros"),
        (name = "documents", description = "Documentos e trilha de auditoria"),
        (name = "folders", description = "Pastas"),
        (name = "sign", description = "Sessão pública do signatário"),
        (name = "settings", description = "Configurações do tenant"),
        (name = "scheduler", description = "Ganchos do agendador externo"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
