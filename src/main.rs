// src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::{auth::auth_guard, signer::signer_guard};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é aceitável aqui: sem configuração válida, não sobe.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Err(e) = bootstrap_super_admin(&app_state).await {
        tracing::error!("🔥 Falha no bootstrap do super-admin: {:?}", e);
    }

    // --- Rotas públicas de autenticação ---
    let auth_public = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password));

    let auth_protected = Router::new()
        .route("/logout", post(handlers::auth::logout))
        .route("/switch-tenant", post(handlers::auth::switch_tenant))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let tenant_routes = Router::new()
        .route("/", post(handlers::tenancy::create_tenant))
        .route("/my", get(handlers::tenancy::my_tenant))
        .route("/available", get(handlers::tenancy::available_tenants))
        .route("/invite", post(handlers::tenancy::invite_member))
        .route("/invites", get(handlers::tenancy::list_invites))
        .route(
            "/invites/{id}/respond",
            post(handlers::tenancy::respond_invite),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // A validação pública de arquivo fica fora do guard de autenticação.
    let documents_public =
        Router::new().route("/validate-file", post(handlers::documents::validate_file));

    let documents_protected = Router::new()
        .route(
            "/",
            post(handlers::documents::upload_document).get(handlers::documents::list_documents),
        )
        .route("/stats", get(handlers::documents::document_stats))
        .route("/{id}", get(handlers::documents::get_document))
        .route("/{id}/invite", post(handlers::documents::invite_signers))
        .route("/{id}/cancel", post(handlers::documents::cancel_document))
        .route("/{id}/expire", post(handlers::documents::expire_document))
        .route("/{id}/integrity", get(handlers::documents::document_integrity))
        .route("/{id}/audit", get(handlers::documents::document_audit))
        .route(
            "/{id}/verify-chain",
            get(handlers::documents::verify_document_chain),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let folder_routes = Router::new()
        .route(
            "/",
            post(handlers::documents::create_folder).get(handlers::documents::list_folders),
        )
        .route("/{id}/move", post(handlers::documents::move_folder))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let settings_routes = Router::new()
        .route(
            "/",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let scheduler_routes = Router::new()
        .route("/reminders", post(handlers::scheduler::due_reminders))
        .route("/expire", post(handlers::scheduler::expire_overdue))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Sessão pública do signatário: o middleware resolve o token opaco da
    // URL e injeta a SignerSession.
    let sign_routes = Router::new()
        .route("/{token}", get(handlers::signing::summary))
        .route("/{token}/identify", post(handlers::signing::identify))
        .route("/{token}/position", post(handlers::signing::save_position))
        .route("/{token}/otp/start", post(handlers::signing::start_otp))
        .route("/{token}/otp/verify", post(handlers::signing::verify_otp))
        .route("/{token}/commit", post(handlers::signing::commit))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            signer_guard,
        ));

    let port = app_state.config.port;

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_public.merge(auth_protected))
        .nest("/api/tenants", tenant_routes)
        .nest("/api/documents", documents_public.merge(documents_protected))
        .nest("/api/folders", folder_routes)
        .nest("/api/settings", settings_routes)
        .nest("/api/scheduler", scheduler_routes)
        .nest("/api/sign", sign_routes)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", addr);
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}

// Semeia o super-admin inicial quando DEFAULT_ADMIN_EMAIL está definido e
// a conta ainda não existe. Idempotente entre reinícios.
async fn bootstrap_super_admin(app_state: &AppState) -> anyhow::Result<()> {
    use crate::common::crypto::password_hash;
    use crate::models::auth::UserRole;
    use crate::services::tenancy_service::unique_slug;

    let (Some(email), Some(password)) = (
        app_state.config.default_admin_email.clone(),
        app_state.config.default_admin_password.clone(),
    ) else {
        return Ok(());
    };

    if app_state
        .user_repo
        .find_by_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?
        .is_some()
    {
        return Ok(());
    }

    let hashed = password_hash(&password)
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    let slug = unique_slug(&app_state.tenant_repo, "Administração")
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    let plan = app_state
        .tenant_repo
        .find_plan_by_slug("empresa")
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?
        .ok_or_else(|| anyhow::anyhow!("Plano 'empresa' não semeado"))?;

    let mut tx = app_state.db_pool.begin().await?;
    let tenant = app_state
        .tenant_repo
        .create_tenant(&mut *tx, "Administração", &slug, plan.id)
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    let admin = app_state
        .user_repo
        .create_user(
            &mut *tx,
            tenant.id,
            "Super Admin",
            &email,
            &hashed,
            None,
            None,
            UserRole::SuperAdmin,
        )
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    app_state
        .tenant_repo
        .add_active_member(&mut *tx, tenant.id, admin.id, &email, UserRole::Admin)
        .await
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    tx.commit().await?;

    tracing::info!("👑 Super-admin inicial criado: {}", email);
    Ok(())
}
