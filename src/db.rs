// src/db.rs
//
// Um repositório por agregado. Operações que precisam participar de uma
// transação recebem o executor (`&mut *tx`) como argumento explícito.

mod audit_repo;
mod document_repo;
mod otp_repo;
mod session_repo;
mod settings_repo;
mod signer_repo;
mod tenancy_repo;
mod user_repo;

pub use audit_repo::AuditRepository;
pub use document_repo::DocumentRepository;
pub use otp_repo::OtpRepository;
pub use session_repo::SessionRepository;
pub use settings_repo::SettingsRepository;
pub use signer_repo::SignerRepository;
pub use tenancy_repo::TenantRepository;
pub use user_repo::UserRepository;
