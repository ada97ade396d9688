pub mod audit_service;
pub mod auth_service;
pub mod document_service;
pub mod notification_service;
pub mod pdf_service;
pub mod quota_service;
pub mod scheduler_service;
pub mod signing_service;
pub mod tenancy_service;
