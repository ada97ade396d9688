pub mod audit;
pub mod auth;
pub mod documents;
pub mod settings;
pub mod signers;
pub mod tenancy;
