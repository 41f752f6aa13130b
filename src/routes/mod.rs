pub mod auth;
pub mod brands;
pub mod catalog;
pub mod certifications;
pub mod health;
pub mod notify;
pub mod products;
pub mod program_certificates;
pub mod rbac;
