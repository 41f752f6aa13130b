use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::certification::{CertificateAttributes, ProductCertification, ProgramCertificate};

/// Storage for product/certification records, addressed by internal product id.
#[async_trait]
pub trait CertificationStore: Send + Sync {
    async fn product_id(&self, slug: &str) -> Result<Option<i64>, AppError>;
    async fn certification_exists(&self, certification_id: i64) -> Result<bool, AppError>;
    async fn status_exists(&self, status_id: i64) -> Result<bool, AppError>;

    async fn count(&self, product_id: i64) -> Result<i64, AppError>;
    /// Ordered by certification name.
    async fn list(&self, product_id: i64, limit: i64, offset: i64) -> Result<Vec<ProductCertification>, AppError>;
    async fn find(&self, product_id: i64, certification_id: i64) -> Result<Option<ProductCertification>, AppError>;

    async fn insert(&self, product_id: i64, certification_id: i64, attributes: &CertificateAttributes) -> Result<(), AppError>;
    /// Returns false when no record exists for the pair.
    async fn update(&self, product_id: i64, certification_id: i64, attributes: &CertificateAttributes) -> Result<bool, AppError>;
    /// Returns false when no record exists for the pair.
    async fn delete(&self, product_id: i64, certification_id: i64) -> Result<bool, AppError>;
}

/// Program-aware lookups backing the consistency engine.
#[async_trait]
pub trait ProgramCertificateStore: Send + Sync {
    async fn product_program_code(&self, slug: &str) -> Result<Option<String>, AppError>;
    async fn certification_program_code(&self, certification_id: i64) -> Result<Option<String>, AppError>;

    /// `search` filters count and page alike.
    async fn count(&self, program: &str, search: Option<&str>) -> Result<i64, AppError>;
    /// Most recently updated first, then by descending id.
    async fn list(&self, program: &str, search: Option<&str>, limit: i64, offset: i64) -> Result<Vec<ProgramCertificate>, AppError>;
    async fn find(&self, program: &str, product_slug: &str, certification_id: i64) -> Result<Option<ProgramCertificate>, AppError>;
}
