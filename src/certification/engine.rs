use std::sync::Arc;

use super::service::CertificationService;
use super::store::ProgramCertificateStore;
use crate::errors::{AppError, Entity};
use crate::models::certification::{CertificateAttributes, ProgramCertificatePayload, ProgramCertificate};
use crate::response::{Page, Pagination};

/// Enforces that product, certification type and requested program agree
/// before delegating writes to [`CertificationService`].
///
/// The lookups and the write are separate store calls, not one transaction:
/// a product moved to another program between the check and the write is
/// not detected.
#[derive(Clone)]
pub struct ProgramCertificateService {
    store: Arc<dyn ProgramCertificateStore>,
    certifications: CertificationService,
}

impl ProgramCertificateService {
    pub fn new(store: Arc<dyn ProgramCertificateStore>, certifications: CertificationService) -> Self {
        Self { store, certifications }
    }

    async fn ensure_consistency(&self, program: &str, product_slug: &str, certification_id: i64) -> Result<(), AppError> {
        let product_program = self
            .store
            .product_program_code(product_slug)
            .await?
            .filter(|code| !code.is_empty())
            .ok_or(AppError::NotFound(Entity::Product))?;

        let certification_program = self
            .store
            .certification_program_code(certification_id)
            .await?
            .filter(|code| !code.is_empty())
            .ok_or(AppError::NotFound(Entity::Certification))?;

        if product_program != program || certification_program != program {
            tracing::info!(
                program,
                product = product_slug,
                product_program = %product_program,
                certification_id,
                certification_program = %certification_program,
                "program mismatch"
            );
            return Err(AppError::ProgramMismatch);
        }

        Ok(())
    }

    pub async fn list(&self, program: &str, search: Option<&str>, pagination: Pagination) -> Result<Page<ProgramCertificate>, AppError> {
        let search = search.map(str::trim).filter(|term| !term.is_empty());
        let total = self.store.count(program, search).await?;

        let items = if pagination.is_past_end(total) {
            Vec::new()
        } else {
            self.store
                .list(program, search, pagination.page_size, pagination.offset())
                .await?
        };

        Ok(Page {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
        })
    }

    pub async fn create(&self, program: &str, payload: &ProgramCertificatePayload) -> Result<ProgramCertificate, AppError> {
        let slug = payload.product_slug.as_str();
        let certification_id = payload.certificate.certification_id;

        self.ensure_consistency(program, slug, certification_id).await?;
        self.certifications
            .create(slug, certification_id, &payload.certificate.attributes)
            .await?;

        match self.store.find(program, slug, certification_id).await? {
            Some(record) => Ok(record),
            None => {
                tracing::error!(program, product = slug, certification_id, "created certificate missing from program view");
                Err(AppError::internal("created certificate not found"))
            }
        }
    }

    pub async fn update(
        &self,
        program: &str,
        product_slug: &str,
        certification_id: i64,
        attributes: &CertificateAttributes,
    ) -> Result<ProgramCertificate, AppError> {
        self.ensure_consistency(program, product_slug, certification_id).await?;
        self.certifications
            .update(product_slug, certification_id, attributes)
            .await?;

        self.store
            .find(program, product_slug, certification_id)
            .await?
            .ok_or(AppError::NotFound(Entity::ProgramCertificate))
    }

    /// Returns the removed record. A pair that does not exist is
    /// `program_certificate_not_found`, never a silent success.
    pub async fn delete(&self, program: &str, product_slug: &str, certification_id: i64) -> Result<ProgramCertificate, AppError> {
        self.ensure_consistency(program, product_slug, certification_id).await?;

        let existing = self
            .store
            .find(program, product_slug, certification_id)
            .await?
            .ok_or(AppError::NotFound(Entity::ProgramCertificate))?;

        self.certifications.delete(product_slug, certification_id).await?;
        Ok(existing)
    }
}

/// [`ProgramCertificateService`] with the program code fixed.
#[derive(Clone)]
pub struct ProgramScope {
    code: Arc<str>,
    engine: Arc<ProgramCertificateService>,
}

impl ProgramScope {
    pub fn new(code: &str, engine: Arc<ProgramCertificateService>) -> Self {
        Self {
            code: Arc::from(code),
            engine,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub async fn list(&self, search: Option<&str>, pagination: Pagination) -> Result<Page<ProgramCertificate>, AppError> {
        self.engine.list(&self.code, search, pagination).await
    }

    pub async fn create(&self, payload: &ProgramCertificatePayload) -> Result<ProgramCertificate, AppError> {
        self.engine.create(&self.code, payload).await
    }

    pub async fn update(
        &self,
        product_slug: &str,
        certification_id: i64,
        attributes: &CertificateAttributes,
    ) -> Result<ProgramCertificate, AppError> {
        self.engine
            .update(&self.code, product_slug, certification_id, attributes)
            .await
    }

    pub async fn delete(&self, product_slug: &str, certification_id: i64) -> Result<ProgramCertificate, AppError> {
        self.engine.delete(&self.code, product_slug, certification_id).await
    }
}
