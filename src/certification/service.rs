use std::sync::Arc;

use super::store::CertificationStore;
use crate::errors::{AppError, Entity};
use crate::models::certification::{CertificateAttributes, ProductCertification};
use crate::response::{Page, Pagination};

/// Product certificates without any program rule. Every operation starts by
/// resolving the product slug.
#[derive(Clone)]
pub struct CertificationService {
    store: Arc<dyn CertificationStore>,
}

impl CertificationService {
    pub fn new(store: Arc<dyn CertificationStore>) -> Self {
        Self { store }
    }

    async fn resolve_product(&self, slug: &str) -> Result<i64, AppError> {
        self.store
            .product_id(slug)
            .await?
            .ok_or(AppError::NotFound(Entity::Product))
    }

    async fn ensure_status(&self, attributes: &CertificateAttributes) -> Result<(), AppError> {
        if let Some(status_id) = attributes.status_id {
            if !self.store.status_exists(status_id).await? {
                return Err(AppError::field("status_id", "unknown certification status"));
            }
        }
        Ok(())
    }

    pub async fn list(&self, product_slug: &str, pagination: Pagination) -> Result<Page<ProductCertification>, AppError> {
        let product_id = self.resolve_product(product_slug).await?;
        let total = self.store.count(product_id).await?;

        let items = if pagination.is_past_end(total) {
            Vec::new()
        } else {
            self.store
                .list(product_id, pagination.page_size, pagination.offset())
                .await?
        };

        Ok(Page {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
        })
    }

    /// A second create for the same pair is rejected by the store's unique
    /// constraint and surfaces as `Conflict`.
    pub async fn create(
        &self,
        product_slug: &str,
        certification_id: i64,
        attributes: &CertificateAttributes,
    ) -> Result<ProductCertification, AppError> {
        let product_id = self.resolve_product(product_slug).await?;
        if !self.store.certification_exists(certification_id).await? {
            return Err(AppError::NotFound(Entity::Certification));
        }
        self.ensure_status(attributes).await?;

        self.store.insert(product_id, certification_id, attributes).await?;

        self.store
            .find(product_id, certification_id)
            .await?
            .ok_or_else(|| AppError::internal("created product certification could not be read back"))
    }

    pub async fn update(
        &self,
        product_slug: &str,
        certification_id: i64,
        attributes: &CertificateAttributes,
    ) -> Result<ProductCertification, AppError> {
        let product_id = self.resolve_product(product_slug).await?;
        self.ensure_status(attributes).await?;

        if !self.store.update(product_id, certification_id, attributes).await? {
            return Err(AppError::NotFound(Entity::ProgramCertificate));
        }

        self.store
            .find(product_id, certification_id)
            .await?
            .ok_or(AppError::NotFound(Entity::ProgramCertificate))
    }

    /// Returns the removed record.
    pub async fn delete(&self, product_slug: &str, certification_id: i64) -> Result<ProductCertification, AppError> {
        let product_id = self.resolve_product(product_slug).await?;
        let existing = self
            .store
            .find(product_id, certification_id)
            .await?
            .ok_or(AppError::NotFound(Entity::ProgramCertificate))?;

        if !self.store.delete(product_id, certification_id).await? {
            return Err(AppError::NotFound(Entity::ProgramCertificate));
        }

        Ok(existing)
    }
}
