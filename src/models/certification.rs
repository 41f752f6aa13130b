use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::db::row_parsers::{col, parse_datetime, parse_json_object, parse_opt_date};
use crate::errors::{AppError, FieldErrors};
use crate::events::Loggable;
use crate::models::catalog::{Certification, CertificationStatus, Program};
use crate::validation::{absorb, check_date_order, RequestRules};

// =============================================================================
// PAYLOADS
// =============================================================================

/// Mutable attributes of a certificate assignment. Also the update body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CertificateAttributes {
    #[schema(example = "GL-2025-0001")]
    #[validate(length(max = 100))]
    pub certificate_no: Option<String>,
    #[schema(value_type = Option<String>, format = Date, example = "2025-01-15")]
    pub issue_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date, example = "2027-01-14")]
    pub expiry_date: Option<NaiveDate>,
    #[validate(range(min = 1))]
    pub status_id: Option<i64>,
    #[validate(length(max = 500))]
    pub document_file: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub meta: Option<Map<String, Value>>,
}

impl CertificateAttributes {
    /// Metadata as stored: absent becomes an empty object.
    pub fn meta_or_empty(&self) -> Map<String, Value> {
        self.meta.clone().unwrap_or_default()
    }
}

impl RequestRules for CertificateAttributes {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
        check_date_order(self.issue_date, self.expiry_date, errors);
    }
}

/// Create body for a product's certificate.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CertificationPayload {
    #[validate(range(min = 1))]
    pub certification_id: i64,
    #[serde(flatten)]
    pub attributes: CertificateAttributes,
}

impl RequestRules for CertificationPayload {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
        self.attributes.check(errors);
    }
}

/// Create body under a program route; the product is named in the body.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProgramCertificatePayload {
    #[schema(example = "eco-paint-5l")]
    #[validate(length(min = 1, max = 255))]
    pub product_slug: String,
    #[serde(flatten)]
    pub certificate: CertificationPayload,
}

impl RequestRules for ProgramCertificatePayload {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
        self.certificate.check(errors);
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgramCertificateQuery {
    /// Case-insensitive substring of product, certificate number, company or certification name.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

// =============================================================================
// PRODUCT CERTIFICATION (assignment view)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductCertification {
    pub id: i64,
    pub product_id: i64,
    pub certification: Certification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_no: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CertificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_file: Option<String>,
    #[schema(value_type = Object)]
    pub meta: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl ProductCertification {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "pc_id")?,
            product_id: col(row, "pc_product_id")?,
            certification: Certification::from_row(row)?,
            certificate_no: col(row, "certificate_no")?,
            issue_date: parse_opt_date(col(row, "issue_date")?)?,
            expiry_date: parse_opt_date(col(row, "expiry_date")?)?,
            status: status_from_row(row)?,
            document_file: col(row, "document_file")?,
            meta: parse_json_object(col(row, "meta_json")?)?,
            updated_at: parse_datetime(&col::<String>(row, "pc_updated_at")?)?,
        })
    }
}

impl Loggable for ProductCertification {
    fn entity_type() -> &'static str {
        "product_certification"
    }

    fn subject_id(&self) -> String {
        format!("{}:{}", self.product_id, self.certification.id)
    }
}

/// Status columns come from a LEFT JOIN and may all be NULL.
fn status_from_row(row: &SqliteRow) -> Result<Option<CertificationStatus>, AppError> {
    let id: Option<i64> = col(row, "cs_id")?;
    match id {
        Some(id) => Ok(Some(CertificationStatus {
            id,
            code: col(row, "cs_code")?,
            name: col(row, "cs_name")?,
        })),
        None => Ok(None),
    }
}

// =============================================================================
// PROGRAM CERTIFICATE (enriched view)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BrandRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub category: NamedRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgramCertificate {
    pub id: i64,
    pub program: Program,
    pub product: NamedRef,
    pub brand: BrandRef,
    pub company: NamedRef,
    pub certification: Certification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_no: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CertificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_file: Option<String>,
    #[schema(value_type = Object)]
    pub meta: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgramCertificate {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        let certification = Certification::from_row(row)?;
        Ok(Self {
            id: col(row, "pc_id")?,
            program: certification.program.clone(),
            product: NamedRef {
                id: col(row, "p_id")?,
                name: col(row, "p_name")?,
                slug: col(row, "p_slug")?,
            },
            brand: BrandRef {
                id: col(row, "b_id")?,
                name: col(row, "b_name")?,
                slug: col(row, "b_slug")?,
                category: NamedRef {
                    id: col(row, "bc_id")?,
                    name: col(row, "bc_name")?,
                    slug: col(row, "bc_slug")?,
                },
            },
            company: NamedRef {
                id: col(row, "co_id")?,
                name: col(row, "co_name")?,
                slug: col(row, "co_slug")?,
            },
            certification,
            certificate_no: col(row, "certificate_no")?,
            issue_date: parse_opt_date(col(row, "issue_date")?)?,
            expiry_date: parse_opt_date(col(row, "expiry_date")?)?,
            status: status_from_row(row)?,
            document_file: col(row, "document_file")?,
            meta: parse_json_object(col(row, "meta_json")?)?,
            created_at: parse_datetime(&col::<String>(row, "pc_created_at")?)?,
            updated_at: parse_datetime(&col::<String>(row, "pc_updated_at")?)?,
        })
    }
}

impl Loggable for ProgramCertificate {
    fn entity_type() -> &'static str {
        "program_certificate"
    }

    fn subject_id(&self) -> String {
        format!("{}:{}", self.product.slug, self.certification.id)
    }
}
