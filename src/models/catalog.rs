use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::db::row_parsers::col;
use crate::errors::AppError;
use crate::events::Loggable;
use crate::validation::RequestRules;

/// Certification scheme, e.g. `green_label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Program {
    pub id: i64,
    #[schema(example = "green_label")]
    pub code: String,
    #[schema(example = "Green Label")]
    pub name: String,
}

impl Program {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            code: col(row, "code")?,
            name: col(row, "name")?,
        })
    }
}

impl Loggable for Program {
    fn entity_type() -> &'static str {
        "program"
    }

    fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CertificationStatus {
    pub id: i64,
    #[schema(example = "active")]
    pub code: String,
    #[schema(example = "Active")]
    pub name: String,
}

impl CertificationStatus {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            code: col(row, "code")?,
            name: col(row, "name")?,
        })
    }
}

impl Loggable for CertificationStatus {
    fn entity_type() -> &'static str {
        "certification_status"
    }

    fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

/// Body shared by programs and statuses. `id` is optional on create; the
/// store assigns one when it is absent. It is ignored on update.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LookupPayload {
    #[validate(range(min = 1))]
    pub id: Option<i64>,
    #[schema(example = "green_label")]
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[schema(example = "Green Label")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

impl RequestRules for LookupPayload {}

/// Certification type. Always belongs to exactly one program.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Certification {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub program: Program,
}

impl Certification {
    /// Expects `c_*` certification columns and `prog_*` program columns.
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "c_id")?,
            name: col(row, "c_name")?,
            image: col(row, "c_image")?,
            program: Program {
                id: col(row, "prog_id")?,
                code: col(row, "prog_code")?,
                name: col(row, "prog_name")?,
            },
        })
    }
}

impl Loggable for Certification {
    fn entity_type() -> &'static str {
        "certification"
    }

    fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CertificationCreateRequest {
    #[validate(range(min = 1))]
    pub program_id: i64,
    #[schema(example = "Green Label Gold")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 500))]
    pub image: Option<String>,
}

impl RequestRules for CertificationCreateRequest {}
