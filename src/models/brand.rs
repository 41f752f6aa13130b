use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::db::row_parsers::col;
use crate::errors::{AppError, FieldErrors};
use crate::events::Loggable;
use crate::models::product::is_slug;
use crate::validation::{absorb, RequestRules};

/// Manufacturer that owns brands and products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Company {
    pub id: i64,
    #[schema(example = "Acme")]
    pub name: String,
    #[schema(example = "acme")]
    pub slug: String,
}

impl Company {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            name: col(row, "name")?,
            slug: col(row, "slug")?,
        })
    }
}

impl Loggable for Company {
    fn entity_type() -> &'static str {
        "company"
    }

    fn subject_id(&self) -> String {
        self.slug.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BrandCategory {
    pub id: i64,
    #[schema(example = "Paint")]
    pub name: String,
    #[schema(example = "paint")]
    pub slug: String,
}

impl BrandCategory {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            name: col(row, "name")?,
            slug: col(row, "slug")?,
        })
    }
}

impl Loggable for BrandCategory {
    fn entity_type() -> &'static str {
        "brand_category"
    }

    fn subject_id(&self) -> String {
        self.slug.clone()
    }
}

/// A brand with its owning company and category resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Brand {
    pub id: i64,
    #[schema(example = "Acme Paints")]
    pub name: String,
    #[schema(example = "acme-paints")]
    pub slug: String,
    pub company: Company,
    pub category: BrandCategory,
}

impl Brand {
    pub const SELECT: &'static str = r#"
        SELECT b.id, b.name, b.slug,
               co.id AS co_id, co.name AS co_name, co.slug AS co_slug,
               bc.id AS bc_id, bc.name AS bc_name, bc.slug AS bc_slug
        FROM brands b
        JOIN companies co ON co.id = b.company_id
        JOIN brand_categories bc ON bc.id = b.brand_category_id
    "#;

    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            name: col(row, "name")?,
            slug: col(row, "slug")?,
            company: Company {
                id: col(row, "co_id")?,
                name: col(row, "co_name")?,
                slug: col(row, "co_slug")?,
            },
            category: BrandCategory {
                id: col(row, "bc_id")?,
                name: col(row, "bc_name")?,
                slug: col(row, "bc_slug")?,
            },
        })
    }
}

impl Loggable for Brand {
    fn entity_type() -> &'static str {
        "brand"
    }

    fn subject_id(&self) -> String {
        self.slug.clone()
    }
}

/// Body shared by companies and brand categories.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DirectoryPayload {
    #[schema(example = "Acme")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[schema(example = "acme")]
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
}

impl RequestRules for DirectoryPayload {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
        check_slug(&self.slug, errors);
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BrandPayload {
    #[validate(range(min = 1))]
    pub company_id: i64,
    #[validate(range(min = 1))]
    pub brand_category_id: i64,
    #[schema(example = "Acme Paints")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[schema(example = "acme-paints")]
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
}

impl RequestRules for BrandPayload {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
        check_slug(&self.slug, errors);
    }
}

fn check_slug(slug: &str, errors: &mut FieldErrors) {
    if !slug.is_empty() && !is_slug(slug) {
        errors
            .entry("slug".to_string())
            .or_insert_with(|| "must contain only lowercase letters, digits and dashes".to_string());
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BrandQuery {
    /// Only brands owned by this company.
    pub company_id: Option<i64>,
    /// Only brands in this category.
    pub brand_category_id: Option<i64>,
}
