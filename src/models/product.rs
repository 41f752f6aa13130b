use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::db::row_parsers::{col, parse_datetime, parse_json_object};
use crate::errors::{AppError, FieldErrors};
use crate::events::Loggable;
use crate::models::catalog::Program;
use crate::validation::{absorb, RequestRules};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub brand_id: i64,
    pub program: Program,
    pub name: String,
    #[schema(example = "eco-paint-5l")]
    pub slug: String,
    #[schema(value_type = Object)]
    pub attributes: Map<String, Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub const SELECT: &'static str = r#"
        SELECT p.id, p.company_id, p.brand_id, p.name, p.slug, p.attributes, p.is_active,
               p.created_at, p.updated_at,
               prog.id AS prog_id, prog.code AS prog_code, prog.name AS prog_name
        FROM products p
        JOIN lkp_product_program prog ON prog.id = p.program_id
    "#;

    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            company_id: col(row, "company_id")?,
            brand_id: col(row, "brand_id")?,
            program: Program {
                id: col(row, "prog_id")?,
                code: col(row, "prog_code")?,
                name: col(row, "prog_name")?,
            },
            name: col(row, "name")?,
            slug: col(row, "slug")?,
            attributes: parse_json_object(col(row, "attributes")?)?,
            is_active: col(row, "is_active")?,
            created_at: parse_datetime(&col::<String>(row, "created_at")?)?,
            updated_at: parse_datetime(&col::<String>(row, "updated_at")?)?,
        })
    }
}

impl Loggable for Product {
    fn entity_type() -> &'static str {
        "product"
    }

    fn subject_id(&self) -> String {
        self.slug.clone()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProductPayload {
    #[validate(range(min = 1))]
    pub company_id: i64,
    #[validate(range(min = 1))]
    pub brand_id: i64,
    #[validate(range(min = 1))]
    pub program_id: i64,
    #[schema(example = "Eco Paint 5L")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[schema(example = "eco-paint-5l")]
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
    #[schema(value_type = Option<Object>)]
    pub attributes: Option<Map<String, Value>>,
    pub is_active: Option<bool>,
}

impl RequestRules for ProductPayload {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
        if !self.slug.is_empty() && !is_slug(&self.slug) {
            errors
                .entry("slug".to_string())
                .or_insert_with(|| "must contain only lowercase letters, digits and dashes".to_string());
        }
    }
}

pub fn is_slug(value: &str) -> bool {
    !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Program code filter, e.g. `green_label`.
    pub program: Option<String>,
    /// Case-insensitive substring of the product name or slug.
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
