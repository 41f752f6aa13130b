use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::db::row_parsers::{col, parse_datetime};
use crate::errors::AppError;
use crate::events::Loggable;
use crate::validation::RequestRules;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    #[schema(example = "0f6c3a9e-3b2f-4a1a-9d7e-2c4b8f0e1a22")]
    pub xid: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for User {
    fn entity_type() -> &'static str {
        "user"
    }

    fn subject_id(&self) -> String {
        self.xid.clone()
    }
}

/// Row as stored, including the credential hash that never leaves the server.
#[derive(Debug, Clone)]
pub struct DbUser {
    pub id: i64,
    pub xid: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    pub const COLUMNS: &'static str = "id, xid, name, email, password_hash, is_active, created_at, updated_at";

    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            xid: col(row, "xid")?,
            name: col(row, "name")?,
            email: col(row, "email")?,
            password_hash: col(row, "password_hash")?,
            is_active: col(row, "is_active")?,
            created_at: parse_datetime(&col::<String>(row, "created_at")?)?,
            updated_at: parse_datetime(&col::<String>(row, "updated_at")?)?,
        })
    }
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            xid: value.xid,
            name: value.name,
            email: value.email,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[schema(example = "ada@example.com")]
    #[validate(email)]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
}

impl RequestRules for RegisterRequest {}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    #[validate(length(min = 1))]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    #[validate(length(min = 1))]
    pub password: String,
}

impl RequestRules for LoginRequest {}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
}
