use std::collections::BTreeMap;
use std::fmt;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::response::{Envelope, ErrorBody};

pub type AppResult<T> = Result<T, AppError>;

/// Field name -> human readable problem, as reported to the client.
pub type FieldErrors = BTreeMap<String, String>;

/// Which kind of record failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Product,
    Certification,
    ProgramCertificate,
    Role,
    Permission,
    User,
    Program,
    Status,
    Company,
    BrandCategory,
    Brand,
}

impl Entity {
    pub fn code(&self) -> &'static str {
        match self {
            Entity::Product => "product_not_found",
            Entity::Certification => "certification_not_found",
            Entity::ProgramCertificate => "program_certificate_not_found",
            Entity::Role => "role_not_found",
            Entity::Permission => "permission_not_found",
            Entity::User => "user_not_found",
            Entity::Program => "program_not_found",
            Entity::Status => "status_not_found",
            Entity::Company => "company_not_found",
            Entity::BrandCategory => "brand_category_not_found",
            Entity::Brand => "brand_not_found",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Entity::Product => "product",
            Entity::Certification => "certification",
            Entity::ProgramCertificate => "certificate",
            Entity::Role => "role",
            Entity::Permission => "permission",
            Entity::User => "user",
            Entity::Program => "program",
            Entity::Status => "status",
            Entity::Company => "company",
            Entity::BrandCategory => "brand category",
            Entity::Brand => "brand",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("product or certification does not match program")]
    ProgramMismatch,
    #[error("validation failed")]
    ValidationFailed(FieldErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(entity: Entity) -> Self {
        Self::NotFound(entity)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut details = FieldErrors::new();
        details.insert(field.into(), message.into());
        Self::ValidationFailed(details)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ProgramMismatch => StatusCode::BAD_REQUEST,
            AppError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(entity) => entity.code(),
            AppError::Conflict(_) => "conflict",
            AppError::ProgramMismatch => "program_mismatch",
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        if let Some(db) = value.as_database_error() {
            if db.is_unique_violation() {
                return Self::Conflict("record already exists".to_string());
            }
            if db.is_foreign_key_violation() {
                return Self::Conflict("record is referenced by or references missing data".to_string());
            }
        }

        Self::Database(value)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        // A missing route parameter is a routing bug, not a client error.
        if rejection.status().is_server_error() {
            Self::Internal(rejection.body_text())
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // 5xx detail stays in the logs.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let details = match &self {
            AppError::ValidationFailed(fields) => serde_json::to_value(fields).ok(),
            _ => None,
        };

        let body = Envelope::<()>::failure(ErrorBody {
            code: self.code().to_string(),
            message,
            details,
        });

        (status, Json(body)).into_response()
    }
}
