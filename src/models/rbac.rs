use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::db::row_parsers::col;
use crate::errors::AppError;
use crate::events::{Loggable, Severity};
use crate::validation::RequestRules;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: i64,
    #[schema(example = "editor")]
    pub name: String,
}

impl Role {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            name: col(row, "name")?,
        })
    }
}

impl Loggable for Role {
    fn entity_type() -> &'static str {
        "role"
    }

    fn subject_id(&self) -> String {
        self.name.clone()
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "editor")]
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

impl RequestRules for RoleCreateRequest {}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: i64,
    #[schema(example = "products.write")]
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    pub fn from_row(row: &SqliteRow) -> Result<Self, AppError> {
        Ok(Self {
            id: col(row, "id")?,
            key: col(row, "key")?,
            description: col(row, "description")?,
        })
    }
}

impl Loggable for Permission {
    fn entity_type() -> &'static str {
        "permission"
    }

    fn subject_id(&self) -> String {
        self.key.clone()
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PermissionCreateRequest {
    #[schema(example = "products.write")]
    #[validate(length(min = 1, max = 150))]
    pub key: String,
    #[schema(example = "Create and update products")]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl RequestRules for PermissionCreateRequest {}

// =============================================================================
// EDGES
// =============================================================================

/// Role -> permission link, identified by names rather than ids.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePermission {
    pub role: String,
    pub permission: String,
}

impl Loggable for RolePermission {
    fn entity_type() -> &'static str {
        "role_permission"
    }

    fn subject_id(&self) -> String {
        format!("{}:{}", self.role, self.permission)
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRole {
    pub user_xid: String,
    pub role: String,
}

impl Loggable for UserRole {
    fn entity_type() -> &'static str {
        "user_role"
    }

    fn subject_id(&self) -> String {
        format!("{}:{}", self.user_xid, self.role)
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignPermissionRequest {
    #[schema(example = "products.write")]
    #[validate(length(min = 1))]
    pub permission: String,
}

impl RequestRules for AssignPermissionRequest {}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignRoleRequest {
    #[schema(example = "editor")]
    #[validate(length(min = 1))]
    pub role: String,
}

impl RequestRules for AssignRoleRequest {}
