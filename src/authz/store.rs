use async_trait::async_trait;
use sqlx::SqlitePool;

use super::roles;
use crate::errors::{AppError, Entity};
use crate::models::rbac::{Permission, Role};

/// Roles, permissions and the edges between them and users.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn create_role(&self, name: &str) -> Result<Role, AppError>;
    async fn create_permission(&self, key: &str, description: Option<&str>) -> Result<Permission, AppError>;
    async fn list_roles(&self) -> Result<Vec<Role>, AppError>;
    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError>;
    async fn delete_role(&self, name: &str) -> Result<Role, AppError>;
    async fn delete_permission(&self, key: &str) -> Result<Permission, AppError>;
    async fn assign_permission_to_role(&self, role: &str, key: &str) -> Result<(), AppError>;
    async fn revoke_permission_from_role(&self, role: &str, key: &str) -> Result<(), AppError>;
    async fn assign_role_to_user(&self, user_xid: &str, role: &str) -> Result<(), AppError>;
    async fn revoke_role_from_user(&self, user_xid: &str, role: &str) -> Result<(), AppError>;
    async fn list_user_roles(&self, user_xid: &str) -> Result<Vec<Role>, AppError>;

    /// True when the user is live and holds `admin` or a role linked to `key`.
    /// Unknown, inactive and deleted users get `false`, not an error.
    async fn user_has_permission(&self, user_xid: &str, key: &str) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct SqlitePermissionStore {
    pool: SqlitePool,
}

impl SqlitePermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// Each mutation below is a single statement. A deferred transaction that
// reads before it writes cannot upgrade its lock while the activity listener
// is committing, and SQLite answers that with SQLITE_BUSY immediately.

async fn role_exists(pool: &SqlitePool, name: &str) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ? AND deleted_at IS NULL")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn permission_exists(pool: &SqlitePool, key: &str) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM permissions WHERE key = ? AND deleted_at IS NULL")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn user_id(pool: &SqlitePool, xid: &str) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT id FROM users WHERE xid = ? AND deleted_at IS NULL")
        .bind(xid)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(Entity::User))
}

/// Called when a role/permission edge statement touched no row: either an
/// endpoint is missing or the edge was already in the requested state.
async fn explain_role_permission(pool: &SqlitePool, role: &str, key: &str) -> Result<(), AppError> {
    if !role_exists(pool, role).await? {
        return Err(AppError::NotFound(Entity::Role));
    }
    if !permission_exists(pool, key).await? {
        return Err(AppError::NotFound(Entity::Permission));
    }
    Ok(())
}

async fn explain_user_role(pool: &SqlitePool, xid: &str, role: &str) -> Result<(), AppError> {
    user_id(pool, xid).await?;
    if !role_exists(pool, role).await? {
        return Err(AppError::NotFound(Entity::Role));
    }
    Ok(())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn create_role(&self, name: &str) -> Result<Role, AppError> {
        let id = sqlx::query("INSERT INTO roles (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Role { id, name: name.to_string() })
    }

    async fn create_permission(&self, key: &str, description: Option<&str>) -> Result<Permission, AppError> {
        let id = sqlx::query("INSERT INTO permissions (key, description) VALUES (?, ?)")
            .bind(key)
            .bind(description)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Permission {
            id,
            key: key.to_string(),
            description: description.map(String::from),
        })
    }

    async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        let rows = sqlx::query("SELECT id, name FROM roles WHERE deleted_at IS NULL ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Role::from_row).collect()
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let rows = sqlx::query("SELECT id, key, description FROM permissions WHERE deleted_at IS NULL ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Permission::from_row).collect()
    }

    async fn delete_role(&self, name: &str) -> Result<Role, AppError> {
        if name == roles::ADMIN {
            return Err(AppError::bad_request("the admin role cannot be deleted"));
        }

        let row = sqlx::query("UPDATE roles SET deleted_at = ? WHERE name = ? AND deleted_at IS NULL RETURNING id, name")
            .bind(now())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(Entity::Role))?;

        Role::from_row(&row)
    }

    async fn delete_permission(&self, key: &str) -> Result<Permission, AppError> {
        let row = sqlx::query(
            "UPDATE permissions SET deleted_at = ? WHERE key = ? AND deleted_at IS NULL RETURNING id, key, description",
        )
        .bind(now())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound(Entity::Permission))?;

        Permission::from_row(&row)
    }

    async fn assign_permission_to_role(&self, role: &str, key: &str) -> Result<(), AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
            SELECT r.id, p.id
            FROM roles r, permissions p
            WHERE r.name = ? AND r.deleted_at IS NULL
              AND p.key = ? AND p.deleted_at IS NULL
            "#,
        )
        .bind(role)
        .bind(key)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            explain_role_permission(&self.pool, role, key).await?;
        }
        Ok(())
    }

    async fn revoke_permission_from_role(&self, role: &str, key: &str) -> Result<(), AppError> {
        let removed = sqlx::query(
            r#"
            DELETE FROM role_permissions
            WHERE role_id = (SELECT id FROM roles WHERE name = ? AND deleted_at IS NULL)
              AND permission_id = (SELECT id FROM permissions WHERE key = ? AND deleted_at IS NULL)
            "#,
        )
        .bind(role)
        .bind(key)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if removed == 0 {
            explain_role_permission(&self.pool, role, key).await?;
        }
        Ok(())
    }

    async fn assign_role_to_user(&self, user_xid: &str, role: &str) -> Result<(), AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_roles (user_id, role_id)
            SELECT u.id, r.id
            FROM users u, roles r
            WHERE u.xid = ? AND u.deleted_at IS NULL
              AND r.name = ? AND r.deleted_at IS NULL
            "#,
        )
        .bind(user_xid)
        .bind(role)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            explain_user_role(&self.pool, user_xid, role).await?;
        }
        Ok(())
    }

    async fn revoke_role_from_user(&self, user_xid: &str, role: &str) -> Result<(), AppError> {
        let removed = sqlx::query(
            r#"
            DELETE FROM user_roles
            WHERE user_id = (SELECT id FROM users WHERE xid = ? AND deleted_at IS NULL)
              AND role_id = (SELECT id FROM roles WHERE name = ? AND deleted_at IS NULL)
            "#,
        )
        .bind(user_xid)
        .bind(role)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if removed == 0 {
            explain_user_role(&self.pool, user_xid, role).await?;
        }
        Ok(())
    }

    async fn list_user_roles(&self, user_xid: &str) -> Result<Vec<Role>, AppError> {
        let user_id = user_id(&self.pool, user_xid).await?;

        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ? AND r.deleted_at IS NULL
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Role::from_row).collect()
    }

    async fn user_has_permission(&self, user_xid: &str, key: &str) -> Result<bool, AppError> {
        // One statement so the answer never mixes two edge states.
        let found: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM users u
                JOIN user_roles ur ON ur.user_id = u.id
                JOIN roles r ON r.id = ur.role_id AND r.deleted_at IS NULL
                LEFT JOIN role_permissions rp ON rp.role_id = r.id
                LEFT JOIN permissions p ON p.id = rp.permission_id AND p.deleted_at IS NULL
                WHERE u.xid = ?
                  AND u.deleted_at IS NULL
                  AND u.is_active = 1
                  AND (r.name = ? OR p.key = ?)
            )
            "#,
        )
        .bind(user_xid)
        .bind(roles::ADMIN)
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }
}
