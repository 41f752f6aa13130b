//! RBAC admin API.
//!
//! Roles, permissions and the edges between them and users. Every mutation
//! is published to the activity log with Critical severity.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};

use crate::app::AppState;
use crate::authz::{permissions, PermissionGate};
use crate::errors::AppError;
use crate::events::{record, RequestContext};
use crate::jwt::AuthUser;
use crate::models::rbac::*;
use crate::response::Envelope;
use crate::validation::{Path, ValidatedJson};

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes(gate: &PermissionGate) -> Router<AppState> {
    use permissions::*;

    Router::new()
        // Roles
        .route("/roles", gate.guarded(RBAC_ROLES_READ, get(list_roles)))
        .route("/roles", gate.guarded(RBAC_ROLES_WRITE, post(create_role)))
        .route("/roles/:name", gate.guarded(RBAC_ROLES_WRITE, delete(delete_role)))
        .route(
            "/roles/:name/permissions",
            gate.guarded(RBAC_ROLES_ASSIGN, post(assign_permission_to_role)),
        )
        .route(
            "/roles/:name/permissions/:key",
            gate.guarded(RBAC_ROLES_ASSIGN, delete(revoke_permission_from_role)),
        )
        // Permissions
        .route("/permissions", gate.guarded(RBAC_PERMISSIONS_READ, get(list_permissions)))
        .route("/permissions", gate.guarded(RBAC_PERMISSIONS_WRITE, post(create_permission)))
        .route("/permissions/:key", gate.guarded(RBAC_PERMISSIONS_WRITE, delete(delete_permission)))
        // User role assignments
        .route("/users/:xid/roles", gate.guarded(RBAC_ROLES_READ, get(list_user_roles)))
        .route("/users/:xid/roles", gate.guarded(RBAC_USERS_ASSIGN_ROLE, post(assign_role_to_user)))
        .route(
            "/users/:xid/roles/:name",
            gate.guarded(RBAC_USERS_ASSIGN_ROLE, delete(revoke_role_from_user)),
        )
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

/// List live roles, alphabetically
#[utoipa::path(
    get,
    path = "/api/rbac/roles",
    tag = "RBAC",
    responses(
        (status = 200, description = "List of roles", body = Vec<Role>),
        (status = 403, description = "Missing rbac.roles.read"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Role>>>, AppError> {
    let roles = state.permissions.list_roles().await?;
    Ok(Json(Envelope::data(roles)))
}

/// Create a new role
#[utoipa::path(
    post,
    path = "/api/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<RoleCreateRequest>,
) -> Result<(StatusCode, Json<Envelope<Role>>), AppError> {
    let role = state.permissions.create_role(req.name.trim()).await?;

    record(
        &state.events,
        "created",
        Some(&auth.xid),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(role))))
}

/// Soft-delete a role
#[utoipa::path(
    delete,
    path = "/api/rbac/roles/{name}",
    tag = "RBAC",
    params(("name" = String, Path, description = "Role name")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 400, description = "The admin role cannot be deleted"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let role = state.permissions.delete_role(&name).await?;

    record(
        &state.events,
        "deleted",
        Some(&auth.xid),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Link a permission to a role. Re-linking is a no-op.
#[utoipa::path(
    post,
    path = "/api/rbac/roles/{name}/permissions",
    tag = "RBAC",
    params(("name" = String, Path, description = "Role name")),
    request_body = AssignPermissionRequest,
    responses(
        (status = 204, description = "Permission assigned"),
        (status = 404, description = "Role or permission not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_permission_to_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(name): Path<String>,
    ValidatedJson(req): ValidatedJson<AssignPermissionRequest>,
) -> Result<StatusCode, AppError> {
    state
        .permissions
        .assign_permission_to_role(&name, &req.permission)
        .await?;

    let edge = RolePermission {
        role: name,
        permission: req.permission,
    };
    record(
        &state.events,
        "assigned",
        Some(&auth.xid),
        &edge,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/rbac/roles/{name}/permissions/{key}",
    tag = "RBAC",
    params(
        ("name" = String, Path, description = "Role name"),
        ("key" = String, Path, description = "Permission key"),
    ),
    responses(
        (status = 204, description = "Permission revoked"),
        (status = 404, description = "Role or permission not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_permission_from_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((name, key)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.permissions.revoke_permission_from_role(&name, &key).await?;

    let edge = RolePermission {
        role: name,
        permission: key,
    };
    record(
        &state.events,
        "revoked",
        Some(&auth.xid),
        &edge,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PERMISSION ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/rbac/permissions",
    tag = "RBAC",
    responses((status = 200, description = "List of permissions", body = Vec<Permission>)),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Permission>>>, AppError> {
    let permissions = state.permissions.list_permissions().await?;
    Ok(Json(Envelope::data(permissions)))
}

#[utoipa::path(
    post,
    path = "/api/rbac/permissions",
    tag = "RBAC",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 409, description = "Permission key already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<PermissionCreateRequest>,
) -> Result<(StatusCode, Json<Envelope<Permission>>), AppError> {
    let permission = state
        .permissions
        .create_permission(req.key.trim(), req.description.as_deref())
        .await?;

    record(
        &state.events,
        "created",
        Some(&auth.xid),
        &permission,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(permission))))
}

#[utoipa::path(
    delete,
    path = "/api/rbac/permissions/{key}",
    tag = "RBAC",
    params(("key" = String, Path, description = "Permission key")),
    responses(
        (status = 204, description = "Permission deleted"),
        (status = 404, description = "Permission not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    let permission = state.permissions.delete_permission(&key).await?;

    record(
        &state.events,
        "deleted",
        Some(&auth.xid),
        &permission,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// USER ROLE ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/rbac/users/{xid}/roles",
    tag = "RBAC",
    params(("xid" = String, Path, description = "User xid")),
    responses(
        (status = 200, description = "Roles held by the user", body = Vec<Role>),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_user_roles(
    State(state): State<AppState>,
    Path(xid): Path<String>,
) -> Result<Json<Envelope<Vec<Role>>>, AppError> {
    let roles = state.permissions.list_user_roles(&xid).await?;
    Ok(Json(Envelope::data(roles)))
}

#[utoipa::path(
    post,
    path = "/api/rbac/users/{xid}/roles",
    tag = "RBAC",
    params(("xid" = String, Path, description = "User xid")),
    request_body = AssignRoleRequest,
    responses(
        (status = 204, description = "Role assigned"),
        (status = 404, description = "User or role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role_to_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(xid): Path<String>,
    ValidatedJson(req): ValidatedJson<AssignRoleRequest>,
) -> Result<StatusCode, AppError> {
    state.permissions.assign_role_to_user(&xid, &req.role).await?;

    let edge = UserRole {
        user_xid: xid,
        role: req.role,
    };
    record(
        &state.events,
        "assigned",
        Some(&auth.xid),
        &edge,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/rbac/users/{xid}/roles/{name}",
    tag = "RBAC",
    params(
        ("xid" = String, Path, description = "User xid"),
        ("name" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 204, description = "Role revoked"),
        (status = 404, description = "User or role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role_from_user(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((xid, name)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.permissions.revoke_role_from_user(&xid, &name).await?;

    let edge = UserRole {
        user_xid: xid,
        role: name,
    };
    record(
        &state.events,
        "revoked",
        Some(&auth.xid),
        &edge,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
