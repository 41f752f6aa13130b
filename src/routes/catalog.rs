//! Catalog lookups: programs, certification statuses and certification types.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::authz::{permissions, PermissionGate};
use crate::errors::{AppError, AppResult, Entity};
use crate::events::{record, Loggable, RequestContext};
use crate::jwt::AuthUser;
use crate::models::catalog::{
    Certification, CertificationCreateRequest, CertificationStatus, LookupPayload, Program,
};
use crate::response::Envelope;
use crate::validation::{Path, Query, ValidatedJson};

pub fn routes(gate: &PermissionGate) -> Router<AppState> {
    use permissions::*;

    Router::new()
        .route("/programs", gate.guarded(CATALOG_PROGRAMS_READ, get(list_programs)))
        .route("/programs", gate.guarded(CATALOG_PROGRAMS_WRITE, post(create_program)))
        .route("/programs/:id", gate.guarded(CATALOG_PROGRAMS_WRITE, put(update_program)))
        .route("/programs/:id", gate.guarded(CATALOG_PROGRAMS_DELETE, delete(delete_program)))
        .route("/statuses", gate.guarded(CATALOG_PROGRAMS_READ, get(list_statuses)))
        .route("/statuses", gate.guarded(CATALOG_PROGRAMS_WRITE, post(create_status)))
        .route("/statuses/:id", gate.guarded(CATALOG_PROGRAMS_WRITE, put(update_status)))
        .route("/statuses/:id", gate.guarded(CATALOG_PROGRAMS_DELETE, delete(delete_status)))
        .route("/certifications", gate.guarded(CATALOG_PROGRAMS_READ, get(list_certifications)))
        .route("/certifications", gate.guarded(CATALOG_PROGRAMS_WRITE, post(create_certification)))
}

// Programs and statuses share one shape, so they share the SQL too.
#[derive(Clone, Copy)]
struct Lookup {
    table: &'static str,
    entity: Entity,
}

const PROGRAMS: Lookup = Lookup {
    table: "lkp_product_program",
    entity: Entity::Program,
};

const STATUSES: Lookup = Lookup {
    table: "lkp_cert_status",
    entity: Entity::Status,
};

impl Lookup {
    async fn list<T>(self, pool: &SqlitePool, from_row: fn(&sqlx::sqlite::SqliteRow) -> AppResult<T>) -> AppResult<Vec<T>> {
        let sql = format!("SELECT id, code, name FROM {} ORDER BY id", self.table);
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        rows.iter().map(from_row).collect()
    }

    async fn fetch<T>(
        self,
        pool: &SqlitePool,
        id: i64,
        from_row: fn(&sqlx::sqlite::SqliteRow) -> AppResult<T>,
    ) -> AppResult<T> {
        let sql = format!("SELECT id, code, name FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound(self.entity))?;
        from_row(&row)
    }

    async fn insert(self, pool: &SqlitePool, payload: &LookupPayload) -> AppResult<i64> {
        let result = match payload.id {
            Some(id) => {
                let sql = format!("INSERT INTO {} (id, code, name) VALUES (?, ?, ?)", self.table);
                sqlx::query(&sql)
                    .bind(id)
                    .bind(&payload.code)
                    .bind(&payload.name)
                    .execute(pool)
                    .await?
            }
            None => {
                let sql = format!("INSERT INTO {} (code, name) VALUES (?, ?)", self.table);
                sqlx::query(&sql)
                    .bind(&payload.code)
                    .bind(&payload.name)
                    .execute(pool)
                    .await?
            }
        };
        Ok(result.last_insert_rowid())
    }

    async fn update(self, pool: &SqlitePool, id: i64, payload: &LookupPayload) -> AppResult<()> {
        let sql = format!("UPDATE {} SET code = ?, name = ? WHERE id = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(&payload.code)
            .bind(&payload.name)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(self.entity));
        }
        Ok(())
    }

    /// Rows still referenced elsewhere fail with `Conflict`.
    async fn delete(self, pool: &SqlitePool, id: i64) -> AppResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let result = sqlx::query(&sql).bind(id).execute(pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(self.entity));
        }
        Ok(())
    }
}

fn audit<T: Loggable>(state: &AppState, action: &str, auth: &AuthUser, headers: &HeaderMap, entity: &T, old: Option<&T>) {
    record(
        &state.events,
        action,
        Some(&auth.xid),
        entity,
        old,
        Some(RequestContext::from_headers(headers)),
    );
}

// =============================================================================
// PROGRAMS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/catalog/programs",
    tag = "Catalog",
    responses((status = 200, description = "Certification programs", body = Vec<Program>)),
    security(("bearerAuth" = []))
)]
pub async fn list_programs(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<Program>>>> {
    let programs = PROGRAMS.list(&state.pool, Program::from_row).await?;
    Ok(Json(Envelope::data(programs)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/programs",
    tag = "Catalog",
    request_body = LookupPayload,
    responses(
        (status = 201, description = "Program created", body = Program),
        (status = 409, description = "Code or id already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_program(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<LookupPayload>,
) -> AppResult<(StatusCode, Json<Envelope<Program>>)> {
    let id = PROGRAMS.insert(&state.pool, &payload).await?;
    let program = PROGRAMS.fetch(&state.pool, id, Program::from_row).await?;

    audit(&state, "created", &auth, &headers, &program, None);
    Ok((StatusCode::CREATED, Json(Envelope::data(program))))
}

#[utoipa::path(
    put,
    path = "/api/catalog/programs/{id}",
    tag = "Catalog",
    params(("id" = i64, Path, description = "Program id")),
    request_body = LookupPayload,
    responses(
        (status = 200, description = "Program updated", body = Program),
        (status = 404, description = "Program not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_program(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<LookupPayload>,
) -> AppResult<Json<Envelope<Program>>> {
    let old = PROGRAMS.fetch(&state.pool, id, Program::from_row).await?;
    PROGRAMS.update(&state.pool, id, &payload).await?;
    let program = PROGRAMS.fetch(&state.pool, id, Program::from_row).await?;

    audit(&state, "updated", &auth, &headers, &program, Some(&old));
    Ok(Json(Envelope::data(program)))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/programs/{id}",
    tag = "Catalog",
    params(("id" = i64, Path, description = "Program id")),
    responses(
        (status = 204, description = "Program deleted"),
        (status = 404, description = "Program not found"),
        (status = 409, description = "Program still referenced")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_program(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let program = PROGRAMS.fetch(&state.pool, id, Program::from_row).await?;
    PROGRAMS.delete(&state.pool, id).await?;

    audit(&state, "deleted", &auth, &headers, &program, None);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// STATUSES
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/catalog/statuses",
    tag = "Catalog",
    responses((status = 200, description = "Certification statuses", body = Vec<CertificationStatus>)),
    security(("bearerAuth" = []))
)]
pub async fn list_statuses(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<CertificationStatus>>>> {
    let statuses = STATUSES.list(&state.pool, CertificationStatus::from_row).await?;
    Ok(Json(Envelope::data(statuses)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/statuses",
    tag = "Catalog",
    request_body = LookupPayload,
    responses(
        (status = 201, description = "Status created", body = CertificationStatus),
        (status = 409, description = "Code or id already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<LookupPayload>,
) -> AppResult<(StatusCode, Json<Envelope<CertificationStatus>>)> {
    let id = STATUSES.insert(&state.pool, &payload).await?;
    let status = STATUSES.fetch(&state.pool, id, CertificationStatus::from_row).await?;

    audit(&state, "created", &auth, &headers, &status, None);
    Ok((StatusCode::CREATED, Json(Envelope::data(status))))
}

#[utoipa::path(
    put,
    path = "/api/catalog/statuses/{id}",
    tag = "Catalog",
    params(("id" = i64, Path, description = "Status id")),
    request_body = LookupPayload,
    responses(
        (status = 200, description = "Status updated", body = CertificationStatus),
        (status = 404, description = "Status not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<LookupPayload>,
) -> AppResult<Json<Envelope<CertificationStatus>>> {
    let old = STATUSES.fetch(&state.pool, id, CertificationStatus::from_row).await?;
    STATUSES.update(&state.pool, id, &payload).await?;
    let status = STATUSES.fetch(&state.pool, id, CertificationStatus::from_row).await?;

    audit(&state, "updated", &auth, &headers, &status, Some(&old));
    Ok(Json(Envelope::data(status)))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/statuses/{id}",
    tag = "Catalog",
    params(("id" = i64, Path, description = "Status id")),
    responses(
        (status = 204, description = "Status deleted"),
        (status = 404, description = "Status not found"),
        (status = 409, description = "Status still referenced")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let status = STATUSES.fetch(&state.pool, id, CertificationStatus::from_row).await?;
    STATUSES.delete(&state.pool, id).await?;

    audit(&state, "deleted", &auth, &headers, &status, None);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CERTIFICATION TYPES
// =============================================================================

const CERTIFICATION_SELECT: &str = r#"
    SELECT c.id AS c_id, c.name AS c_name, c.image AS c_image,
           prog.id AS prog_id, prog.code AS prog_code, prog.name AS prog_name
    FROM certifications c
    JOIN lkp_product_program prog ON prog.id = c.program_id
"#;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CertificationQuery {
    /// Program code filter, e.g. `green_toll`.
    pub program: Option<String>,
}

async fn fetch_certification(pool: &SqlitePool, id: i64) -> AppResult<Certification> {
    let sql = format!("{CERTIFICATION_SELECT} WHERE c.id = ?");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(Entity::Certification))?;
    Certification::from_row(&row)
}

#[utoipa::path(
    get,
    path = "/api/catalog/certifications",
    tag = "Catalog",
    params(CertificationQuery),
    responses((status = 200, description = "Certification types", body = Vec<Certification>)),
    security(("bearerAuth" = []))
)]
pub async fn list_certifications(
    State(state): State<AppState>,
    Query(query): Query<CertificationQuery>,
) -> AppResult<Json<Envelope<Vec<Certification>>>> {
    let program = query.program.as_deref().map(str::trim).filter(|p| !p.is_empty());

    let rows = match program {
        Some(code) => {
            let sql = format!("{CERTIFICATION_SELECT} WHERE prog.code = ? ORDER BY c.name, c.id");
            sqlx::query(&sql).bind(code).fetch_all(&state.pool).await?
        }
        None => {
            let sql = format!("{CERTIFICATION_SELECT} ORDER BY c.name, c.id");
            sqlx::query(&sql).fetch_all(&state.pool).await?
        }
    };

    let certifications = rows
        .iter()
        .map(Certification::from_row)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(Envelope::data(certifications)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/certifications",
    tag = "Catalog",
    request_body = CertificationCreateRequest,
    responses(
        (status = 201, description = "Certification type created", body = Certification),
        (status = 404, description = "Program not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_certification(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<CertificationCreateRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Certification>>)> {
    PROGRAMS.fetch(&state.pool, payload.program_id, Program::from_row).await?;

    let id = sqlx::query("INSERT INTO certifications (program_id, name, image) VALUES (?, ?, ?)")
        .bind(payload.program_id)
        .bind(&payload.name)
        .bind(&payload.image)
        .execute(&state.pool)
        .await?
        .last_insert_rowid();

    let certification = fetch_certification(&state.pool, id).await?;

    audit(&state, "created", &auth, &headers, &certification, None);
    Ok((StatusCode::CREATED, Json(Envelope::data(certification))))
}
