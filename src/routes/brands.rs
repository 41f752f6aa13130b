//! Companies, brand categories and brands: the owners a product row points at.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, PermissionGate};
use crate::errors::{AppError, AppResult, Entity, FieldErrors};
use crate::events::{record, Loggable, RequestContext};
use crate::jwt::AuthUser;
use crate::models::brand::{Brand, BrandCategory, BrandPayload, BrandQuery, Company, DirectoryPayload};
use crate::response::Envelope;
use crate::validation::{Path, Query, ValidatedJson};

pub fn routes(gate: &PermissionGate) -> Router<AppState> {
    use permissions::*;

    Router::new()
        .route("/companies", gate.guarded(COMPANIES_READ, get(list_companies)))
        .route("/companies", gate.guarded(COMPANIES_WRITE, post(create_company)))
        .route("/companies/:id", gate.guarded(COMPANIES_READ, get(get_company)))
        .route("/companies/:id", gate.guarded(COMPANIES_WRITE, put(update_company)))
        .route("/companies/:id", gate.guarded(COMPANIES_DELETE, delete(delete_company)))
        .route("/brand-categories", gate.guarded(BRAND_CATEGORIES_READ, get(list_brand_categories)))
        .route("/brand-categories", gate.guarded(BRAND_CATEGORIES_WRITE, post(create_brand_category)))
        .route("/brand-categories/:id", gate.guarded(BRAND_CATEGORIES_READ, get(get_brand_category)))
        .route("/brand-categories/:id", gate.guarded(BRAND_CATEGORIES_WRITE, put(update_brand_category)))
        .route("/brand-categories/:id", gate.guarded(BRAND_CATEGORIES_DELETE, delete(delete_brand_category)))
        .route("/brands", gate.guarded(BRANDS_READ, get(list_brands)))
        .route("/brands", gate.guarded(BRANDS_WRITE, post(create_brand)))
        .route("/brands/:id", gate.guarded(BRANDS_READ, get(get_brand)))
        .route("/brands/:id", gate.guarded(BRANDS_WRITE, put(update_brand)))
        .route("/brands/:id", gate.guarded(BRANDS_DELETE, delete(delete_brand)))
}

// Companies and brand categories are both (id, name, slug) tables.
#[derive(Clone, Copy)]
struct Directory {
    table: &'static str,
    entity: Entity,
}

const COMPANIES: Directory = Directory {
    table: "companies",
    entity: Entity::Company,
};

const BRAND_CATEGORIES: Directory = Directory {
    table: "brand_categories",
    entity: Entity::BrandCategory,
};

impl Directory {
    async fn list<T>(self, pool: &SqlitePool, from_row: fn(&sqlx::sqlite::SqliteRow) -> AppResult<T>) -> AppResult<Vec<T>> {
        let sql = format!("SELECT id, name, slug FROM {} ORDER BY name, id", self.table);
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        rows.iter().map(from_row).collect()
    }

    async fn fetch<T>(
        self,
        pool: &SqlitePool,
        id: i64,
        from_row: fn(&sqlx::sqlite::SqliteRow) -> AppResult<T>,
    ) -> AppResult<T> {
        let sql = format!("SELECT id, name, slug FROM {} WHERE id = ?", self.table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound(self.entity))?;
        from_row(&row)
    }

    async fn exists(self, pool: &SqlitePool, id: i64) -> AppResult<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = ?)", self.table);
        let found: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;
        Ok(found != 0)
    }

    async fn insert(self, pool: &SqlitePool, payload: &DirectoryPayload) -> AppResult<i64> {
        let sql = format!("INSERT INTO {} (name, slug) VALUES (?, ?)", self.table);
        let result = sqlx::query(&sql)
            .bind(&payload.name)
            .bind(&payload.slug)
            .execute(pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update(self, pool: &SqlitePool, id: i64, payload: &DirectoryPayload) -> AppResult<()> {
        let sql = format!("UPDATE {} SET name = ?, slug = ? WHERE id = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(&payload.name)
            .bind(&payload.slug)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(self.entity));
        }
        Ok(())
    }

    /// Rows still owning brands or products fail with `Conflict`.
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
// COMPANIES
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/catalog/companies",
    tag = "Brands",
    responses((status = 200, description = "Companies by name", body = Vec<Company>)),
    security(("bearerAuth" = []))
)]
pub async fn list_companies(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<Company>>>> {
    let companies = COMPANIES.list(&state.pool, Company::from_row).await?;
    Ok(Json(Envelope::data(companies)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/companies/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company", body = Company),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_company(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Envelope<Company>>> {
    let company = COMPANIES.fetch(&state.pool, id, Company::from_row).await?;
    Ok(Json(Envelope::data(company)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/companies",
    tag = "Brands",
    request_body = DirectoryPayload,
    responses(
        (status = 201, description = "Company created", body = Company),
        (status = 409, description = "Slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_company(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<DirectoryPayload>,
) -> AppResult<(StatusCode, Json<Envelope<Company>>)> {
    let id = COMPANIES.insert(&state.pool, &payload).await?;
    let company = COMPANIES.fetch(&state.pool, id, Company::from_row).await?;

    audit(&state, "created", &auth, &headers, &company, None);
    Ok((StatusCode::CREATED, Json(Envelope::data(company))))
}

#[utoipa::path(
    put,
    path = "/api/catalog/companies/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Company id")),
    request_body = DirectoryPayload,
    responses(
        (status = 200, description = "Company updated", body = Company),
        (status = 404, description = "Company not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<DirectoryPayload>,
) -> AppResult<Json<Envelope<Company>>> {
    let old = COMPANIES.fetch(&state.pool, id, Company::from_row).await?;
    COMPANIES.update(&state.pool, id, &payload).await?;
    let company = COMPANIES.fetch(&state.pool, id, Company::from_row).await?;

    audit(&state, "updated", &auth, &headers, &company, Some(&old));
    Ok(Json(Envelope::data(company)))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/companies/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Company id")),
    responses(
        (status = 204, description = "Company deleted"),
        (status = 404, description = "Company not found"),
        (status = 409, description = "Company still owns brands or products")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_company(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let company = COMPANIES.fetch(&state.pool, id, Company::from_row).await?;
    COMPANIES.delete(&state.pool, id).await?;

    audit(&state, "deleted", &auth, &headers, &company, None);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// BRAND CATEGORIES
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/catalog/brand-categories",
    tag = "Brands",
    responses((status = 200, description = "Brand categories by name", body = Vec<BrandCategory>)),
    security(("bearerAuth" = []))
)]
pub async fn list_brand_categories(State(state): State<AppState>) -> AppResult<Json<Envelope<Vec<BrandCategory>>>> {
    let categories = BRAND_CATEGORIES.list(&state.pool, BrandCategory::from_row).await?;
    Ok(Json(Envelope::data(categories)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/brand-categories/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Brand category id")),
    responses(
        (status = 200, description = "Brand category", body = BrandCategory),
        (status = 404, description = "Brand category not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_brand_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Envelope<BrandCategory>>> {
    let category = BRAND_CATEGORIES.fetch(&state.pool, id, BrandCategory::from_row).await?;
    Ok(Json(Envelope::data(category)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/brand-categories",
    tag = "Brands",
    request_body = DirectoryPayload,
    responses(
        (status = 201, description = "Brand category created", body = BrandCategory),
        (status = 409, description = "Slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_brand_category(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<DirectoryPayload>,
) -> AppResult<(StatusCode, Json<Envelope<BrandCategory>>)> {
    let id = BRAND_CATEGORIES.insert(&state.pool, &payload).await?;
    let category = BRAND_CATEGORIES.fetch(&state.pool, id, BrandCategory::from_row).await?;

    audit(&state, "created", &auth, &headers, &category, None);
    Ok((StatusCode::CREATED, Json(Envelope::data(category))))
}

#[utoipa::path(
    put,
    path = "/api/catalog/brand-categories/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Brand category id")),
    request_body = DirectoryPayload,
    responses(
        (status = 200, description = "Brand category updated", body = BrandCategory),
        (status = 404, description = "Brand category not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_brand_category(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<DirectoryPayload>,
) -> AppResult<Json<Envelope<BrandCategory>>> {
    let old = BRAND_CATEGORIES.fetch(&state.pool, id, BrandCategory::from_row).await?;
    BRAND_CATEGORIES.update(&state.pool, id, &payload).await?;
    let category = BRAND_CATEGORIES.fetch(&state.pool, id, BrandCategory::from_row).await?;

    audit(&state, "updated", &auth, &headers, &category, Some(&old));
    Ok(Json(Envelope::data(category)))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/brand-categories/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Brand category id")),
    responses(
        (status = 204, description = "Brand category deleted"),
        (status = 404, description = "Brand category not found"),
        (status = 409, description = "Brand category still in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_brand_category(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let category = BRAND_CATEGORIES.fetch(&state.pool, id, BrandCategory::from_row).await?;
    BRAND_CATEGORIES.delete(&state.pool, id).await?;

    audit(&state, "deleted", &auth, &headers, &category, None);
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// BRANDS
// =============================================================================

async fn fetch_brand(pool: &SqlitePool, id: i64) -> AppResult<Brand> {
    let sql = format!("{} WHERE b.id = ?", Brand::SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(Entity::Brand))?;
    Brand::from_row(&row)
}

/// Unknown owners are field errors, reported together.
async fn ensure_owners(pool: &SqlitePool, payload: &BrandPayload) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if !COMPANIES.exists(pool, payload.company_id).await? {
        errors.insert("company_id".to_string(), "unknown company".to_string());
    }
    if !BRAND_CATEGORIES.exists(pool, payload.brand_category_id).await? {
        errors.insert("brand_category_id".to_string(), "unknown brand category".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(errors))
    }
}

#[utoipa::path(
    get,
    path = "/api/catalog/brands",
    tag = "Brands",
    params(BrandQuery),
    responses((status = 200, description = "Brands by name", body = Vec<Brand>)),
    security(("bearerAuth" = []))
)]
pub async fn list_brands(
    State(state): State<AppState>,
    Query(query): Query<BrandQuery>,
) -> AppResult<Json<Envelope<Vec<Brand>>>> {
    let sql = format!(
        "{} WHERE (? IS NULL OR b.company_id = ?) AND (? IS NULL OR b.brand_category_id = ?) ORDER BY b.name, b.id",
        Brand::SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(query.company_id)
        .bind(query.company_id)
        .bind(query.brand_category_id)
        .bind(query.brand_category_id)
        .fetch_all(&state.pool)
        .await?;

    let brands = rows.iter().map(Brand::from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(Envelope::data(brands)))
}

#[utoipa::path(
    get,
    path = "/api/catalog/brands/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Brand id")),
    responses(
        (status = 200, description = "Brand", body = Brand),
        (status = 404, description = "Brand not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_brand(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Envelope<Brand>>> {
    let brand = fetch_brand(&state.pool, id).await?;
    Ok(Json(Envelope::data(brand)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/brands",
    tag = "Brands",
    request_body = BrandPayload,
    responses(
        (status = 201, description = "Brand created", body = Brand),
        (status = 400, description = "Invalid input or unknown owner"),
        (status = 409, description = "Slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_brand(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<BrandPayload>,
) -> AppResult<(StatusCode, Json<Envelope<Brand>>)> {
    ensure_owners(&state.pool, &payload).await?;

    let id = sqlx::query("INSERT INTO brands (company_id, brand_category_id, name, slug) VALUES (?, ?, ?, ?)")
        .bind(payload.company_id)
        .bind(payload.brand_category_id)
        .bind(&payload.name)
        .bind(&payload.slug)
        .execute(&state.pool)
        .await?
        .last_insert_rowid();

    let brand = fetch_brand(&state.pool, id).await?;

    audit(&state, "created", &auth, &headers, &brand, None);
    Ok((StatusCode::CREATED, Json(Envelope::data(brand))))
}

#[utoipa::path(
    put,
    path = "/api/catalog/brands/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Brand id")),
    request_body = BrandPayload,
    responses(
        (status = 200, description = "Brand updated", body = Brand),
        (status = 404, description = "Brand not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_brand(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<BrandPayload>,
) -> AppResult<Json<Envelope<Brand>>> {
    let old = fetch_brand(&state.pool, id).await?;
    ensure_owners(&state.pool, &payload).await?;

    sqlx::query("UPDATE brands SET company_id = ?, brand_category_id = ?, name = ?, slug = ? WHERE id = ?")
        .bind(payload.company_id)
        .bind(payload.brand_category_id)
        .bind(&payload.name)
        .bind(&payload.slug)
        .bind(id)
        .execute(&state.pool)
        .await?;

    let brand = fetch_brand(&state.pool, id).await?;

    audit(&state, "updated", &auth, &headers, &brand, Some(&old));
    Ok(Json(Envelope::data(brand)))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/brands/{id}",
    tag = "Brands",
    params(("id" = i64, Path, description = "Brand id")),
    responses(
        (status = 204, description = "Brand deleted"),
        (status = 404, description = "Brand not found"),
        (status = 409, description = "Brand still has products")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_brand(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let brand = fetch_brand(&state.pool, id).await?;
    sqlx::query("DELETE FROM brands WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    audit(&state, "deleted", &auth, &headers, &brand, None);
    Ok(StatusCode::NO_CONTENT)
}
