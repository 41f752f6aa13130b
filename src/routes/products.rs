use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app::AppState;
use crate::authz::{permissions, PermissionGate};
use crate::certification::like_pattern;
use crate::db::row_parsers::json_object_text;
use crate::errors::{AppError, AppResult, Entity};
use crate::events::{record, RequestContext};
use crate::jwt::AuthUser;
use crate::models::product::{Product, ProductPayload, ProductQuery};
use crate::response::{Envelope, Page, Pagination};
use crate::validation::{Path, Query, ValidatedJson};

pub fn routes(gate: &PermissionGate) -> Router<AppState> {
    use permissions::*;

    Router::new()
        .route("/", gate.guarded(PRODUCTS_READ, get(list_products)))
        .route("/", gate.guarded(PRODUCTS_WRITE, post(create_product)))
        .route("/:slug", gate.guarded(PRODUCTS_READ, get(get_product)))
        .route("/:slug", gate.guarded(PRODUCTS_WRITE, put(update_product)))
        .route("/:slug", gate.guarded(PRODUCTS_DELETE, delete(delete_product)))
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, program: Option<&str>, search: Option<&str>) {
    qb.push(" WHERE 1 = 1");

    if let Some(code) = program {
        qb.push(" AND prog.code = ");
        qb.push_bind(code.to_string());
    }

    if let Some(term) = search {
        let pattern = like_pattern(term);
        qb.push(" AND (p.name LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR p.slug LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
}

async fn fetch_product(pool: &SqlitePool, slug: &str) -> AppResult<Product> {
    let sql = format!("{} WHERE p.slug = ?", Product::SELECT);
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(Entity::Product))?;
    Product::from_row(&row)
}

async fn ensure_program(pool: &SqlitePool, program_id: i64) -> AppResult<()> {
    let found: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM lkp_product_program WHERE id = ?)")
        .bind(program_id)
        .fetch_one(pool)
        .await?;

    if found == 0 {
        return Err(AppError::field("program_id", "unknown program"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/catalog/products",
    tag = "Products",
    params(ProductQuery),
    responses((status = 200, description = "Page of products", body = Vec<Product>)),
    security(("bearerAuth" = []))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<Envelope<Vec<Product>>>> {
    let pagination = Pagination::new(query.page, query.page_size);
    let program = query.program.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut count = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM products p JOIN lkp_product_program prog ON prog.id = p.program_id",
    );
    push_filters(&mut count, program, search);
    let total = count.build_query_scalar::<i64>().fetch_one(&state.pool).await?;

    let items = if pagination.is_past_end(total) {
        Vec::new()
    } else {
        let mut page = QueryBuilder::<Sqlite>::new(Product::SELECT);
        push_filters(&mut page, program, search);
        page.push(" ORDER BY p.updated_at DESC, p.id DESC LIMIT ");
        page.push_bind(pagination.page_size);
        page.push(" OFFSET ");
        page.push_bind(pagination.offset());

        let rows = page.build().fetch_all(&state.pool).await?;
        rows.iter().map(Product::from_row).collect::<AppResult<Vec<_>>>()?
    };

    let page = Page {
        items,
        total,
        page: pagination.page,
        page_size: pagination.page_size,
    };
    Ok(Json(page.into_envelope()))
}

#[utoipa::path(
    get,
    path = "/api/catalog/products/{slug}",
    tag = "Products",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_product(State(state): State<AppState>, Path(slug): Path<String>) -> AppResult<Json<Envelope<Product>>> {
    let product = fetch_product(&state.pool, &slug).await?;
    Ok(Json(Envelope::data(product)))
}

#[utoipa::path(
    post,
    path = "/api/catalog/products",
    tag = "Products",
    request_body = ProductPayload,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<ProductPayload>,
) -> AppResult<(StatusCode, Json<Envelope<Product>>)> {
    ensure_program(&state.pool, payload.program_id).await?;

    sqlx::query(
        r#"
        INSERT INTO products (company_id, brand_id, program_id, name, slug, attributes, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.company_id)
    .bind(payload.brand_id)
    .bind(payload.program_id)
    .bind(&payload.name)
    .bind(&payload.slug)
    .bind(json_object_text(payload.attributes.as_ref()))
    .bind(payload.is_active.unwrap_or(true))
    .execute(&state.pool)
    .await?;

    let product = fetch_product(&state.pool, &payload.slug).await?;

    record(
        &state.events,
        "created",
        Some(&auth.xid),
        &product,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(product))))
}

/// Replaces every mutable field, including the slug.
#[utoipa::path(
    put,
    path = "/api/catalog/products/{slug}",
    tag = "Products",
    params(("slug" = String, Path, description = "Product slug")),
    request_body = ProductPayload,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found"),
        (status = 409, description = "New slug already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(slug): Path<String>,
    ValidatedJson(payload): ValidatedJson<ProductPayload>,
) -> AppResult<Json<Envelope<Product>>> {
    let old = fetch_product(&state.pool, &slug).await?;
    ensure_program(&state.pool, payload.program_id).await?;

    sqlx::query(
        r#"
        UPDATE products
        SET company_id = ?, brand_id = ?, program_id = ?, name = ?, slug = ?, attributes = ?,
            is_active = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ?
        "#,
    )
    .bind(payload.company_id)
    .bind(payload.brand_id)
    .bind(payload.program_id)
    .bind(&payload.name)
    .bind(&payload.slug)
    .bind(json_object_text(payload.attributes.as_ref()))
    .bind(payload.is_active.unwrap_or(old.is_active))
    .bind(old.id)
    .execute(&state.pool)
    .await?;

    let product = fetch_product(&state.pool, &payload.slug).await?;

    record(
        &state.events,
        "updated",
        Some(&auth.xid),
        &product,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(Envelope::data(product)))
}

/// Hard delete. Certificates attached to the product go with it.
#[utoipa::path(
    delete,
    path = "/api/catalog/products/{slug}",
    tag = "Products",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    let product = fetch_product(&state.pool, &slug).await?;

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(product.id)
        .execute(&state.pool)
        .await?;

    record(
        &state.events,
        "deleted",
        Some(&auth.xid),
        &product,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
