//! Certificates attached to a single product, with no program rule applied.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::app::AppState;
use crate::authz::{permissions, PermissionGate};
use crate::errors::AppResult;
use crate::events::{record, RequestContext};
use crate::jwt::AuthUser;
use crate::models::certification::{CertificateAttributes, CertificationPayload, PageQuery, ProductCertification};
use crate::response::{Envelope, Pagination};
use crate::validation::{Path, Query, ValidatedJson};

/// Paths are relative to the products router.
pub fn routes(gate: &PermissionGate) -> Router<AppState> {
    use permissions::*;

    Router::new()
        .route(
            "/:slug/certifications",
            gate.guarded(PRODUCT_CERTIFICATIONS_READ, get(list_certificates)),
        )
        .route(
            "/:slug/certifications",
            gate.guarded(PRODUCT_CERTIFICATIONS_WRITE, post(create_certificate)),
        )
        .route(
            "/:slug/certifications/:cert_id",
            gate.guarded(PRODUCT_CERTIFICATIONS_WRITE, put(update_certificate)),
        )
        .route(
            "/:slug/certifications/:cert_id",
            gate.guarded(PRODUCT_CERTIFICATIONS_DELETE, delete(delete_certificate)),
        )
}

#[utoipa::path(
    get,
    path = "/api/catalog/products/{slug}/certifications",
    tag = "Product Certifications",
    params(("slug" = String, Path, description = "Product slug"), PageQuery),
    responses(
        (status = 200, description = "Certificates ordered by certification name", body = Vec<ProductCertification>),
        (status = 404, description = "Product not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_certificates(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Envelope<Vec<ProductCertification>>>> {
    let page = state
        .certifications
        .list(&slug, Pagination::new(query.page, query.page_size))
        .await?;
    Ok(Json(page.into_envelope()))
}

#[utoipa::path(
    post,
    path = "/api/catalog/products/{slug}/certifications",
    tag = "Product Certifications",
    params(("slug" = String, Path, description = "Product slug")),
    request_body = CertificationPayload,
    responses(
        (status = 201, description = "Certificate attached", body = ProductCertification),
        (status = 404, description = "Product or certification not found"),
        (status = 409, description = "Product already holds this certification")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(slug): Path<String>,
    ValidatedJson(payload): ValidatedJson<CertificationPayload>,
) -> AppResult<(StatusCode, Json<Envelope<ProductCertification>>)> {
    let created = state
        .certifications
        .create(&slug, payload.certification_id, &payload.attributes)
        .await?;

    record(
        &state.events,
        "created",
        Some(&auth.xid),
        &created,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(created))))
}

#[utoipa::path(
    put,
    path = "/api/catalog/products/{slug}/certifications/{cert_id}",
    tag = "Product Certifications",
    params(
        ("slug" = String, Path, description = "Product slug"),
        ("cert_id" = i64, Path, description = "Certification type id"),
    ),
    request_body = CertificateAttributes,
    responses(
        (status = 200, description = "Certificate updated", body = ProductCertification),
        (status = 404, description = "Product or certificate not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((slug, cert_id)): Path<(String, i64)>,
    ValidatedJson(attributes): ValidatedJson<CertificateAttributes>,
) -> AppResult<Json<Envelope<ProductCertification>>> {
    let updated = state.certifications.update(&slug, cert_id, &attributes).await?;

    record(
        &state.events,
        "updated",
        Some(&auth.xid),
        &updated,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(Envelope::data(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/catalog/products/{slug}/certifications/{cert_id}",
    tag = "Product Certifications",
    params(
        ("slug" = String, Path, description = "Product slug"),
        ("cert_id" = i64, Path, description = "Certification type id"),
    ),
    responses(
        (status = 204, description = "Certificate removed"),
        (status = 404, description = "Product or certificate not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_certificate(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((slug, cert_id)): Path<(String, i64)>,
) -> AppResult<StatusCode> {
    let removed = state.certifications.delete(&slug, cert_id).await?;

    record(
        &state.events,
        "deleted",
        Some(&auth.xid),
        &removed,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
