//! Program-scoped certificate routes.
//!
//! One router is mounted per configured program. The [`ProgramScope`] for
//! that program is supplied as a request extension.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};

use crate::app::AppState;
use crate::authz::{permissions, PermissionGate};
use crate::certification::ProgramScope;
use crate::errors::AppResult;
use crate::events::{record, RequestContext};
use crate::jwt::AuthUser;
use crate::models::certification::{
    CertificateAttributes, ProgramCertificate, ProgramCertificatePayload, ProgramCertificateQuery,
};
use crate::response::{Envelope, Pagination};
use crate::validation::{Path, Query, ValidatedJson};

pub fn routes(gate: &PermissionGate, scope: ProgramScope) -> Router<AppState> {
    use permissions::*;

    Router::new()
        .route("/", gate.guarded(PRODUCT_CERTIFICATIONS_READ, get(list_certificates)))
        .route("/", gate.guarded(PRODUCT_CERTIFICATIONS_WRITE, post(create_certificate)))
        .route(
            "/:slug/:cert_id",
            gate.guarded(PRODUCT_CERTIFICATIONS_WRITE, put(update_certificate)),
        )
        .route(
            "/:slug/:cert_id",
            gate.guarded(PRODUCT_CERTIFICATIONS_DELETE, delete(delete_certificate)),
        )
        .layer(Extension(scope))
}

#[utoipa::path(
    get,
    path = "/api/programs/{program}/certificates",
    operation_id = "list_program_certificates",
    tag = "Program Certificates",
    params(
        ("program" = String, Path, description = "Program code with dashes, e.g. green-label"),
        ProgramCertificateQuery,
    ),
    responses((status = 200, description = "Most recently updated first", body = Vec<ProgramCertificate>)),
    security(("bearerAuth" = []))
)]
pub async fn list_certificates(
    Extension(scope): Extension<ProgramScope>,
    Query(query): Query<ProgramCertificateQuery>,
) -> AppResult<Json<Envelope<Vec<ProgramCertificate>>>> {
    let page = scope
        .list(query.search.as_deref(), Pagination::new(query.page, query.page_size))
        .await?;
    Ok(Json(page.into_envelope()))
}

#[utoipa::path(
    post,
    path = "/api/programs/{program}/certificates",
    operation_id = "create_program_certificate",
    tag = "Program Certificates",
    params(("program" = String, Path, description = "Program code with dashes")),
    request_body = ProgramCertificatePayload,
    responses(
        (status = 201, description = "Certificate issued", body = ProgramCertificate),
        (status = 400, description = "Program mismatch or invalid input"),
        (status = 404, description = "Product or certification not found"),
        (status = 409, description = "Product already holds this certification")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_certificate(
    State(state): State<AppState>,
    Extension(scope): Extension<ProgramScope>,
    auth: AuthUser,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<ProgramCertificatePayload>,
) -> AppResult<(StatusCode, Json<Envelope<ProgramCertificate>>)> {
    let created = scope.create(&payload).await?;
    tracing::info!(program = scope.code(), product = %payload.product_slug, certification_id = created.certification.id, "certificate issued");

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
    path = "/api/programs/{program}/certificates/{slug}/{cert_id}",
    operation_id = "update_program_certificate",
    tag = "Program Certificates",
    params(
        ("program" = String, Path, description = "Program code with dashes"),
        ("slug" = String, Path, description = "Product slug"),
        ("cert_id" = i64, Path, description = "Certification type id"),
    ),
    request_body = CertificateAttributes,
    responses(
        (status = 200, description = "Certificate updated", body = ProgramCertificate),
        (status = 400, description = "Program mismatch or invalid input"),
        (status = 404, description = "Product, certification or certificate not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_certificate(
    State(state): State<AppState>,
    Extension(scope): Extension<ProgramScope>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((slug, cert_id)): Path<(String, i64)>,
    ValidatedJson(attributes): ValidatedJson<CertificateAttributes>,
) -> AppResult<Json<Envelope<ProgramCertificate>>> {
    let updated = scope.update(&slug, cert_id, &attributes).await?;

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
    path = "/api/programs/{program}/certificates/{slug}/{cert_id}",
    operation_id = "delete_program_certificate",
    tag = "Program Certificates",
    params(
        ("program" = String, Path, description = "Program code with dashes"),
        ("slug" = String, Path, description = "Product slug"),
        ("cert_id" = i64, Path, description = "Certification type id"),
    ),
    responses(
        (status = 204, description = "Certificate removed"),
        (status = 400, description = "Program mismatch"),
        (status = 404, description = "Product, certification or certificate not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_certificate(
    State(state): State<AppState>,
    Extension(scope): Extension<ProgramScope>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((slug, cert_id)): Path<(String, i64)>,
) -> AppResult<StatusCode> {
    let removed = scope.delete(&slug, cert_id).await?;

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
