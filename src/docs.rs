use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{models, notify, response, routes};

#[derive(OpenApi)]
#[openapi(
	info(title = "Catalog API", description = "Product certification catalog with role-based access control"),
	paths(
		routes::health::health,
		routes::health::ping,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::notify::notify_user,
		routes::rbac::list_roles,
		routes::rbac::create_role,
		routes::rbac::delete_role,
		routes::rbac::assign_permission_to_role,
		routes::rbac::revoke_permission_from_role,
		routes::rbac::list_permissions,
		routes::rbac::create_permission,
		routes::rbac::delete_permission,
		routes::rbac::list_user_roles,
		routes::rbac::assign_role_to_user,
		routes::rbac::revoke_role_from_user,
		routes::catalog::list_programs,
		routes::catalog::create_program,
		routes::catalog::update_program,
		routes::catalog::delete_program,
		routes::catalog::list_statuses,
		routes::catalog::create_status,
		routes::catalog::update_status,
		routes::catalog::delete_status,
		routes::catalog::list_certifications,
		routes::catalog::create_certification,
		routes::brands::list_companies,
		routes::brands::get_company,
		routes::brands::create_company,
		routes::brands::update_company,
		routes::brands::delete_company,
		routes::brands::list_brand_categories,
		routes::brands::get_brand_category,
		routes::brands::create_brand_category,
		routes::brands::update_brand_category,
		routes::brands::delete_brand_category,
		routes::brands::list_brands,
		routes::brands::get_brand,
		routes::brands::create_brand,
		routes::brands::update_brand,
		routes::brands::delete_brand,
		routes::products::list_products,
		routes::products::get_product,
		routes::products::create_product,
		routes::products::update_product,
		routes::products::delete_product,
		routes::certifications::list_certificates,
		routes::certifications::create_certificate,
		routes::certifications::update_certificate,
		routes::certifications::delete_certificate,
		routes::program_certificates::list_certificates,
		routes::program_certificates::create_certificate,
		routes::program_certificates::update_certificate,
		routes::program_certificates::delete_certificate,
	),
	components(
		schemas(
			response::ErrorBody,
			response::PageMeta,
			routes::health::HealthResponse,
			routes::health::Pong,
			models::user::User,
			models::user::RegisterRequest,
			models::user::LoginRequest,
			models::user::TokenResponse,
			models::rbac::Role,
			models::rbac::Permission,
			models::rbac::RoleCreateRequest,
			models::rbac::PermissionCreateRequest,
			models::rbac::AssignPermissionRequest,
			models::rbac::AssignRoleRequest,
			models::catalog::Program,
			models::catalog::CertificationStatus,
			models::catalog::LookupPayload,
			models::catalog::Certification,
			models::catalog::CertificationCreateRequest,
			models::brand::Company,
			models::brand::BrandCategory,
			models::brand::Brand,
			models::brand::DirectoryPayload,
			models::brand::BrandPayload,
			models::product::Product,
			models::product::ProductPayload,
			models::certification::CertificateAttributes,
			models::certification::CertificationPayload,
			models::certification::ProgramCertificatePayload,
			models::certification::ProductCertification,
			models::certification::ProgramCertificate,
			models::certification::NamedRef,
			models::certification::BrandRef,
			notify::NotifyRequest,
			notify::Queued
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Health", description = "Liveness and database checks"),
		(name = "Auth", description = "Registration, login and the current user"),
		(name = "RBAC", description = "Roles, permissions and assignments"),
		(name = "Catalog", description = "Programs, certification statuses and certification types"),
		(name = "Brands", description = "Companies, brand categories and brands"),
		(name = "Products", description = "Product catalog"),
		(name = "Product Certifications", description = "Certificates held by a product"),
		(name = "Program Certificates", description = "Certificates under one certification program"),
		(name = "Notify", description = "Asynchronous user notifications")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	ensure_servers(&mut doc, port);
	Ok(serde_json::from_value(doc)?)
}

/// Serves the document at `/api-docs/openapi.json` and Swagger UI at `/docs`.
pub fn swagger_routes(doc: &utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{port}");

	match doc.get_mut("servers") {
		Some(Value::Array(servers)) => {
			let present = servers
				.iter()
				.any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !present {
				servers.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}
