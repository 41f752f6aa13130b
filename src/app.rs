use std::sync::Arc;

use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{PermissionGate, PermissionStore, SqlitePermissionStore};
use crate::certification::{
    CertificationService, ProgramCertificateService, ProgramScope, SqliteCertificationRepository,
};
use crate::config::{program_segment, Settings};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::notify::{start_notify_worker, Notifier};
use crate::routes::{auth, brands, catalog, certifications, health, notify, products, program_certificates, rbac};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub settings: Arc<Settings>,
    pub gate: PermissionGate,
    pub permissions: Arc<dyn PermissionStore>,
    pub certifications: CertificationService,
    pub programs: Arc<ProgramCertificateService>,
    pub events: EventBus,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, settings: Settings, events: EventBus, notifier: Notifier) -> Self {
        let jwt = Arc::new(jwt);
        let permissions: Arc<dyn PermissionStore> = Arc::new(SqlitePermissionStore::new(pool.clone()));
        let gate = PermissionGate::new(jwt.clone(), permissions.clone(), settings.permission_timeout);

        let repository = Arc::new(SqliteCertificationRepository::new(pool.clone()));
        let certifications = CertificationService::new(repository.clone());
        let programs = Arc::new(ProgramCertificateService::new(repository, certifications.clone()));

        Self {
            pool,
            jwt,
            settings: Arc::new(settings),
            gate,
            permissions,
            certifications,
            programs,
            events,
            notifier,
        }
    }

    /// The engine bound to one program code.
    pub fn program_scope(&self, code: &str) -> ProgramScope {
        ProgramScope::new(code, self.programs.clone())
    }
}

/// Configured program codes that have no `lkp_product_program` row. Their
/// routes still mount, but every write under them fails the program check.
pub async fn unknown_programs(pool: &SqlitePool, codes: &[String]) -> Result<Vec<String>, AppError> {
    let mut missing = Vec::new();
    for code in codes {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM lkp_product_program WHERE code = ?)")
            .bind(code)
            .fetch_one(pool)
            .await?;
        if found == 0 {
            missing.push(code.clone());
        }
    }
    Ok(missing)
}

/// Builds the full router, starting the activity listener and the notify
/// worker on the current runtime. The pool must already be migrated.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let settings = Settings::from_env()?;

    for code in unknown_programs(&pool, &settings.programs).await? {
        tracing::warn!(program = %code, "configured program has no lkp_product_program row");
    }

    let (events, activity_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(activity_rx, pool.clone()));

    let (notifier, notify_rx) = Notifier::channel();
    tokio::spawn(start_notify_worker(notify_rx));

    let state = AppState::new(pool, jwt_config, settings, events, notifier);
    let gate = state.gate.clone();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let catalog_routes = catalog::routes(&gate)
        .merge(brands::routes(&gate))
        .nest("/products", products::routes(&gate).merge(certifications::routes(&gate)));

    let mut api = Router::new()
        .route("/health", get(health::health))
        .route("/ping", get(health::ping))
        .route("/notify", post(notify::notify_user))
        .nest("/auth", auth_routes)
        .nest("/rbac", rbac::routes(&gate))
        .nest("/catalog", catalog_routes);

    // One route group per configured program: /programs/<code with dashes>/certificates
    for code in &state.settings.programs {
        let path = format!("/programs/{}/certificates", program_segment(code));
        tracing::debug!(program = %code, path = %path, "mounting program certificate routes");
        api = api.nest(&path, program_certificates::routes(&gate, state.program_scope(code)));
    }

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let router = Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

    Ok(router)
}
