use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::errors::{AppError, AppResult, Entity};
use crate::events::{record, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{DbUser, LoginRequest, RegisterRequest, TokenResponse, User};
use crate::response::Envelope;
use crate::utils::{hash_password, new_xid, verify_password};
use crate::validation::ValidatedJson;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Envelope<User>>)> {
    ensure_email_available(&state.pool, &payload.email).await?;

    let password_hash = hash_password(&payload.password)?;
    let xid = new_xid();

    sqlx::query("INSERT INTO users (xid, name, email, password_hash) VALUES (?, ?, ?, ?)")
        .bind(&xid)
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(password_hash)
        .execute(&state.pool)
        .await?;

    let user: User = fetch_user_by_xid(&state.pool, &xid).await?.into();
    tracing::info!(user = %user.xid, "user registered");

    record(
        &state.events,
        "registered",
        Some(&user.xid),
        &user,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(Envelope::data(user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<Envelope<TokenResponse>>> {
    let sql = format!("SELECT {} FROM users WHERE email = ? AND deleted_at IS NULL", DbUser::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(&payload.email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::unauthenticated("invalid credentials"))?;
    let db_user = DbUser::from_row(&row)?;

    if !db_user.is_active {
        return Err(AppError::unauthenticated("invalid credentials"));
    }

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthenticated("invalid credentials"));
    }

    let access_token = state.jwt.encode(&db_user.xid)?;

    Ok(Json(Envelope::data(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_secs(),
    })))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Envelope<User>>> {
    let user: User = fetch_user_by_xid(&state.pool, &auth.xid).await?.into();
    Ok(Json(Envelope::data(user)))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

async fn fetch_user_by_xid(pool: &SqlitePool, xid: &str) -> AppResult<DbUser> {
    let sql = format!("SELECT {} FROM users WHERE xid = ? AND deleted_at IS NULL", DbUser::COLUMNS);
    let row = sqlx::query(&sql)
        .bind(xid)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(Entity::User))?;

    DbUser::from_row(&row)
}
