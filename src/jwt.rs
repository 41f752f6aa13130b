use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::app::AppState;
use crate::config::DEFAULT_ISSUER;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;
        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());

        Ok(Self::new(secret.into_bytes(), exp_hours, issuer))
    }

    pub fn new(secret: Vec<u8>, exp_hours: i64, issuer: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret),
            exp_hours,
            issuer: issuer.into(),
        }
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.exp_hours * 3600
    }

    pub fn encode(&self, xid: &str) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp();
        self.encode_claims(&Claims {
            sub: xid.to_string(),
            iat: now,
            exp: now + self.expires_in_secs(),
            iss: self.issuer.clone(),
        })
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign token: {err}")))
    }

    /// Verifies signature, issuer and expiry. Any failure is `Unauthenticated`.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::unauthenticated(format!("invalid token: {err}")))?;

        if claims.sub.trim().is_empty() {
            return Err(AppError::unauthenticated("token subject is empty"));
        }

        Ok(claims)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    /// User xid.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Returns the token part of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthenticated("Authorization header missing"))?
        .to_str()
        .map_err(|_| AppError::unauthenticated("Authorization header is not valid text"))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::unauthenticated("Authorization header must use the Bearer scheme"))?;

    if token.is_empty() {
        return Err(AppError::unauthenticated("bearer token is empty"));
    }

    Ok(token)
}

/// Verified caller identity.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub xid: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Routes behind the permission gate already carry the verified identity.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(&parts.headers)?;
        let claims = state.jwt.decode(token)?;

        Ok(AuthUser { xid: claims.sub })
    }
}
