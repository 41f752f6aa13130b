use std::time::Duration;

use crate::errors::AppError;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ISSUER: &str = "catalog-api";
pub const DEFAULT_PERMISSION_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_PROGRAMS: &str = "green_label,green_toll";

/// Runtime settings read from the environment. The JWT settings live in
/// [`crate::jwt::JwtConfig`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub permission_timeout: Duration,
    pub programs: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        let port = parse_var("APP_PORT", DEFAULT_PORT)?;
        let timeout_ms = parse_var("PERMISSION_CHECK_TIMEOUT_MS", DEFAULT_PERMISSION_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(AppError::configuration(
                "PERMISSION_CHECK_TIMEOUT_MS must be greater than zero",
            ));
        }

        let raw_programs =
            std::env::var("CERTIFICATE_PROGRAMS").unwrap_or_else(|_| DEFAULT_PROGRAMS.to_string());
        let programs = parse_programs(&raw_programs)?;

        Ok(Self {
            port,
            permission_timeout: Duration::from_millis(timeout_ms),
            programs,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Splits a comma separated list of program codes, rejecting empty lists and
/// codes that cannot be used as a path segment.
pub fn parse_programs(raw: &str) -> Result<Vec<String>, AppError> {
    let mut codes: Vec<String> = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let valid = code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(AppError::configuration(format!(
                "CERTIFICATE_PROGRAMS contains an invalid code: {code}"
            )));
        }
        if !codes.iter().any(|existing| existing == code) {
            codes.push(code.to_string());
        }
    }

    if codes.is_empty() {
        return Err(AppError::configuration("CERTIFICATE_PROGRAMS must name at least one program"));
    }

    Ok(codes)
}

/// URL segment for a program code: `green_label` is served under `green-label`.
pub fn program_segment(code: &str) -> String {
    code.replace('_', "-")
}
