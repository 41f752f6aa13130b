use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};

use crate::errors::AppError;

/// Reads a column, turning a missing or mistyped column into an internal error.
pub fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {name}: {e}")))
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP style, optional fractional seconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {s}")))
}

pub fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s.as_deref().map(str::trim) {
        Some("") | None => Ok(None),
        Some(value) => parse_datetime(value).map(Some),
    }
}

/// Calendar dates are stored as `YYYY-MM-DD`; a full timestamp is truncated.
pub fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, AppError> {
    match s.as_deref().map(str::trim) {
        Some("") | None => Ok(None),
        Some(value) => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => Ok(Some(date)),
            Err(_) => parse_datetime(value).map(|dt| Some(dt.date_naive())),
        },
    }
}

/// Free-form JSON object column. NULL, empty text and non-object values all
/// read back as an empty object.
pub fn parse_json_object(s: Option<String>) -> Result<Map<String, Value>, AppError> {
    let raw = match s.as_deref().map(str::trim) {
        Some("") | None => return Ok(Map::new()),
        Some(raw) => raw,
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(AppError::internal(format!("expected a JSON object, found {other}"))),
        Err(e) => Err(AppError::internal(format!("invalid JSON column: {e}"))),
    }
}

pub fn json_object_text(map: Option<&Map<String, Value>>) -> String {
    match map {
        Some(map) => Value::Object(map.clone()).to_string(),
        None => "{}".to_string(),
    }
}
