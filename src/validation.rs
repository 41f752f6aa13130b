use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::{AppError, FieldErrors};

/// Request payload rules. The default runs the `validator` derive; payloads
/// that embed other payloads or have cross-field rules override `check`.
pub trait RequestRules: Validate {
    fn check(&self, errors: &mut FieldErrors) {
        absorb(errors, self.validate());
    }
}

/// Copies `validator` field errors into `errors`, keeping the first message per field.
pub fn absorb(errors: &mut FieldErrors, result: Result<(), ValidationErrors>) {
    let Err(failed) = result else {
        return;
    };

    for (field, problems) in failed.field_errors() {
        if let Some(first) = problems.first() {
            errors.entry(field.to_string()).or_insert_with(|| describe(first));
        }
    }
}

pub fn check_date_order(issue: Option<NaiveDate>, expiry: Option<NaiveDate>, errors: &mut FieldErrors) {
    if let (Some(issue), Some(expiry)) = (issue, expiry) {
        if expiry < issue {
            errors
                .entry("expiry_date".to_string())
                .or_insert_with(|| "must be after issue_date".to_string());
        }
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let param = |key: &str| error.params.get(key).map(|v| v.to_string());
    match error.code.as_ref() {
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("length must be between {min} and {max}"),
            (Some(min), None) => format!("length must be at least {min}"),
            (None, Some(max)) => format!("length must be at most {max}"),
            (None, None) => "invalid length".to_string(),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("must be between {min} and {max}"),
            (Some(min), None) => format!("must be at least {min}"),
            (None, Some(max)) => format!("must be at most {max}"),
            (None, None) => "out of range".to_string(),
        },
        "email" => "must be a valid email address".to_string(),
        other => format!("failed {other} check"),
    }
}

/// JSON body extractor that reports the failing field for type errors and
/// runs [`RequestRules`] before the handler sees the payload.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + RequestRules,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;

        let payload = parse_body::<T>(&bytes)?;

        let mut errors = FieldErrors::new();
        payload.check(&mut errors);
        if !errors.is_empty() {
            return Err(AppError::ValidationFailed(errors));
        }

        Ok(Self(payload))
    }
}

/// `axum::extract::Path` that rejects through [`AppError`], so a malformed
/// segment gets the JSON error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// `axum::extract::Query` counterpart of [`Path`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::bad_request("request body is empty"));
    }

    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();

        if inner.is_syntax() || inner.is_eof() {
            return AppError::bad_request(format!("malformed JSON: {inner}"));
        }

        if let Some(field) = missing_field(&inner.to_string()) {
            let key = if path == "." { field } else { format!("{path}.{field}") };
            return AppError::field(key, "is required");
        }

        if path == "." {
            AppError::bad_request(format!("invalid body: {inner}"))
        } else {
            AppError::field(path, strip_position(&inner.to_string()))
        }
    })
}

fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

fn strip_position(message: &str) -> String {
    match message.find(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(length(min = 1, max = 10))]
        name: String,
        #[validate(range(min = 1))]
        count: i64,
    }

    impl RequestRules for Sample {}

    #[test]
    fn type_errors_name_the_field() {
        let err = parse_body::<Sample>(br#"{"name":"a","count":"x"}"#).unwrap_err();
        match err {
            AppError::ValidationFailed(fields) => assert!(fields.contains_key("count")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_fields_are_required() {
        let err = parse_body::<Sample>(br#"{"count":1}"#).unwrap_err();
        match err {
            AppError::ValidationFailed(fields) => assert_eq!(fields["name"], "is required"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_bad_request() {
        assert!(matches!(parse_body::<Sample>(b"{nope"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_body::<Sample>(b"  "), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn derive_rules_are_collected() {
        let sample = Sample { name: String::new(), count: 0 };
        let mut errors = FieldErrors::new();
        sample.check(&mut errors);
        assert!(errors.contains_key("name"));
        assert!(errors["count"].starts_with("must be at least"));
    }

    #[test]
    fn expiry_before_issue_is_rejected() {
        let mut errors = FieldErrors::new();
        let issue = NaiveDate::from_ymd_opt(2025, 5, 1);
        check_date_order(issue, NaiveDate::from_ymd_opt(2025, 4, 30), &mut errors);
        assert_eq!(errors["expiry_date"], "must be after issue_date");

        let mut same_day = FieldErrors::new();
        check_date_order(issue, issue, &mut same_day);
        assert!(same_day.is_empty());
    }
}
