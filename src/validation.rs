//! JSON body extraction with schema and data validation mapped onto the
//! error taxonomy.

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{ApiError, FieldError};

/// JSON extractor that feeds failures to the error classifier.
///
/// Body deserialization rejections become `RequestValidation` (malformed or
/// missing fields before the handler runs); `validator` constraint failures
/// on the parsed value become `DataValidation` with dotted field paths.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        value.validate().map_err(validation_errors_to_error)?;
        Ok(Self(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    let kind = match &rejection {
        JsonRejection::JsonDataError(_) => "json_data",
        JsonRejection::JsonSyntaxError(_) => "json_syntax",
        JsonRejection::MissingJsonContentType(_) => "missing_content_type",
        _ => "json",
    };
    ApiError::request_validation(vec![FieldError::new("body", rejection.body_text(), kind)])
}

fn validation_errors_to_error(errors: ValidationErrors) -> ApiError {
    let mut field_errors = Vec::new();
    flatten_errors("", &errors, &mut field_errors);
    ApiError::data_validation(field_errors)
}

/// Walk nested validation failures, joining location paths with `.` and
/// preserving the order the validation layer reports.
fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            (*field).to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string);
                    out.push(FieldError::new(&path, message, error.code.to_string()));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten_errors(&path, nested, out),
            ValidationErrorsKind::List(map) => {
                for (index, nested) in map {
                    flatten_errors(&format!("{path}.{index}"), nested, out);
                }
            }
        }
    }
}
