// Validated JSON extractor for automatic request validation
//
// Deserializes the body and runs the validator crate's `Validate` impl on it.
// Both failures are reported as a 400 `ErrorResponse`.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::protocols::error::ErrorResponse;

/// A JSON extractor that validates the request body
///
/// ```rust,ignore
/// async fn detokenize(ValidatedJson(request): ValidatedJson<DetokenizeRequest>) -> Response {
///     // request is guaranteed to be valid here
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err: JsonRejection| {
                let message = match err {
                    JsonRejection::JsonDataError(e) => format!("Invalid JSON data: {}", e.body_text()),
                    JsonRejection::JsonSyntaxError(e) => format!("JSON syntax error: {}", e.body_text()),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing Content-Type: application/json header".to_string()
                    }
                    _ => format!("Failed to parse JSON: {}", err),
                };
                ErrorResponse::bad_request(message).into_response()
            })?;

        data.validate().map_err(|errors| {
            ErrorResponse::bad_request(validation_message(&errors)).into_response()
        })?;

        Ok(ValidatedJson(data))
    }
}

/// Human readable text of the validation failures, custom messages first
fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|field_errors| field_errors.iter())
        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .collect();

    if messages.is_empty() {
        return errors.to_string();
    }
    messages.sort();
    messages.join("; ")
}

impl<T> std::ops::Deref for ValidatedJson<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
