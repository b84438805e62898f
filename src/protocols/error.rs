use serde::{Deserialize, Serialize};

pub const BAD_REQUEST_ERROR: &str = "BadRequestError";
pub const NOT_FOUND_ERROR: &str = "NotFoundError";
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";

/// Error body returned by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"error"`
    pub object: String,
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub param: Option<String>,
    /// HTTP status code
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>, code: u16) -> Self {
        Self {
            object: "error".to_string(),
            message: message.into(),
            error_type: error_type.into(),
            param: None,
            code,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, BAD_REQUEST_ERROR, 400)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, NOT_FOUND_ERROR, 404)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, INTERNAL_SERVER_ERROR, 500)
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_response_shape() {
        let err = ErrorResponse::not_found("The model `x` does not exist.").with_param("model");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "object": "error",
                "message": "The model `x` does not exist.",
                "type": "NotFoundError",
                "param": "model",
                "code": 404
            })
        );
    }
}
