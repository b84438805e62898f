//! Error types for the tokenization serving layer

use std::error::Error as StdError;

use crate::{protocols::error::ErrorResponse, tokenizer::chat_template::ChatTemplateError};

/// Failures while turning a request into engine prompts
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("{0}")]
    InvalidValue(String),

    #[error("{0}")]
    InvalidType(String),

    #[error(transparent)]
    Template(#[from] ChatTemplateError),

    /// Tokenizer or runtime failure; not the caller's fault
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl PreprocessError {
    /// Whether the failure should be reported to the caller as a bad request
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PreprocessError::Fatal(_))
    }

    /// Error text followed by its underlying cause, when there is one
    pub fn client_message(&self) -> String {
        with_cause(self)
    }
}

/// Result type for preprocessing
pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// Outcome of a serving operation that did not produce a response body
#[derive(Debug, thiserror::Error)]
pub enum ServingError {
    /// Recoverable failure already shaped for the caller
    #[error("{}", .0.message)]
    Rejected(ErrorResponse),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ErrorResponse> for ServingError {
    fn from(response: ErrorResponse) -> Self {
        ServingError::Rejected(response)
    }
}

pub type ServingResult<T> = Result<T, ServingError>;

/// Render `err` as `"<err> <cause>"`, or just `"<err>"` without a cause
pub fn with_cause(err: &(dyn StdError + 'static)) -> String {
    match err.source() {
        Some(cause) => format!("{} {}", err, cause),
        None => err.to_string(),
    }
}
