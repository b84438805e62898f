//! Tokenize and detokenize handlers
//!
//! Thin adapters between axum and [`TokenizationService`]: successful results are
//! serialized as JSON, failures go through the `IntoResponse` impls in
//! `routers::error`.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::{
    protocols::{
        tokenize::{DetokenizeRequest, TokenizeRequest},
        ModelRequest,
    },
    serving::TokenizationService,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller supplied request id, when the header is present and printable
pub fn request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Handle POST /tokenize and /v1/tokenize
pub async fn tokenize(
    service: &TokenizationService,
    headers: &HeaderMap,
    request: TokenizeRequest,
) -> Response {
    debug!(model = ?request.model(), "Tokenize request");

    let request_id = request_id_from_headers(headers);
    match service
        .create_tokenize(&request, request_id.as_deref())
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Handle POST /detokenize and /v1/detokenize
pub async fn detokenize(
    service: &TokenizationService,
    headers: &HeaderMap,
    request: DetokenizeRequest,
) -> Response {
    debug!(model = ?request.model(), count = request.tokens.len(), "Detokenize request");

    let request_id = request_id_from_headers(headers);
    match service
        .create_detokenize(&request, request_id.as_deref())
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Handle GET /tokenizer_info
pub async fn get_tokenizer_info(
    service: &TokenizationService,
    include_chat_template: bool,
) -> Response {
    match service.get_tokenizer_info(include_chat_template).await {
        Ok(info) => Json(info).into_response(),
        Err(err) => err.into_response(),
    }
}
