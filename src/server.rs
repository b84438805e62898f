use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::{signal, spawn};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, info_span, Level, Span};

use crate::{
    app_context::AppContext,
    config::TokenizationConfig,
    observability::logging::{self, LoggingConfig},
    protocols::tokenize::{DetokenizeRequest, TokenizeRequest, TokenizerInfoQuery},
    routers::{tokenize, ValidatedJson},
    version,
};

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<AppContext>,
}

async fn sink_handler() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

async fn liveness() -> Response {
    (StatusCode::OK, "OK").into_response()
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "ok",
        "version": version::get_version(),
        "served_model_names": state.context.config.served_model_names,
    }))
    .into_response()
}

// ============================================================================
// Tokenize / Detokenize Handlers
// ============================================================================

async fn v1_tokenize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<TokenizeRequest>,
) -> Response {
    tokenize::tokenize(&state.context.tokenization, &headers, request).await
}

async fn v1_detokenize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<DetokenizeRequest>,
) -> Response {
    tokenize::detokenize(&state.context.tokenization, &headers, request).await
}

async fn tokenizer_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenizerInfoQuery>,
) -> Response {
    tokenize::get_tokenizer_info(&state.context.tokenization, query.include_chat_template).await
}

pub fn build_app(app_state: Arc<AppState>, max_payload_size: usize) -> Router {
    let api_routes = Router::new()
        .route("/tokenize", post(v1_tokenize))
        .route("/v1/tokenize", post(v1_tokenize))
        .route("/detokenize", post(v1_detokenize))
        .route("/v1/detokenize", post(v1_detokenize))
        .route("/tokenizer_info", get(tokenizer_info));

    let public_routes = Router::new()
        .route("/liveness", get(liveness))
        .route("/health", get(health));

    Router::new()
        .merge(api_routes)
        .merge(public_routes)
        .layer(axum::extract::DefaultBodyLimit::max(max_payload_size))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            max_payload_size,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback(sink_handler)
        .with_state(app_state)
}

/// Span of one HTTP request, tagged with the caller's request id when given
fn request_span(request: &Request<Body>) -> Span {
    let request_id = tokenize::request_id_from_headers(request.headers());
    info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = request_id.as_deref().unwrap_or(""),
    )
}

pub struct ServerConfig {
    pub config: TokenizationConfig,
}

pub async fn startup(server_config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config = server_config.config;

    let _log_guard = logging::init_logging(LoggingConfig::from_config(&config));

    info!("Starting {}", version::get_version_string());

    let context = AppContext::from_config(config)?;
    let bind_addr = format!("{}:{}", context.config.host, context.config.port);
    let max_payload_size = context.config.max_payload_size;
    let grace_period = Duration::from_secs(context.config.shutdown_grace_period_secs);

    info!(
        models = ?context.config.served_model_names,
        max_model_len = context.tokenization.max_model_len(),
        "Tokenization service ready"
    );

    let app_state = Arc::new(AppState {
        context: Arc::new(context),
    });
    let app = build_app(app_state, max_payload_size);

    info!("Starting server on {}", bind_addr);
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let handle = axum_server::Handle::new();
    let handle_clone = handle.clone();
    spawn(async move {
        shutdown_signal().await;
        handle_clone.graceful_shutdown(Some(grace_period));
    });

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
