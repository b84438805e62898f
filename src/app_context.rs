use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    config::{ConfigError, TokenizationConfig},
    serving::{
        LocalEngineClient, RequestLogger, ServingModels, TokenizationService, TracingRequestLogger,
    },
    tokenizer::{chat_template::load_chat_template, create_tokenizer, Tokenizer},
};

/// Shared state of a running server
#[derive(Clone)]
pub struct AppContext {
    pub config: TokenizationConfig,
    pub engine_client: Arc<LocalEngineClient>,
    pub tokenization: Arc<TokenizationService>,
}

impl AppContext {
    /// Validate the config, load the tokenizer and wire up the serving layer
    pub fn from_config(config: TokenizationConfig) -> Result<Self> {
        config.validate()?;

        let tokenizer = create_tokenizer(&config.tokenizer_path)
            .with_context(|| format!("Failed to load tokenizer from {}", config.tokenizer_path))?;
        info!(
            path = %config.tokenizer_path,
            vocab_size = tokenizer.vocab_size(),
            "Loaded tokenizer"
        );

        Self::with_tokenizer(config, tokenizer)
    }

    /// Build the context around an already loaded tokenizer
    pub fn with_tokenizer(config: TokenizationConfig, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let chat_template = config
            .chat_template
            .as_deref()
            .map(load_chat_template)
            .transpose()
            .context("Failed to load chat template")?;
        if chat_template.is_some() {
            debug!("Using configured chat template as the served default");
        }

        let max_model_len = resolve_max_model_len(&config, tokenizer.as_ref())?;

        let request_logger: Option<Arc<dyn RequestLogger>> = config
            .enable_request_logging
            .then(|| Arc::new(TracingRequestLogger::new(config.max_log_len)) as Arc<dyn RequestLogger>);

        let models = Arc::new(ServingModels::from_config(&config));
        let engine_client = Arc::new(LocalEngineClient::new(tokenizer));

        let tokenization = TokenizationService::new(engine_client.clone(), models, max_model_len)
            .with_request_logger(request_logger)
            .with_chat_template(chat_template)
            .with_chat_template_content_format(config.chat_template_content_format);

        Ok(Self {
            config,
            engine_client,
            tokenization: Arc::new(tokenization),
        })
    }
}

/// Configured limit, else the tokenizer's `model_max_length`
fn resolve_max_model_len(config: &TokenizationConfig, tokenizer: &dyn Tokenizer) -> Result<usize> {
    if let Some(len) = config.max_model_len {
        return Ok(len);
    }

    tokenizer
        .init_config()
        .and_then(|init| init.get("model_max_length"))
        .and_then(|value| value.as_u64())
        .and_then(|len| usize::try_from(len).ok())
        .filter(|&len| len > 0)
        .ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "max_model_len".to_string(),
            }
            .into()
        })
}
