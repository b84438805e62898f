//! Tokenize, detokenize and tokenizer-info operations

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    engine::EngineClient,
    error::{PreprocessError, ServingError, ServingResult},
    models::ServingModels,
    preprocess::{
        ChatPreprocessParams, DefaultPromptPreprocessor, PreprocessedPrompts, PromptInput,
        PromptPreprocessor,
    },
    request_logger::{log_inputs_best_effort, RequestInputs, RequestLogger},
    tokenizer_info::TokenizerInfo,
};
use crate::{
    protocols::{
        error::ErrorResponse,
        tokenize::{
            DetokenizeRequest, DetokenizeResponse, TokenizeChatRequest, TokenizeRequest,
            TokenizeResponse, TokenizerInfoResponse,
        },
        ModelRequest,
    },
    tokenizer::{chat_template::ChatTemplateContentFormatOption, Tokenizer},
};

/// Prefix of the ids tokenization requests are logged under
pub const REQUEST_ID_PREFIX: &str = "tokn";

pub struct TokenizationService {
    engine_client: Arc<dyn EngineClient>,
    models: Arc<ServingModels>,
    preprocessor: Arc<dyn PromptPreprocessor>,
    request_logger: Option<Arc<dyn RequestLogger>>,
    max_model_len: usize,
    /// Served default template, already resolved to its text
    chat_template: Option<String>,
    chat_template_content_format: ChatTemplateContentFormatOption,
}

impl TokenizationService {
    pub fn new(
        engine_client: Arc<dyn EngineClient>,
        models: Arc<ServingModels>,
        max_model_len: usize,
    ) -> Self {
        Self {
            engine_client,
            models,
            preprocessor: Arc::new(DefaultPromptPreprocessor::new()),
            request_logger: None,
            max_model_len,
            chat_template: None,
            chat_template_content_format: ChatTemplateContentFormatOption::Auto,
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn PromptPreprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn with_request_logger(mut self, request_logger: Option<Arc<dyn RequestLogger>>) -> Self {
        self.request_logger = request_logger;
        self
    }

    pub fn with_chat_template(mut self, chat_template: Option<String>) -> Self {
        self.chat_template = chat_template;
        self
    }

    pub fn with_chat_template_content_format(
        mut self,
        content_format: ChatTemplateContentFormatOption,
    ) -> Self {
        self.chat_template_content_format = content_format;
        self
    }

    pub fn max_model_len(&self) -> usize {
        self.max_model_len
    }

    pub fn models(&self) -> &ServingModels {
        &self.models
    }

    /// Request id used in logs: `tokn-<X-Request-Id or random uuid>`
    pub fn request_id(base_request_id: Option<&str>) -> String {
        match base_request_id.filter(|id| !id.is_empty()) {
            Some(id) => format!("{}-{}", REQUEST_ID_PREFIX, id),
            None => format!("{}-{}", REQUEST_ID_PREFIX, Uuid::new_v4().simple()),
        }
    }

    fn check_model(&self, request: &dyn ModelRequest) -> ServingResult<()> {
        match self.models.check_model(request.model()) {
            Some(err) => Err(ServingError::Rejected(err)),
            None => Ok(()),
        }
    }

    fn request_logger(&self) -> Option<&dyn RequestLogger> {
        self.request_logger.as_deref()
    }

    pub async fn create_tokenize(
        &self,
        request: &TokenizeRequest,
        base_request_id: Option<&str>,
    ) -> ServingResult<TokenizeResponse> {
        self.check_model(request)?;

        let request_id = Self::request_id(base_request_id);

        let (lora_request, prompt_adapter_request) =
            self.models.maybe_get_adapters(request.model());

        let tokenizer = self
            .engine_client
            .get_tokenizer(lora_request.as_ref())
            .await?;

        let preprocessed = match request {
            TokenizeRequest::Chat(chat) => self.preprocess_chat(&tokenizer, chat).await,
            TokenizeRequest::Completion(completion) => {
                self.preprocessor
                    .preprocess_completion(
                        &tokenizer,
                        &completion.prompt,
                        completion.add_special_tokens,
                    )
                    .await
            }
        };

        let PreprocessedPrompts {
            request_prompts,
            engine_prompts,
        } = match preprocessed {
            Ok(prompts) => prompts,
            Err(PreprocessError::Fatal(e)) => return Err(ServingError::Internal(e)),
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Error in preprocessing prompt inputs");
                return Err(ErrorResponse::bad_request(e.client_message()).into());
            }
        };

        let mut input_ids = Vec::new();
        for (i, engine_prompt) in engine_prompts.iter().enumerate() {
            log_inputs_best_effort(
                self.request_logger(),
                &request_id,
                RequestInputs {
                    prompt: request_prompts.get(i).map(String::as_str),
                    prompt_token_ids: engine_prompt.prompt_token_ids(),
                    lora_request: lora_request.as_ref(),
                    prompt_adapter_request: prompt_adapter_request.as_ref(),
                },
            );

            // The prompt adapter does not change tokenization and is ignored here
            if let Some(ids) = engine_prompt.prompt_token_ids() {
                input_ids.extend_from_slice(ids);
            }
        }

        let token_strs = request
            .return_token_strs()
            .then(|| tokenizer.convert_ids_to_tokens(&input_ids));

        debug!(request_id = %request_id, count = input_ids.len(), "Tokenized request");

        Ok(TokenizeResponse {
            count: input_ids.len(),
            tokens: input_ids,
            token_strs,
            max_model_len: self.max_model_len,
        })
    }

    async fn preprocess_chat(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        request: &TokenizeChatRequest,
    ) -> Result<PreprocessedPrompts, PreprocessError> {
        let tools = request
            .tools
            .as_ref()
            .map(|tools| {
                tools
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<Value>, _>>()
            })
            .transpose()
            .map_err(|e| anyhow!("Failed to serialize tools: {}", e))?;

        let chat_template = request
            .chat_template
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.chat_template.as_deref());

        let params = ChatPreprocessParams {
            messages: &request.messages,
            tools: tools.as_deref(),
            chat_template,
            content_format: self.chat_template_content_format,
            add_generation_prompt: request.add_generation_prompt,
            continue_final_message: request.continue_final_message,
            chat_template_kwargs: request.chat_template_kwargs.as_ref(),
            add_special_tokens: request.add_special_tokens,
        };

        self.preprocessor.preprocess_chat(tokenizer, params).await
    }

    pub async fn create_detokenize(
        &self,
        request: &DetokenizeRequest,
        base_request_id: Option<&str>,
    ) -> ServingResult<DetokenizeResponse> {
        self.check_model(request)?;

        let request_id = Self::request_id(base_request_id);

        let (lora_request, prompt_adapter_request) =
            self.models.maybe_get_adapters(request.model());

        let tokenizer = self
            .engine_client
            .get_tokenizer(lora_request.as_ref())
            .await?;

        log_inputs_best_effort(
            self.request_logger(),
            &request_id,
            RequestInputs {
                prompt: None,
                prompt_token_ids: Some(&request.tokens),
                lora_request: lora_request.as_ref(),
                prompt_adapter_request: prompt_adapter_request.as_ref(),
            },
        );

        let prompt_input = self
            .preprocessor
            .tokenize_prompt_input(&tokenizer, PromptInput::Tokens(&request.tokens))
            .await?;

        Ok(DetokenizeResponse {
            prompt: prompt_input.prompt,
        })
    }

    pub async fn get_tokenizer_info(
        &self,
        include_chat_template: bool,
    ) -> ServingResult<TokenizerInfoResponse> {
        let result = async {
            let tokenizer = self.engine_client.get_tokenizer(None).await?;
            let chat_template = if include_chat_template {
                tokenizer
                    .chat_template()
                    .filter(|t| !t.is_empty())
                    .or(self.chat_template.as_deref())
            } else {
                None
            };
            anyhow::Ok(TokenizerInfo::new(tokenizer.as_ref(), chat_template).to_response())
        }
        .await;

        result.map_err(|e| {
            error!(error = %e, "Failed to get tokenizer info");
            ServingError::from(ErrorResponse::bad_request(format!(
                "Failed to get tokenizer info: {}",
                e
            )))
        })
    }
}
