//! Prompt preprocessing: turn completion prompts and chat conversations into
//! token-id engine prompts.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::error::{PreprocessError, PreprocessResult};
use crate::{
    protocols::chat::ChatMessage,
    tokenizer::{
        chat_template::{
            ChatTemplateContentFormat, ChatTemplateContentFormatOption, ChatTemplateError,
            ChatTemplateParams, ChatTemplateProcessor,
        },
        TokenIdType, Tokenizer,
    },
};

/// Inputs above this many bytes are encoded on the blocking pool
pub const ENCODE_OFFLOAD_THRESHOLD: usize = 4096;

/// Prompt text together with its token ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTokensPrompt {
    pub prompt: String,
    pub prompt_token_ids: Vec<TokenIdType>,
}

/// A single prompt input handed to [`PromptPreprocessor::tokenize_prompt_input`]
#[derive(Debug, Clone, Copy)]
pub enum PromptInput<'a> {
    Text {
        text: &'a str,
        add_special_tokens: bool,
    },
    Tokens(&'a [TokenIdType]),
}

/// Normalized prompt as the engine consumes it
#[derive(Debug, Clone, PartialEq)]
pub enum EngineRequestPrompt {
    Tokens {
        prompt_token_ids: Vec<TokenIdType>,
        /// Original text, kept for logging
        prompt: Option<String>,
    },
    Embeds { prompt_embeds: Vec<Vec<f32>> },
}

impl EngineRequestPrompt {
    pub fn prompt_token_ids(&self) -> Option<&[TokenIdType]> {
        match self {
            EngineRequestPrompt::Tokens {
                prompt_token_ids, ..
            } => Some(prompt_token_ids),
            EngineRequestPrompt::Embeds { .. } => None,
        }
    }
}

impl From<TextTokensPrompt> for EngineRequestPrompt {
    fn from(p: TextTokensPrompt) -> Self {
        EngineRequestPrompt::Tokens {
            prompt_token_ids: p.prompt_token_ids,
            prompt: Some(p.prompt),
        }
    }
}

/// Output of a preprocessing entry point
#[derive(Debug, Clone, Default)]
pub struct PreprocessedPrompts {
    /// Text the prompts were derived from (rendered template for chat)
    pub request_prompts: Vec<String>,
    pub engine_prompts: Vec<EngineRequestPrompt>,
}

/// Options of [`PromptPreprocessor::preprocess_chat`]
#[derive(Debug, Clone, Copy)]
pub struct ChatPreprocessParams<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: Option<&'a [Value]>,
    /// Explicit template; the tokenizer's own template is used when absent
    pub chat_template: Option<&'a str>,
    pub content_format: ChatTemplateContentFormatOption,
    pub add_generation_prompt: bool,
    pub continue_final_message: bool,
    pub chat_template_kwargs: Option<&'a HashMap<String, Value>>,
    pub add_special_tokens: bool,
}

#[async_trait]
pub trait PromptPreprocessor: Send + Sync {
    async fn preprocess_chat(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        params: ChatPreprocessParams<'_>,
    ) -> PreprocessResult<PreprocessedPrompts>;

    async fn preprocess_completion(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        prompt: &str,
        add_special_tokens: bool,
    ) -> PreprocessResult<PreprocessedPrompts>;

    /// Normalize a single text or token input into `{prompt, prompt_token_ids}`
    async fn tokenize_prompt_input(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        input: PromptInput<'_>,
    ) -> Result<TextTokensPrompt>;
}

/// Preprocessor backed by the tokenizer and the minijinja chat template renderer
#[derive(Debug, Clone, Default)]
pub struct DefaultPromptPreprocessor;

impl DefaultPromptPreprocessor {
    pub fn new() -> Self {
        Self
    }

    fn render_chat(
        tokenizer: &dyn Tokenizer,
        params: &ChatPreprocessParams<'_>,
    ) -> PreprocessResult<String> {
        if params.messages.is_empty() {
            return Err(PreprocessError::InvalidValue(
                "messages must contain at least one message".to_string(),
            ));
        }

        let template = params
            .chat_template
            .or_else(|| tokenizer.chat_template())
            .ok_or(ChatTemplateError::MissingTemplate)?;

        let content_format = params.content_format.resolve(template);
        let mut messages = process_content_format(params.messages, content_format)?;
        process_tool_call_arguments(&mut messages)?;

        let special_tokens = tokenizer.get_special_tokens();
        let template_params = ChatTemplateParams {
            add_generation_prompt: params.add_generation_prompt,
            continue_final_message: params.continue_final_message,
            tools: params.tools,
            template_kwargs: params.chat_template_kwargs,
            bos_token: special_tokens.bos_token.as_deref(),
            eos_token: special_tokens.eos_token.as_deref(),
        };

        let processor = ChatTemplateProcessor::new(template.to_string());
        Ok(processor.apply_chat_template(&messages, template_params)?)
    }
}

#[async_trait]
impl PromptPreprocessor for DefaultPromptPreprocessor {
    async fn preprocess_chat(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        params: ChatPreprocessParams<'_>,
    ) -> PreprocessResult<PreprocessedPrompts> {
        let rendered = Self::render_chat(tokenizer.as_ref(), &params)?;

        let prompt = self
            .tokenize_prompt_input(
                tokenizer,
                PromptInput::Text {
                    text: &rendered,
                    add_special_tokens: params.add_special_tokens,
                },
            )
            .await?;

        Ok(PreprocessedPrompts {
            request_prompts: vec![rendered],
            engine_prompts: vec![prompt.into()],
        })
    }

    async fn preprocess_completion(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        prompt: &str,
        add_special_tokens: bool,
    ) -> PreprocessResult<PreprocessedPrompts> {
        let tokens_prompt = self
            .tokenize_prompt_input(
                tokenizer,
                PromptInput::Text {
                    text: prompt,
                    add_special_tokens,
                },
            )
            .await?;

        Ok(PreprocessedPrompts {
            request_prompts: vec![prompt.to_string()],
            engine_prompts: vec![tokens_prompt.into()],
        })
    }

    async fn tokenize_prompt_input(
        &self,
        tokenizer: &Arc<dyn Tokenizer>,
        input: PromptInput<'_>,
    ) -> Result<TextTokensPrompt> {
        match input {
            PromptInput::Text {
                text,
                add_special_tokens,
            } => {
                let prompt_token_ids = encode_text(tokenizer, text, add_special_tokens).await?;
                Ok(TextTokensPrompt {
                    prompt: text.to_string(),
                    prompt_token_ids,
                })
            }
            PromptInput::Tokens(ids) => {
                // Special tokens stay visible in the reconstructed text
                let prompt = tokenizer.decode(ids, false)?;
                Ok(TextTokensPrompt {
                    prompt,
                    prompt_token_ids: ids.to_vec(),
                })
            }
        }
    }
}

/// Encode text, moving large inputs off the async worker threads
async fn encode_text(
    tokenizer: &Arc<dyn Tokenizer>,
    text: &str,
    add_special_tokens: bool,
) -> Result<Vec<TokenIdType>> {
    if text.len() <= ENCODE_OFFLOAD_THRESHOLD {
        return Ok(tokenizer
            .encode(text, add_special_tokens)?
            .token_ids()
            .to_vec());
    }

    let tokenizer = Arc::clone(tokenizer);
    let text = text.to_string();
    tokio::task::spawn_blocking(move || {
        tokenizer
            .encode(&text, add_special_tokens)
            .map(|encoding| encoding.token_ids().to_vec())
    })
    .await
    .map_err(|e| Error::msg(format!("Encoding task failed: {}", e)))?
}

/// Shape every message's `content` the way the template expects it
pub fn process_content_format(
    messages: &[ChatMessage],
    content_format: ChatTemplateContentFormat,
) -> PreprocessResult<Vec<Value>> {
    messages
        .iter()
        .map(|message| {
            let mut message_json = serde_json::to_value(message).map_err(|e| {
                PreprocessError::InvalidType(format!("Failed to serialize message: {}", e))
            })?;

            if let Some(content_value) = message_json
                .as_object_mut()
                .and_then(|obj| obj.get_mut("content"))
            {
                transform_content_field(content_value, content_format);
            }

            Ok(message_json)
        })
        .collect()
}

/// Transform a single content field based on content format
pub fn transform_content_field(content_value: &mut Value, content_format: ChatTemplateContentFormat) {
    match (content_format, &*content_value) {
        (ChatTemplateContentFormat::String, Value::Array(parts)) => {
            let text = parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n");
            *content_value = Value::String(text);
        }
        (ChatTemplateContentFormat::OpenAI, Value::String(text)) => {
            *content_value = json!([{"type": "text", "text": text}]);
        }
        (ChatTemplateContentFormat::OpenAI, Value::Array(parts)) => {
            // Media URLs become bare type placeholders
            let processed: Vec<Value> = parts
                .iter()
                .map(|part| match part.get("type").and_then(Value::as_str) {
                    Some("image_url") => json!({"type": "image"}),
                    Some("video_url") => json!({"type": "video"}),
                    Some("audio_url") => json!({"type": "audio"}),
                    _ => part.clone(),
                })
                .collect();
            *content_value = Value::Array(processed);
        }
        _ => {}
    }
}

/// Templates expect tool call arguments as objects, not JSON strings
pub fn process_tool_call_arguments(messages: &mut [Value]) -> PreprocessResult<()> {
    let calls = messages
        .iter_mut()
        .filter(|msg| msg.get("role").and_then(Value::as_str) == Some("assistant"))
        .filter_map(|msg| msg.get_mut("tool_calls").and_then(Value::as_array_mut))
        .flatten();

    for call in calls {
        let Some(arguments) = call
            .get_mut("function")
            .and_then(|f| f.get_mut("arguments"))
        else {
            continue;
        };
        if let Value::String(raw) = arguments {
            let parsed: Value = serde_json::from_str(raw).map_err(|e| {
                PreprocessError::InvalidValue(format!(
                    "Failed to parse tool call arguments as JSON: '{}'. Error: {}",
                    raw, e
                ))
            })?;
            *arguments = parsed;
        }
    }
    Ok(())
}
