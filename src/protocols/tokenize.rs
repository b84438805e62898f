//! Tokenize, detokenize and tokenizer-info API protocol types

use std::collections::HashMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use super::{
    chat::{ChatMessage, Tool},
    ModelRequest,
};

// ============================================================================
// Tokenize API
// ============================================================================

/// Tokenize a flat prompt
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TokenizeCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub prompt: String,

    /// Add special tokens such as BOS on top of the prompt
    #[serde(default = "default_true")]
    pub add_special_tokens: bool,

    /// Also return the string form of every token
    #[serde(default)]
    pub return_token_strs: bool,
}

/// Tokenize a chat conversation rendered through the chat template
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_chat_flags"))]
pub struct TokenizeChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Overrides the served chat template for this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_template: Option<String>,

    /// Append the assistant turn opener after the conversation
    #[serde(default = "default_true")]
    pub add_generation_prompt: bool,

    /// Leave the final message open so generation continues it
    #[serde(default)]
    pub continue_final_message: bool,

    /// Extra variables handed to the template renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_template_kwargs: Option<HashMap<String, Value>>,

    /// Special tokens usually come from the template itself, hence off by default
    #[serde(default)]
    pub add_special_tokens: bool,

    #[serde(default)]
    pub return_token_strs: bool,
}

fn validate_chat_flags(req: &TokenizeChatRequest) -> Result<(), validator::ValidationError> {
    if req.add_generation_prompt && req.continue_final_message {
        let mut e = validator::ValidationError::new("generation_prompt_conflicts_with_continue");
        e.message = Some(
            "Cannot set both `continue_final_message` and `add_generation_prompt` to True.".into(),
        );
        return Err(e);
    }
    Ok(())
}

/// Request schema for the /tokenize endpoint.
///
/// The chat form is chosen whenever the body carries a `messages` field.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TokenizeRequest {
    Chat(TokenizeChatRequest),
    Completion(TokenizeCompletionRequest),
}

impl<'de> Deserialize<'de> for TokenizeRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let is_chat = value
            .as_object()
            .map(|obj| obj.contains_key("messages"))
            .ok_or_else(|| de::Error::custom("tokenize request must be a JSON object"))?;

        if is_chat {
            serde_json::from_value(value)
                .map(TokenizeRequest::Chat)
                .map_err(de::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(TokenizeRequest::Completion)
                .map_err(de::Error::custom)
        }
    }
}

impl Validate for TokenizeRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            TokenizeRequest::Chat(req) => req.validate(),
            TokenizeRequest::Completion(req) => req.validate(),
        }
    }
}

impl TokenizeRequest {
    pub fn return_token_strs(&self) -> bool {
        match self {
            TokenizeRequest::Chat(req) => req.return_token_strs,
            TokenizeRequest::Completion(req) => req.return_token_strs,
        }
    }
}

impl ModelRequest for TokenizeRequest {
    fn model(&self) -> Option<&str> {
        match self {
            TokenizeRequest::Chat(req) => req.model.as_deref(),
            TokenizeRequest::Completion(req) => req.model.as_deref(),
        }
    }
}

/// Response schema for the /tokenize endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenizeResponse {
    pub tokens: Vec<u32>,

    /// Present only when `return_token_strs` was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_strs: Option<Vec<String>>,

    pub count: usize,

    pub max_model_len: usize,
}

// ============================================================================
// Detokenize API
// ============================================================================

/// Request schema for the /detokenize endpoint
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DetokenizeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub tokens: Vec<u32>,
}

impl ModelRequest for DetokenizeRequest {
    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// Response schema for the /detokenize endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetokenizeResponse {
    pub prompt: String,
}

// ============================================================================
// Tokenizer Info API
// ============================================================================

/// Sanitized tokenizer configuration, always carrying `tokenizer_class`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TokenizerInfoResponse(pub Map<String, Value>);

impl TokenizerInfoResponse {
    pub fn tokenizer_class(&self) -> Option<&str> {
        self.0.get("tokenizer_class").and_then(Value::as_str)
    }

    pub fn chat_template(&self) -> Option<&str> {
        self.0.get("chat_template").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Query parameters of the /tokenizer_info endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenizerInfoQuery {
    #[serde(default)]
    pub include_chat_template: bool,
}

fn default_true() -> bool {
    true
}
