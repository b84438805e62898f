//! Tokenizer configuration sanitizer.
//!
//! Turns a tokenizer's stored init configuration into a plain JSON mapping that
//! can be returned to callers: file locations are dropped, token wrapper objects
//! are flattened to their content and the tokenizer family is recorded.

use serde_json::{Map, Value};

use crate::{
    protocols::tokenize::TokenizerInfoResponse,
    tokenizer::{ConfigValue, Tokenizer},
};

/// Keys that point at files on the server and never leave it
const STRIPPED_KEYS: [&str; 3] = ["vocab_file", "merges_file", "chat_template"];

/// Maps a non-plain leaf to its display value, or `None` to leave it as is
pub type LeafExtractor = fn(&ConfigValue) -> Option<Value>;

/// Default extractor: added-token wrappers become their content string
pub fn added_token_content(value: &ConfigValue) -> Option<Value> {
    match value {
        ConfigValue::AddedToken(token) => Some(Value::String(token.content.clone())),
        _ => None,
    }
}

pub struct TokenizerInfo<'a> {
    tokenizer: &'a dyn Tokenizer,
    chat_template: Option<&'a str>,
    extractor: LeafExtractor,
}

impl<'a> TokenizerInfo<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer, chat_template: Option<&'a str>) -> Self {
        Self {
            tokenizer,
            chat_template,
            extractor: added_token_content,
        }
    }

    pub fn with_extractor(mut self, extractor: LeafExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn to_response(&self) -> TokenizerInfoResponse {
        let mut config = Map::new();

        if let Some(init_config) = self.tokenizer.init_config() {
            for (key, value) in init_config {
                if STRIPPED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                config.insert(key.clone(), make_serializable(value, self.extractor));
            }
        }

        config.insert(
            "tokenizer_class".to_string(),
            Value::String(self.tokenizer.family().as_str().to_string()),
        );

        if let Some(template) = self.chat_template {
            config.insert(
                "chat_template".to_string(),
                Value::String(template.to_string()),
            );
        }

        TokenizerInfoResponse(config)
    }
}

/// Rewrite a config tree into JSON, keeping keys and ordering intact
pub fn make_serializable(value: &ConfigValue, extractor: LeafExtractor) -> Value {
    if let Some(extracted) = extractor(value) {
        return extracted;
    }

    match value {
        ConfigValue::Null => Value::Null,
        ConfigValue::Bool(b) => Value::Bool(*b),
        ConfigValue::Number(n) => Value::Number(n.clone()),
        ConfigValue::String(s) => Value::String(s.clone()),
        ConfigValue::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| make_serializable(item, extractor))
                .collect(),
        ),
        ConfigValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), make_serializable(v, extractor)))
                .collect(),
        ),
        // Only reached when a custom extractor declines the wrapper
        ConfigValue::AddedToken(token) => Value::String(token.content.clone()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tokenizer::{init_config::init_config_from_json, mock::MockTokenizer, TokenizerFamily};

    fn llama_like() -> MockTokenizer {
        MockTokenizer::new().with_init_config(init_config_from_json(json!({
            "vocab_file": "/models/llama/tokenizer.model",
            "merges_file": "/models/llama/merges.txt",
            "chat_template": "{{ secret }}",
            "tokenizer_class": "LlamaTokenizerFast",
            "model_max_length": 4096,
            "bos_token": {"__type": "AddedToken", "content": "<s>", "special": true},
            "added_tokens_decoder": {
                "0": {"__type": "AddedToken", "content": "<unk>", "special": true}
            },
            "extra_special_tokens": [
                {"__type": "AddedToken", "content": "<|a|>"},
                "<|b|>"
            ]
        })))
    }

    #[test]
    fn test_sanitize_strips_paths_and_flattens_tokens() {
        let tokenizer = llama_like();
        let info = TokenizerInfo::new(&tokenizer, None).to_response();

        assert!(info.get("vocab_file").is_none());
        assert!(info.get("merges_file").is_none());
        assert!(info.get("chat_template").is_none());
        assert_eq!(info.get("bos_token"), Some(&json!("<s>")));
        assert_eq!(
            info.get("added_tokens_decoder"),
            Some(&json!({"0": "<unk>"}))
        );
        assert_eq!(
            info.get("extra_special_tokens"),
            Some(&json!(["<|a|>", "<|b|>"]))
        );
        assert_eq!(info.get("model_max_length"), Some(&json!(4096)));
    }

    #[test]
    fn test_untagged_added_tokens_are_flattened() {
        let tokenizer = MockTokenizer::new().with_init_config(init_config_from_json(json!({
            "added_tokens_decoder": {
                "0": {
                    "content": "<unk>", "lstrip": false, "normalized": false,
                    "rstrip": false, "single_word": false, "special": true
                },
                "32000": {"content": "<|im_end|>", "special": true}
            },
            "eos_token": {"content": "<|im_end|>", "special": true},
            "pad_token": null
        })));
        let info = TokenizerInfo::new(&tokenizer, None).to_response();

        assert_eq!(
            info.get("added_tokens_decoder"),
            Some(&json!({"0": "<unk>", "32000": "<|im_end|>"}))
        );
        assert_eq!(info.get("eos_token"), Some(&json!("<|im_end|>")));
        assert_eq!(info.get("pad_token"), Some(&Value::Null));
    }

    #[test]
    fn test_tokenizer_class_is_family_name() {
        let tokenizer = llama_like();
        let info = TokenizerInfo::new(&tokenizer, None).to_response();
        assert_eq!(info.tokenizer_class(), Some("PreTrainedTokenizerFast"));

        let slow = llama_like().with_family(TokenizerFamily::PreTrainedTokenizer);
        let info = TokenizerInfo::new(&slow, None).to_response();
        assert_eq!(info.tokenizer_class(), Some("PreTrainedTokenizer"));
    }

    #[test]
    fn test_chat_template_only_when_supplied() {
        let tokenizer = llama_like();
        let info = TokenizerInfo::new(&tokenizer, Some("")).to_response();
        assert_eq!(info.chat_template(), Some(""));
    }

    #[test]
    fn test_tokenizer_without_init_config() {
        let tokenizer = MockTokenizer::new();
        let info = TokenizerInfo::new(&tokenizer, None).to_response();
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"tokenizer_class": "PreTrainedTokenizerFast"})
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let tokenizer = llama_like();
        let first = TokenizerInfo::new(&tokenizer, None).to_response();

        let reloaded = MockTokenizer::new()
            .with_init_config(init_config_from_json(Value::Object(first.0.clone())));
        let second = TokenizerInfo::new(&reloaded, None).to_response();

        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_extractor() {
        fn redact_numbers(value: &ConfigValue) -> Option<Value> {
            match value {
                ConfigValue::Number(_) => Some(json!("<redacted>")),
                other => added_token_content(other),
            }
        }

        let tokenizer = llama_like();
        let info = TokenizerInfo::new(&tokenizer, None)
            .with_extractor(redact_numbers)
            .to_response();
        assert_eq!(info.get("model_max_length"), Some(&json!("<redacted>")));
        assert_eq!(info.get("bos_token"), Some(&json!("<s>")));
    }
}
