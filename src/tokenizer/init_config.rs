//! Tokenizer initialization parameters as an owned value tree.
//!
//! `tokenizer_config.json` is open-ended: besides plain JSON it embeds token
//! wrapper objects (`{"__type": "AddedToken", "content": "<s>", ...}`) that carry
//! metadata around a token string. Newer files drop the `__type` marker, so the
//! special-token keys and the `added_tokens_decoder` entries are read as tokens
//! whenever they carry a string `content`. Either way they are kept as a
//! dedicated variant so consumers can decide how to flatten them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Init parameters keyed by name
pub type InitConfig = BTreeMap<String, ConfigValue>;

/// Marker used by HuggingFace to tag serialized added tokens
const ADDED_TOKEN_TYPE: &str = "AddedToken";

/// Keys whose object values are token wrappers even without the `__type` marker
const SPECIAL_TOKEN_KEYS: &[&str] = &[
    "bos_token",
    "eos_token",
    "unk_token",
    "sep_token",
    "pad_token",
    "cls_token",
    "mask_token",
    "additional_special_tokens",
];

const ADDED_TOKENS_DECODER_KEY: &str = "added_tokens_decoder";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ConfigValue>),
    Object(BTreeMap<String, ConfigValue>),
    /// A token wrapped with its matching/normalization metadata
    AddedToken(AddedToken),
}

/// Token wrapper as serialized in `tokenizer_config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedToken {
    pub content: String,
    #[serde(default)]
    pub single_word: bool,
    #[serde(default)]
    pub lstrip: bool,
    #[serde(default)]
    pub rstrip: bool,
    #[serde(default = "default_true")]
    pub normalized: bool,
    #[serde(default)]
    pub special: bool,
}

impl AddedToken {
    pub fn new(content: impl Into<String>, special: bool) -> Self {
        Self {
            content: content.into(),
            single_word: false,
            lstrip: false,
            rstrip: false,
            normalized: !special,
            special,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ConfigValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn is_added_token_object(map: &serde_json::Map<String, Value>) -> bool {
        map.get("__type").and_then(Value::as_str) == Some(ADDED_TOKEN_TYPE)
            && Self::has_string_content(map)
    }

    fn has_string_content(map: &serde_json::Map<String, Value>) -> bool {
        map.get("content").map(Value::is_string).unwrap_or(false)
    }

    /// Convert a value sitting where a token is expected, marker or not
    fn from_token_position(value: Value) -> Self {
        match value {
            Value::Object(map) if Self::has_string_content(&map) => {
                match serde_json::from_value::<AddedToken>(Value::Object(map.clone())) {
                    Ok(token) => ConfigValue::AddedToken(token),
                    Err(_) => ConfigValue::from(Value::Object(map)),
                }
            }
            Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(Self::from_token_position).collect())
            }
            other => ConfigValue::from(other),
        }
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => ConfigValue::Number(n),
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(ConfigValue::from).collect())
            }
            Value::Object(map) => {
                if ConfigValue::is_added_token_object(&map) {
                    if let Ok(token) = serde_json::from_value::<AddedToken>(Value::Object(map.clone()))
                    {
                        return ConfigValue::AddedToken(token);
                    }
                }
                ConfigValue::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, ConfigValue::from(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<AddedToken> for ConfigValue {
    fn from(token: AddedToken) -> Self {
        ConfigValue::AddedToken(token)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<u64> for ConfigValue {
    fn from(n: u64) -> Self {
        ConfigValue::Number(n.into())
    }
}

/// Build an init config from a parsed JSON document.
///
/// Anything other than a JSON object yields an empty config.
pub fn init_config_from_json(value: Value) -> InitConfig {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                let value = if SPECIAL_TOKEN_KEYS.contains(&k.as_str()) {
                    ConfigValue::from_token_position(v)
                } else if k == ADDED_TOKENS_DECODER_KEY {
                    added_tokens_decoder_from_json(v)
                } else {
                    ConfigValue::from(v)
                };
                (k, value)
            })
            .collect(),
        _ => InitConfig::new(),
    }
}

fn added_tokens_decoder_from_json(value: Value) -> ConfigValue {
    match value {
        Value::Object(entries) => ConfigValue::Object(
            entries
                .into_iter()
                .map(|(id, token)| (id, ConfigValue::from_token_position(token)))
                .collect(),
        ),
        other => ConfigValue::from(other),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_added_token_recognized() {
        let value = json!({
            "__type": "AddedToken",
            "content": "<s>",
            "lstrip": false,
            "normalized": false,
            "rstrip": false,
            "single_word": false,
            "special": true
        });
        match ConfigValue::from(value) {
            ConfigValue::AddedToken(token) => {
                assert_eq!(token.content, "<s>");
                assert!(token.special);
                assert!(!token.normalized);
            }
            other => panic!("expected AddedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_object_with_content_key_is_not_a_token() {
        let value = json!({"content": "<s>", "special": true});
        assert!(matches!(ConfigValue::from(value), ConfigValue::Object(_)));
    }

    #[test]
    fn test_nested_tokens_in_decoder_map() {
        let value = json!({
            "added_tokens_decoder": {
                "0": {"content": "<unk>", "special": true, "__type": "AddedToken"},
                "1": {"content": "<s>", "special": true, "__type": "AddedToken"}
            }
        });
        let config = init_config_from_json(value);
        let decoder = match config.get("added_tokens_decoder") {
            Some(ConfigValue::Object(map)) => map,
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(decoder.get("1"), Some(ConfigValue::AddedToken(t)) if t.content == "<s>"));
    }

    #[test]
    fn test_untagged_tokens_in_decoder_map() {
        let config = init_config_from_json(json!({
            "added_tokens_decoder": {
                "0": {
                    "content": "<unk>", "lstrip": false, "normalized": false,
                    "rstrip": false, "single_word": false, "special": true
                }
            }
        }));
        let decoder = match config.get("added_tokens_decoder") {
            Some(ConfigValue::Object(map)) => map,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(
            decoder.get("0"),
            Some(&ConfigValue::AddedToken(AddedToken::new("<unk>", true)))
        );
    }

    #[test]
    fn test_untagged_special_token_keys() {
        let config = init_config_from_json(json!({
            "bos_token": {"content": "<s>", "special": true},
            "pad_token": "<pad>",
            "additional_special_tokens": [{"content": "<tool>"}, "<sep>"],
            "extra": {"content": "not a token"}
        }));
        assert!(matches!(
            config.get("bos_token"),
            Some(ConfigValue::AddedToken(t)) if t.content == "<s>" && t.special
        ));
        assert_eq!(config.get("pad_token"), Some(&ConfigValue::from("<pad>")));
        match config.get("additional_special_tokens") {
            Some(ConfigValue::Array(items)) => {
                assert!(matches!(&items[0], ConfigValue::AddedToken(t) if t.content == "<tool>"));
                assert_eq!(items[1], ConfigValue::from("<sep>"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(config.get("extra"), Some(ConfigValue::Object(_))));
    }

    #[test]
    fn test_non_object_document_is_empty() {
        assert!(init_config_from_json(json!(["a", "b"])).is_empty());
        assert!(init_config_from_json(Value::Null).is_empty());
    }
}
