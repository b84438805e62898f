use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{validation::ConfigValidator, ConfigError, ConfigResult};
use crate::tokenizer::chat_template::ChatTemplateContentFormatOption;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizationConfig {
    pub host: String,
    pub port: u16,
    /// Path to a tokenizer.json file or a directory containing one
    pub tokenizer_path: String,
    /// Names the base model is served under; the first one is the default
    pub served_model_names: Vec<String>,
    /// Derived from the tokenizer's `model_max_length` when not set
    pub max_model_len: Option<usize>,
    /// Inline Jinja template or a path to a template file
    pub chat_template: Option<String>,
    #[serde(default)]
    pub chat_template_content_format: ChatTemplateContentFormatOption,
    #[serde(default)]
    pub lora_modules: Vec<LoraModulePath>,
    #[serde(default)]
    pub prompt_adapters: Vec<PromptAdapterPath>,
    pub enable_request_logging: bool,
    /// Truncate logged prompts and token ids to this many characters/ids
    pub max_log_len: Option<usize>,
    pub max_payload_size: usize,
    pub log_level: Option<String>,
    pub log_dir: Option<String>,
    #[serde(default)]
    pub log_json: bool,
    pub shutdown_grace_period_secs: u64,
}

impl Default for TokenizationConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tokenizer_path: String::new(),
            served_model_names: Vec::new(),
            max_model_len: None,
            chat_template: None,
            chat_template_content_format: ChatTemplateContentFormatOption::Auto,
            lora_modules: Vec::new(),
            prompt_adapters: Vec::new(),
            enable_request_logging: true,
            max_log_len: None,
            max_payload_size: 32 * 1024 * 1024,
            log_level: None,
            log_dir: None,
            log_json: false,
            shutdown_grace_period_secs: 30,
        }
    }
}

impl TokenizationConfig {
    /// Create a builder for TokenizationConfig
    pub fn builder() -> super::TokenizationConfigBuilder {
        super::TokenizationConfigBuilder::new()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        ConfigValidator::validate(self)
    }

    /// The name requests resolve to when they carry no model reference
    pub fn default_model_name(&self) -> Option<&str> {
        self.served_model_names.first().map(String::as_str)
    }
}

/// A LoRA adapter served under its own model name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoraModulePath {
    pub name: String,
    pub path: String,
}

impl FromStr for LoraModulePath {
    type Err = ConfigError;

    /// Parses `name=path`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            field: "lora_modules".to_string(),
            value: s.to_string(),
            reason: "expected format name=path".to_string(),
        })?;
        if name.trim().is_empty() || path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lora_modules".to_string(),
                value: s.to_string(),
                reason: "name and path must be non-empty".to_string(),
            });
        }
        Ok(Self {
            name: name.trim().to_string(),
            path: path.trim().to_string(),
        })
    }
}

/// A prompt adapter served under its own model name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptAdapterPath {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub num_virtual_tokens: usize,
}

impl FromStr for PromptAdapterPath {
    type Err = ConfigError;

    /// Parses `name=path` or `name=path:num_virtual_tokens`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "prompt_adapters".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (name, rest) = s
            .split_once('=')
            .ok_or_else(|| invalid("expected format name=path[:num_virtual_tokens]"))?;

        let (path, num_virtual_tokens) = match rest.rsplit_once(':') {
            Some((path, n)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => {
                let n = n
                    .parse::<usize>()
                    .map_err(|_| invalid("num_virtual_tokens must be an integer"))?;
                (path, n)
            }
            _ => (rest, 0),
        };

        if name.trim().is_empty() || path.trim().is_empty() {
            return Err(invalid("name and path must be non-empty"));
        }

        Ok(Self {
            name: name.trim().to_string(),
            path: path.trim().to_string(),
            num_virtual_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TokenizationConfig::default();
        assert_eq!(config.port, 8000);
        assert!(config.enable_request_logging);
        assert_eq!(
            config.chat_template_content_format,
            ChatTemplateContentFormatOption::Auto
        );
        assert!(config.default_model_name().is_none());
    }

    #[test]
    fn test_parse_lora_module() {
        let lora: LoraModulePath = "sql-lora=/adapters/sql".parse().unwrap();
        assert_eq!(lora.name, "sql-lora");
        assert_eq!(lora.path, "/adapters/sql");

        assert!("no-separator".parse::<LoraModulePath>().is_err());
        assert!("=/path".parse::<LoraModulePath>().is_err());
    }

    #[test]
    fn test_parse_prompt_adapter() {
        let adapter: PromptAdapterPath = "pa=/adapters/pa:8".parse().unwrap();
        assert_eq!(adapter.name, "pa");
        assert_eq!(adapter.path, "/adapters/pa");
        assert_eq!(adapter.num_virtual_tokens, 8);

        let adapter: PromptAdapterPath = "pa=C:/adapters/pa".parse().unwrap();
        assert_eq!(adapter.path, "C:/adapters/pa");
        assert_eq!(adapter.num_virtual_tokens, 0);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = TokenizationConfig {
            tokenizer_path: "/models/llama".to_string(),
            served_model_names: vec!["llama".to_string()],
            max_model_len: Some(4096),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TokenizationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.served_model_names, vec!["llama"]);
        assert_eq!(parsed.max_model_len, Some(4096));
    }
}
