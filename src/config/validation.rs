use std::collections::HashSet;

use super::*;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &TokenizationConfig) -> ConfigResult<()> {
        Self::validate_model(config)?;
        Self::validate_adapters(config)?;
        Self::validate_server_settings(config)?;
        Ok(())
    }

    fn validate_model(config: &TokenizationConfig) -> ConfigResult<()> {
        if config.tokenizer_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "tokenizer_path".to_string(),
            });
        }

        if config.served_model_names.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "served_model_names".to_string(),
            });
        }

        if let Some(name) = config.served_model_names.iter().find(|n| n.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "served_model_names".to_string(),
                value: name.clone(),
                reason: "model names must be non-empty".to_string(),
            });
        }

        if config.max_model_len == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_model_len".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }

    fn validate_adapters(config: &TokenizationConfig) -> ConfigResult<()> {
        let mut seen: HashSet<&str> = config
            .served_model_names
            .iter()
            .map(String::as_str)
            .collect();

        let adapter_names = config
            .lora_modules
            .iter()
            .map(|m| m.name.as_str())
            .chain(config.prompt_adapters.iter().map(|a| a.name.as_str()));

        for name in adapter_names {
            if !seen.insert(name) {
                return Err(ConfigError::ValidationFailed {
                    reason: format!(
                        "adapter name '{}' collides with a served model or another adapter",
                        name
                    ),
                });
            }
        }

        Ok(())
    }

    fn validate_server_settings(config: &TokenizationConfig) -> ConfigResult<()> {
        if config.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if config.max_log_len == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_log_len".to_string(),
                value: "0".to_string(),
                reason: "must be positive; omit it to log full prompts".to_string(),
            });
        }

        Ok(())
    }
}
