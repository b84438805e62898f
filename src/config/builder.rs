use super::{ConfigResult, LoraModulePath, PromptAdapterPath, TokenizationConfig};
use crate::tokenizer::chat_template::ChatTemplateContentFormatOption;

/// Builder for TokenizationConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct TokenizationConfigBuilder {
    config: TokenizationConfig,
}

impl TokenizationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: TokenizationConfig) -> Self {
        Self { config }
    }

    // ==================== Server ====================

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn shutdown_grace_period_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_grace_period_secs = secs;
        self
    }

    // ==================== Model ====================

    pub fn tokenizer_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.tokenizer_path = path.into();
        self
    }

    pub fn served_model_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.served_model_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn served_model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.served_model_names.push(name.into());
        self
    }

    pub fn max_model_len(mut self, len: usize) -> Self {
        self.config.max_model_len = Some(len);
        self
    }

    pub fn maybe_max_model_len(mut self, len: Option<usize>) -> Self {
        self.config.max_model_len = len;
        self
    }

    // ==================== Chat template ====================

    pub fn chat_template<S: Into<String>>(mut self, template: S) -> Self {
        self.config.chat_template = Some(template.into());
        self
    }

    pub fn maybe_chat_template(mut self, template: Option<impl Into<String>>) -> Self {
        self.config.chat_template = template.map(|t| t.into());
        self
    }

    pub fn chat_template_content_format(mut self, format: ChatTemplateContentFormatOption) -> Self {
        self.config.chat_template_content_format = format;
        self
    }

    // ==================== Adapters ====================

    pub fn lora_module(mut self, module: LoraModulePath) -> Self {
        self.config.lora_modules.push(module);
        self
    }

    pub fn lora_modules(mut self, modules: Vec<LoraModulePath>) -> Self {
        self.config.lora_modules = modules;
        self
    }

    pub fn prompt_adapter(mut self, adapter: PromptAdapterPath) -> Self {
        self.config.prompt_adapters.push(adapter);
        self
    }

    pub fn prompt_adapters(mut self, adapters: Vec<PromptAdapterPath>) -> Self {
        self.config.prompt_adapters = adapters;
        self
    }

    // ==================== Logging ====================

    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.config.enable_request_logging = enable;
        self
    }

    pub fn max_log_len(mut self, len: Option<usize>) -> Self {
        self.config.max_log_len = len;
        self
    }

    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = Some(level.into());
        self
    }

    pub fn log_dir(mut self, dir: Option<impl Into<String>>) -> Self {
        self.config.log_dir = dir.map(|d| d.into());
        self
    }

    pub fn log_json(mut self, json: bool) -> Self {
        self.config.log_json = json;
        self
    }

    // ==================== Build ====================

    /// Build the config with validation
    pub fn build(self) -> ConfigResult<TokenizationConfig> {
        self.build_with_validation(true)
    }

    pub fn build_unchecked(self) -> TokenizationConfig {
        self.config
    }

    pub fn build_with_validation(self, validate: bool) -> ConfigResult<TokenizationConfig> {
        if validate {
            self.config.validate()?;
        }
        Ok(self.config)
    }
}
