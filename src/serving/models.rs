use super::adapters::{AdapterRegistry, LoraRequest, PromptAdapterRequest};
use crate::{config::TokenizationConfig, protocols::error::ErrorResponse};

/// Static registry of the base model names and adapters this server answers for
#[derive(Debug, Clone)]
pub struct ServingModels {
    base_model_names: Vec<String>,
    adapters: AdapterRegistry,
}

impl ServingModels {
    pub fn new(base_model_names: Vec<String>, adapters: AdapterRegistry) -> Self {
        Self {
            base_model_names,
            adapters,
        }
    }

    pub fn from_config(config: &TokenizationConfig) -> Self {
        Self::new(
            config.served_model_names.clone(),
            AdapterRegistry::new(&config.lora_modules, &config.prompt_adapters),
        )
    }

    pub fn is_base_model(&self, model: &str) -> bool {
        self.base_model_names.iter().any(|name| name == model)
    }

    /// Reject requests naming a model this server does not serve.
    ///
    /// A missing or empty model name refers to the default model.
    pub fn check_model(&self, model: Option<&str>) -> Option<ErrorResponse> {
        let model = model.filter(|m| !m.is_empty())?;
        if self.is_base_model(model) || self.adapters.contains(model) {
            return None;
        }
        Some(
            ErrorResponse::not_found(format!("The model `{}` does not exist.", model))
                .with_param("model"),
        )
    }

    pub fn maybe_get_adapters(
        &self,
        model: Option<&str>,
    ) -> (Option<LoraRequest>, Option<PromptAdapterRequest>) {
        self.adapters.resolve(model)
    }
}
