//! Resolution of a request's model name to a fine-tuning adapter

use std::collections::HashMap;

use crate::config::{LoraModulePath, PromptAdapterPath};

/// A LoRA adapter selected for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraRequest {
    pub lora_name: String,
    /// Stable id, starting at 1 in registration order
    pub lora_int_id: u32,
    pub lora_path: String,
}

/// A prompt adapter selected for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAdapterRequest {
    pub prompt_adapter_name: String,
    pub prompt_adapter_id: u32,
    pub prompt_adapter_local_path: String,
    pub prompt_adapter_num_virtual_tokens: usize,
}

/// Adapters known to the server, keyed by the model name they are served under
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    lora: HashMap<String, LoraRequest>,
    prompt_adapters: HashMap<String, PromptAdapterRequest>,
}

impl AdapterRegistry {
    pub fn new(lora_modules: &[LoraModulePath], prompt_adapters: &[PromptAdapterPath]) -> Self {
        let lora = lora_modules
            .iter()
            .zip(1u32..)
            .map(|(module, id)| {
                (
                    module.name.clone(),
                    LoraRequest {
                        lora_name: module.name.clone(),
                        lora_int_id: id,
                        lora_path: module.path.clone(),
                    },
                )
            })
            .collect();

        let prompt_adapters = prompt_adapters
            .iter()
            .zip(1u32..)
            .map(|(adapter, id)| {
                (
                    adapter.name.clone(),
                    PromptAdapterRequest {
                        prompt_adapter_name: adapter.name.clone(),
                        prompt_adapter_id: id,
                        prompt_adapter_local_path: adapter.path.clone(),
                        prompt_adapter_num_virtual_tokens: adapter.num_virtual_tokens,
                    },
                )
            })
            .collect();

        Self {
            lora,
            prompt_adapters,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lora.contains_key(name) || self.prompt_adapters.contains_key(name)
    }

    /// Map a model name to the adapter it selects.
    ///
    /// Total: base model names, unknown names and `None` all yield `(None, None)`.
    pub fn resolve(
        &self,
        model: Option<&str>,
    ) -> (Option<LoraRequest>, Option<PromptAdapterRequest>) {
        let Some(model) = model.filter(|m| !m.is_empty()) else {
            return (None, None);
        };

        if let Some(lora) = self.lora.get(model) {
            return (Some(lora.clone()), None);
        }

        if let Some(adapter) = self.prompt_adapters.get(model) {
            return (None, Some(adapter.clone()));
        }

        (None, None)
    }
}
