use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{info, warn};

use super::adapters::{LoraRequest, PromptAdapterRequest};
use crate::tokenizer::TokenIdType;

/// What a serving operation received, as handed to the request logger
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestInputs<'a> {
    pub prompt: Option<&'a str>,
    pub prompt_token_ids: Option<&'a [TokenIdType]>,
    pub lora_request: Option<&'a LoraRequest>,
    pub prompt_adapter_request: Option<&'a PromptAdapterRequest>,
}

pub trait RequestLogger: Send + Sync {
    fn log_inputs(&self, request_id: &str, inputs: RequestInputs<'_>);
}

/// Logs received inputs as `info!` records, truncated to `max_log_len`
#[derive(Debug, Clone, Default)]
pub struct TracingRequestLogger {
    max_log_len: Option<usize>,
}

impl TracingRequestLogger {
    pub fn new(max_log_len: Option<usize>) -> Self {
        Self { max_log_len }
    }

    fn truncate_prompt<'a>(&self, prompt: &'a str) -> &'a str {
        match self.max_log_len {
            Some(max) => match prompt.char_indices().nth(max) {
                Some((idx, _)) => &prompt[..idx],
                None => prompt,
            },
            None => prompt,
        }
    }

    fn truncate_ids<'a>(&self, ids: &'a [TokenIdType]) -> &'a [TokenIdType] {
        match self.max_log_len {
            Some(max) if ids.len() > max => &ids[..max],
            _ => ids,
        }
    }
}

impl RequestLogger for TracingRequestLogger {
    fn log_inputs(&self, request_id: &str, inputs: RequestInputs<'_>) {
        let prompt = inputs.prompt.map(|p| self.truncate_prompt(p));
        let prompt_token_ids = inputs.prompt_token_ids.map(|ids| self.truncate_ids(ids));

        info!(
            request_id,
            prompt = ?prompt,
            prompt_token_ids = ?prompt_token_ids,
            lora_request = ?inputs.lora_request.map(|l| &l.lora_name),
            prompt_adapter_request = ?inputs.prompt_adapter_request.map(|a| &a.prompt_adapter_name),
            "Received request"
        );
    }
}

/// Run the logger without letting a panic escape into the request
pub fn log_inputs_best_effort(
    logger: Option<&dyn RequestLogger>,
    request_id: &str,
    inputs: RequestInputs<'_>,
) {
    let Some(logger) = logger else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| logger.log_inputs(request_id, inputs))).is_err() {
        warn!(request_id, "Request logger panicked; continuing without logging");
    }
}
