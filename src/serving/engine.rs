//! Engine client: the source of tokenizer instances for serving operations

use std::{path::Path, sync::Arc};

use anyhow::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::adapters::LoraRequest;
use crate::tokenizer::{create_tokenizer, Tokenizer};

/// Supplies the active tokenizer, optionally specialized for a LoRA adapter
#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn get_tokenizer(&self, lora_request: Option<&LoraRequest>) -> Result<Arc<dyn Tokenizer>>;
}

/// In-process engine client holding the base tokenizer.
///
/// Callers get an `Arc` snapshot, so [`LocalEngineClient::replace_tokenizer`]
/// only affects acquisitions made after it returns.
pub struct LocalEngineClient {
    tokenizer: RwLock<Arc<dyn Tokenizer>>,
    /// `None` records an adapter without a usable tokenizer of its own
    lora_tokenizers: DashMap<String, Option<Arc<dyn Tokenizer>>>,
}

impl LocalEngineClient {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer: RwLock::new(tokenizer),
            lora_tokenizers: DashMap::new(),
        }
    }

    pub fn tokenizer(&self) -> Arc<dyn Tokenizer> {
        self.tokenizer.read().clone()
    }

    pub fn replace_tokenizer(&self, tokenizer: Arc<dyn Tokenizer>) {
        *self.tokenizer.write() = tokenizer;
    }

    async fn load_lora_tokenizer(lora: &LoraRequest) -> Option<Arc<dyn Tokenizer>> {
        if !Path::new(&lora.lora_path).join("tokenizer.json").is_file() {
            return None;
        }

        let path = lora.lora_path.clone();
        let loaded = tokio::task::spawn_blocking(move || create_tokenizer(&path))
            .await
            .map_err(|e| Error::msg(format!("Tokenizer loading task failed: {}", e)))
            .and_then(|result| result);

        match loaded {
            Ok(tokenizer) => {
                info!(lora = %lora.lora_name, path = %lora.lora_path, "Loaded LoRA tokenizer");
                Some(tokenizer)
            }
            Err(e) => {
                warn!(
                    lora = %lora.lora_name,
                    error = %e,
                    "No tokenizer found in LoRA adapter, using base model tokenizer"
                );
                None
            }
        }
    }
}

#[async_trait]
impl EngineClient for LocalEngineClient {
    async fn get_tokenizer(&self, lora_request: Option<&LoraRequest>) -> Result<Arc<dyn Tokenizer>> {
        let Some(lora) = lora_request else {
            return Ok(self.tokenizer());
        };

        let cached = self
            .lora_tokenizers
            .get(&lora.lora_name)
            .map(|entry| entry.value().clone());

        let lora_tokenizer = match cached {
            Some(entry) => entry,
            None => {
                let loaded = Self::load_lora_tokenizer(lora).await;
                self.lora_tokenizers
                    .insert(lora.lora_name.clone(), loaded.clone());
                loaded
            }
        };

        Ok(lora_tokenizer.unwrap_or_else(|| self.tokenizer()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{mock::MockTokenizer, TokenizerFamily};

    fn lora(path: &str) -> LoraRequest {
        LoraRequest {
            lora_name: "adapter".to_string(),
            lora_int_id: 1,
            lora_path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_base_tokenizer_without_lora() {
        let client = LocalEngineClient::new(Arc::new(MockTokenizer::new()));
        let tokenizer = client.get_tokenizer(None).await.unwrap();
        assert_eq!(tokenizer.token_to_id("hello"), Some(1));
    }

    #[tokio::test]
    async fn test_lora_without_tokenizer_falls_back_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalEngineClient::new(Arc::new(MockTokenizer::new()));
        let tokenizer = client
            .get_tokenizer(Some(&lora(dir.path().to_str().unwrap())))
            .await
            .unwrap();
        assert_eq!(tokenizer.token_to_id("hello"), Some(1));
    }

    #[tokio::test]
    async fn test_replace_tokenizer_is_seen_by_later_calls() {
        let client = LocalEngineClient::new(Arc::new(MockTokenizer::new()));
        let before = client.get_tokenizer(None).await.unwrap();

        client.replace_tokenizer(Arc::new(
            MockTokenizer::new().with_family(TokenizerFamily::PreTrainedTokenizer),
        ));

        let after = client.get_tokenizer(None).await.unwrap();
        assert_eq!(before.family(), TokenizerFamily::PreTrainedTokenizerFast);
        assert_eq!(after.family(), TokenizerFamily::PreTrainedTokenizer);
    }
}
