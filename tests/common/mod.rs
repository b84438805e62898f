// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::{fs, path::Path, sync::Arc};

use axum::Router;
use serde_json::{json, Value};
use sgl_tokenizer_service::{
    app_context::AppContext,
    config::TokenizationConfig,
    server::{build_app, AppState},
};
use tempfile::TempDir;

pub const MODEL_NAME: &str = "test-model";

pub const CHAT_TEMPLATE: &str = "{% for m in messages %}{{ m.role }}: {{ m.content }}\n{% endfor %}{% if add_generation_prompt %}assistant:{% endif %}";

/// Ids of the base fixture vocabulary
pub mod ids {
    pub const UNK: u32 = 0;
    pub const HELLO: u32 = 1;
    pub const WORLD: u32 = 2;
    pub const BOS: u32 = 3;
    pub const EOS: u32 = 4;
    pub const USER: u32 = 5;
    pub const ASSISTANT: u32 = 6;
    pub const SYSTEM: u32 = 7;
    pub const COLON: u32 = 8;
}

pub fn base_vocab() -> Value {
    json!({
        "<unk>": ids::UNK,
        "hello": ids::HELLO,
        "world": ids::WORLD,
        "<s>": ids::BOS,
        "</s>": ids::EOS,
        "user": ids::USER,
        "assistant": ids::ASSISTANT,
        "system": ids::SYSTEM,
        ":": ids::COLON
    })
}

fn added_token(id: u32, content: &str) -> Value {
    json!({
        "id": id, "content": content, "single_word": false, "lstrip": false,
        "rstrip": false, "normalized": false, "special": true
    })
}

/// Write a word-level tokenizer.json with whitespace pre-tokenization
pub fn write_tokenizer_json(dir: &Path, vocab: Value) {
    let bos = vocab["<s>"].as_u64().unwrap_or(3) as u32;
    let eos = vocab["</s>"].as_u64().unwrap_or(4) as u32;
    let tokenizer_json = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [added_token(bos, "<s>"), added_token(eos, "</s>")],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<unk>"
        }
    });
    fs::write(
        dir.join("tokenizer.json"),
        serde_json::to_string(&tokenizer_json).unwrap(),
    )
    .unwrap();
}

pub fn tokenizer_config_json() -> Value {
    json!({
        "tokenizer_class": "LlamaTokenizer",
        "model_max_length": 128,
        "add_bos_token": true,
        "add_eos_token": false,
        "bos_token": {
            "__type": "AddedToken", "content": "<s>", "lstrip": false,
            "normalized": false, "rstrip": false, "single_word": false, "special": true
        },
        "eos_token": "</s>",
        "unk_token": "<unk>",
        "added_tokens_decoder": {
            "3": {"__type": "AddedToken", "content": "<s>", "special": true},
            "4": {"content": "</s>", "lstrip": false, "normalized": false, "rstrip": false, "single_word": false, "special": true}
        },
        "chat_template": CHAT_TEMPLATE
    })
}

/// Tokenizer directory with tokenizer.json and tokenizer_config.json
pub fn write_tokenizer_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_tokenizer_json(dir.path(), base_vocab());
    fs::write(
        dir.path().join("tokenizer_config.json"),
        serde_json::to_string(&tokenizer_config_json()).unwrap(),
    )
    .unwrap();
    dir
}

pub fn test_config(dir: &TempDir) -> TokenizationConfig {
    TokenizationConfig::builder()
        .host("127.0.0.1")
        .port(0)
        .tokenizer_path(dir.path().to_str().unwrap())
        .served_model_name(MODEL_NAME)
        .build_unchecked()
}

pub fn create_context(config: TokenizationConfig) -> Arc<AppContext> {
    Arc::new(AppContext::from_config(config).unwrap())
}

pub fn create_test_app(config: TokenizationConfig) -> Router {
    let context = create_context(config);
    let max_payload_size = context.config.max_payload_size;
    build_app(Arc::new(AppState { context }), max_payload_size)
}
