mod common;

use common::{ids, write_tokenizer_dir, write_tokenizer_json, CHAT_TEMPLATE, MODEL_NAME};
use serde_json::json;
use sgl_tokenizer_service::{
    config::{LoraModulePath, TokenizationConfig},
    protocols::tokenize::{DetokenizeRequest, TokenizeRequest},
    serving::ServingError,
};
use tempfile::TempDir;

fn tokenize_request(value: serde_json::Value) -> TokenizeRequest {
    serde_json::from_value(value).unwrap()
}

fn detokenize_request(tokens: Vec<u32>) -> DetokenizeRequest {
    DetokenizeRequest {
        model: None,
        tokens,
    }
}

#[tokio::test]
async fn test_tokenize_completion_counts_tokens() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let response = context
        .tokenization
        .create_tokenize(
            &tokenize_request(json!({
                "model": MODEL_NAME,
                "prompt": "hello world",
                "add_special_tokens": false,
                "return_token_strs": true
            })),
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.tokens, vec![ids::HELLO, ids::WORLD]);
    assert_eq!(response.count, 2);
    assert_eq!(
        response.token_strs,
        Some(vec!["hello".to_string(), "world".to_string()])
    );
    assert_eq!(response.max_model_len, 128);
}

#[tokio::test]
async fn test_tokenize_completion_adds_bos_by_default() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let response = context
        .tokenization
        .create_tokenize(&tokenize_request(json!({"prompt": "hello world"})), None)
        .await
        .unwrap();

    assert_eq!(response.tokens, vec![ids::BOS, ids::HELLO, ids::WORLD]);
    assert_eq!(response.count, response.tokens.len());
}

#[tokio::test]
async fn test_tokenize_chat_uses_tokenizer_template() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let response = context
        .tokenization
        .create_tokenize(
            &tokenize_request(json!({
                "messages": [{"role": "user", "content": "hello world"}]
            })),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        response.tokens,
        vec![
            ids::USER,
            ids::COLON,
            ids::HELLO,
            ids::WORLD,
            ids::ASSISTANT,
            ids::COLON
        ]
    );
}

#[tokio::test]
async fn test_tokenize_chat_with_served_template_override() {
    let dir = write_tokenizer_dir();
    let config = TokenizationConfig {
        chat_template: Some("{% for m in messages %}{{ m.content }} {% endfor %}".to_string()),
        ..common::test_config(&dir)
    };
    let context = common::create_context(config);

    let response = context
        .tokenization
        .create_tokenize(
            &tokenize_request(json!({
                "messages": [
                    {"role": "system", "content": "hello"},
                    {"role": "user", "content": [{"type": "text", "text": "world"}]}
                ]
            })),
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.tokens, vec![ids::HELLO, ids::WORLD]);
}

#[tokio::test]
async fn test_tokenize_continue_final_message() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let response = context
        .tokenization
        .create_tokenize(
            &tokenize_request(json!({
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "world"}
                ],
                "add_generation_prompt": false,
                "continue_final_message": true
            })),
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        response.tokens,
        vec![
            ids::USER,
            ids::COLON,
            ids::HELLO,
            ids::ASSISTANT,
            ids::COLON,
            ids::WORLD
        ]
    );
}

#[tokio::test]
async fn test_malformed_template_override_is_rejected() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let err = context
        .tokenization
        .create_tokenize(
            &tokenize_request(json!({
                "messages": [{"role": "user", "content": "hello"}],
                "chat_template": "{{ messages[0].content "
            })),
            None,
        )
        .await
        .unwrap_err();

    match err {
        ServingError::Rejected(response) => {
            assert_eq!(response.code, 400);
            assert!(!response.message.is_empty());
        }
        ServingError::Internal(e) => panic!("unexpected internal error: {}", e),
    }
}

#[tokio::test]
async fn test_detokenize_round_trip() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));
    let service = &context.tokenization;

    let tokens = service
        .create_tokenize(
            &tokenize_request(json!({"prompt": "hello world", "add_special_tokens": false})),
            None,
        )
        .await
        .unwrap()
        .tokens;

    let response = service
        .create_detokenize(&detokenize_request(tokens), Some("round-trip"))
        .await
        .unwrap();
    assert_eq!(response.prompt, "hello world");
}

#[tokio::test]
async fn test_detokenize_keeps_special_tokens() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let response = context
        .tokenization
        .create_detokenize(
            &detokenize_request(vec![ids::BOS, ids::HELLO, ids::WORLD]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.prompt, "<s> hello world");
}

#[tokio::test]
async fn test_tokenizer_info_is_sanitized() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let info = context.tokenization.get_tokenizer_info(false).await.unwrap();
    assert_eq!(info.tokenizer_class(), Some("PreTrainedTokenizerFast"));
    assert!(info.get("vocab_file").is_none());
    assert!(info.get("merges_file").is_none());
    assert!(info.chat_template().is_none());
    assert_eq!(info.get("bos_token"), Some(&json!("<s>")));
    assert_eq!(info.get("eos_token"), Some(&json!("</s>")));
    assert_eq!(info.get("model_max_length"), Some(&json!(128)));
    assert_eq!(
        info.get("added_tokens_decoder"),
        Some(&json!({"3": "<s>", "4": "</s>"}))
    );

    let info = context.tokenization.get_tokenizer_info(true).await.unwrap();
    assert_eq!(info.chat_template(), Some(CHAT_TEMPLATE));
}

#[tokio::test]
async fn test_lora_adapter_with_own_tokenizer() {
    let dir = write_tokenizer_dir();
    let lora_dir = TempDir::new().unwrap();
    write_tokenizer_json(
        lora_dir.path(),
        json!({"<unk>": 0, "<s>": 1, "</s>": 2, "world": 10, "hello": 11}),
    );

    let config = TokenizationConfig {
        lora_modules: vec![LoraModulePath {
            name: "swapped".to_string(),
            path: lora_dir.path().to_str().unwrap().to_string(),
        }],
        ..common::test_config(&dir)
    };
    let context = common::create_context(config);

    let request = tokenize_request(json!({
        "model": "swapped",
        "prompt": "hello world",
        "add_special_tokens": false
    }));
    let response = context
        .tokenization
        .create_tokenize(&request, None)
        .await
        .unwrap();
    assert_eq!(response.tokens, vec![11, 10]);

    let base = context
        .tokenization
        .create_tokenize(
            &tokenize_request(json!({"prompt": "hello world", "add_special_tokens": false})),
            None,
        )
        .await
        .unwrap();
    assert_eq!(base.tokens, vec![ids::HELLO, ids::WORLD]);
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let dir = write_tokenizer_dir();
    let context = common::create_context(common::test_config(&dir));

    let err = context
        .tokenization
        .create_detokenize(
            &DetokenizeRequest {
                model: Some("missing".to_string()),
                tokens: vec![1],
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServingError::Rejected(ref r) if r.code == 404));
}
