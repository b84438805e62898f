mod common;

use axum::{
    body::Body,
    extract::Request,
    http::{header::CONTENT_TYPE, StatusCode},
    Router,
};
use common::{create_test_app, ids, test_config, write_tokenizer_dir, CHAT_TEMPLATE};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestContext {
    app: Router,
    _dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = write_tokenizer_dir();
        let app = create_test_app(test_config(&dir));
        Self { app, _dir: dir }
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header("x-request-id", "api-test")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

#[tokio::test]
async fn test_tokenize_endpoints() {
    let ctx = TestContext::new();

    for uri in ["/tokenize", "/v1/tokenize"] {
        let (status, body) = ctx
            .post(
                uri,
                json!({"prompt": "hello world", "add_special_tokens": false}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"tokens": [ids::HELLO, ids::WORLD], "count": 2, "max_model_len": 128})
        );
    }
}

#[tokio::test]
async fn test_tokenize_chat_with_token_strs() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .post(
            "/v1/tokenize",
            json!({
                "messages": [{"role": "user", "content": "hello"}],
                "add_generation_prompt": false,
                "return_token_strs": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokens"], json!([ids::USER, ids::COLON, ids::HELLO]));
    assert_eq!(body["token_strs"], json!(["user", ":", "hello"]));
    assert_eq!(body["count"], json!(3));
}

#[tokio::test]
async fn test_conflicting_chat_flags_are_rejected() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .post(
            "/tokenize",
            json!({
                "messages": [{"role": "user", "content": "hello"}],
                "add_generation_prompt": true,
                "continue_final_message": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["object"], "error");
    assert_eq!(body["type"], "BadRequestError");
    assert_eq!(
        body["message"],
        "Cannot set both `continue_final_message` and `add_generation_prompt` to True."
    );
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .method("POST")
        .uri("/detokenize")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"tokens\": [1, 2"))
        .unwrap();
    let (status, body) = ctx.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let ctx = TestContext::new();

    let (status, body) = ctx
        .post("/tokenize", json!({"model": "nope", "prompt": "hello"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "NotFoundError");
    assert_eq!(body["param"], "model");
    assert_eq!(body["message"], "The model `nope` does not exist.");
}

#[tokio::test]
async fn test_detokenize_endpoints() {
    let ctx = TestContext::new();

    for uri in ["/detokenize", "/v1/detokenize"] {
        let (status, body) = ctx
            .post(uri, json!({"tokens": [ids::HELLO, ids::WORLD]}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"prompt": "hello world"}));
    }
}

#[tokio::test]
async fn test_tokenizer_info_endpoint() {
    let ctx = TestContext::new();

    let (status, body) = ctx.get("/tokenizer_info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenizer_class"], "PreTrainedTokenizerFast");
    assert!(body.get("chat_template").is_none());
    assert!(body.get("vocab_file").is_none());

    let (status, body) = ctx.get("/tokenizer_info?include_chat_template=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_template"], CHAT_TEMPLATE);
}

#[tokio::test]
async fn test_health_and_liveness() {
    let ctx = TestContext::new();

    let (status, body) = ctx.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let response = ctx
        .app
        .clone()
        .oneshot(Request::builder().uri("/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = ctx.get("/no-such-route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
