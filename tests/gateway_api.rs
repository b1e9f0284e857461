//! Integration tests for the HTTP gateway endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use modelgate::config::Config;
use modelgate::continuity::ContinuityStore;
use modelgate::gateway::{start_gateway, AppState, Gateway};
use modelgate::inject::MessageInjector;
use modelgate::relay::Relay;
use modelgate::router::CatalogRouter;
use modelgate::transcript::TranscriptStore;

/// Find a free port by binding to :0 and reading the assigned address.
async fn free_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

struct Harness {
    gw: Gateway,
    continuity: Arc<ContinuityStore>,
    _tmp: tempfile::TempDir,
    client: reqwest::Client,
}

impl Harness {
    async fn start(upstream: Option<&MockServer>) -> Self {
        let endpoint = upstream
            .map(|s| format!("{}/v1/chat/completions", s.uri()))
            .unwrap_or_else(|| "http://127.0.0.1:9/v1/chat/completions".into());
        let yaml = format!(
            r#"
models:
  - id: mini
    provider: openai
    model: gpt-test
    endpoint: {endpoint}
    api_key: sk-test
  - id: flash
    provider: gemini
    model: gemini-2.5-flash
default_model: mini
aliases:
  fast: mini
max_retries: 1
"#
        );
        let cfg = Config::from_yaml(&yaml).unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let continuity = Arc::new(ContinuityStore::new());
        let relay = Arc::new(Relay::new(
            Arc::new(CatalogRouter::from_config(&cfg)),
            continuity.clone(),
            cfg.max_retries,
        ));
        let injector = Arc::new(MessageInjector::new(TranscriptStore::new(tmp.path())));
        let state = AppState::new(relay, continuity.clone(), injector);

        let gw = start_gateway(free_addr().await, state).await.unwrap();
        Self {
            gw,
            continuity,
            _tmp: tmp,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, p: &str) -> String {
        format!("http://{}{p}", self.gw.addr)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.gw.handle.abort();
    }
}

#[tokio::test]
async fn status_and_health() {
    let h = Harness::start(None).await;

    let body: Value = reqwest::get(h.url("/api/status")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let body: Value = reqwest::get(h.url("/api/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body["models"], 2);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn models_list_and_resolve() {
    let h = Harness::start(None).await;

    let body: Value = reqwest::get(h.url("/api/models")).await.unwrap().json().await.unwrap();
    assert_eq!(body["default_model"], "mini");
    assert_eq!(body["models"].as_array().unwrap().len(), 2);
    assert!(body["models"][0].get("api_key").is_none());

    let resp = reqwest::get(h.url("/api/models/fast")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let rec: Value = resp.json().await.unwrap();
    assert_eq!(rec["id"], "mini");

    let resp = reqwest::get(h.url("/api/models/nope")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn tool_conversion_endpoints() {
    let h = Harness::start(None).await;
    let tools = json!([
        {"type": "function", "function": {"name": "ls"}},
        {"type": "retrieval"}
    ]);

    let body: Value = h
        .client
        .post(h.url("/api/tools/gemini"))
        .json(&json!({ "tools": tools }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["tools"]["functionDeclarations"][0]["name"], "ls");
    assert_eq!(body["skipped"][0]["index"], 1);

    let body: Value = h
        .client
        .post(h.url("/api/tools/declarations"))
        .json(&json!({"functionDeclarations": [{"name": "a"}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["declarations"][0]["parameters"]["type"], "object");

    let body: Value = h
        .client
        .post(h.url("/api/calls/openai"))
        .json(&json!([{"functionCall": {"name": "ls", "args": {"dir": "/"}}}]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["tool_calls"][0]["type"], "function");
    assert_eq!(body["tool_calls"][0]["function"]["arguments"], r#"{"dir":"/"}"#);

    let resp = h
        .client
        .post(h.url("/api/tools/gemini"))
        .json(&json!({"nope": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn signature_lifecycle() {
    let h = Harness::start(None).await;
    let url = h.url("/api/signatures/s1");

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);

    let resp = h
        .client
        .put(&url)
        .json(&json!({"signature": "sig-A"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["signature"], "sig-A");

    h.client.delete(&url).send().await.unwrap();
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
}

#[tokio::test]
async fn fetch_instance_sessions() {
    let h = Harness::start(None).await;

    let first: Value = h
        .client
        .post(h.url("/api/fetch/inst-1/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = first["session_id"].as_str().unwrap().to_string();
    assert!(id.starts_with('-'));

    let again: Value = h
        .client
        .post(h.url("/api/fetch/inst-1/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["session_id"], id.as_str());

    let rebound: Value = h
        .client
        .post(h.url("/api/fetch/inst-1/session"))
        .json(&json!({"session_id": "ses_explicit"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rebound["session_id"], "ses_explicit");

    h.client.delete(h.url("/api/fetch/inst-1")).send().await.unwrap();
    assert_eq!(h.continuity.stats().session_ids, 0);
}

#[tokio::test]
async fn inject_and_read_back() {
    let h = Harness::start(None).await;

    let body: Value = h
        .client
        .post(h.url("/api/sessions/ses_1/inject"))
        .json(&json!({
            "text": "resume the task",
            "agent": "coder",
            "model": {"providerId": "anthropic", "modelId": "claude-x"}
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);

    let body: Value = h
        .client
        .post(h.url("/api/sessions/ses_1/inject"))
        .json(&json!({"text": "  "}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], false);

    let body: Value = reqwest::get(h.url("/api/sessions/ses_1/messages"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["info"]["agent"], "coder");
    assert_eq!(messages[0]["info"]["model"]["modelId"], "claude-x");
    assert_eq!(messages[0]["parts"][0]["synthetic"], true);
}

#[tokio::test]
async fn path_traversal_rejected() {
    let h = Harness::start(None).await;
    let resp = reqwest::get(h.url("/api/sessions/..%2Fetc/messages")).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn chat_completions_relays_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "pong"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let h = Harness::start(Some(&upstream)).await;
    let resp = h
        .client
        .post(h.url("/v1/chat/completions"))
        .header("x-session-key", "s-chat")
        .json(&json!({"model": "fast", "messages": [{"role": "user", "content": "ping"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "mini");
    assert_eq!(body["choices"][0]["message"]["content"], "pong");

    let resp = h
        .client
        .post(h.url("/v1/chat/completions"))
        .json(&json!({"model": "unknown", "messages": [{"role": "user", "content": "ping"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unreadable_parts_still_list_the_message() {
    let h = Harness::start(None).await;
    let body: Value = h
        .client
        .post(h.url("/api/sessions/ses_2/inject"))
        .json(&json!({"text": "hello"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);

    let body: Value = reqwest::get(h.url("/api/sessions/ses_2/messages"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["messages"][0]["info"]["id"].as_str().unwrap().to_string();
    let part_dir = h._tmp.path().join("part").join(&id);
    std::fs::remove_dir_all(&part_dir).unwrap();
    std::fs::write(&part_dir, "not a directory").unwrap();

    let resp = reqwest::get(h.url("/api/sessions/ses_2/messages")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["messages"][0]["info"]["id"], id.as_str());
    assert_eq!(body["messages"][0]["parts"], json!([]));
}

#[tokio::test]
async fn upstream_error_text_does_not_become_bad_request() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("unknown model: messages must not be empty"),
        )
        .mount(&upstream)
        .await;
    let h = Harness::start(Some(&upstream)).await;

    let resp = h
        .client
        .post(h.url("/v1/chat/completions"))
        .json(&json!({"model": "mini", "messages": [{"role": "user", "content": "ping"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let resp = h
        .client
        .post(h.url("/v1/chat/completions"))
        .json(&json!({"model": "mini", "messages": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
