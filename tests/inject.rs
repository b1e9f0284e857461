//! Integration tests for synthetic message injection against a real
//! on-disk transcript layout.

use std::path::Path;

use modelgate::inject::{InjectContext, MessageInjector, DEFAULT_AGENT};
use modelgate::transcript::{ModelRef, StoredMessage, TranscriptStore};

fn injector(root: &Path) -> MessageInjector {
    MessageInjector::new(TranscriptStore::new(root))
}

/// Write a prior message the way the chat client would.
fn seed_message(root: &Path, group: Option<&str>, session: &str, id: &str, body: serde_json::Value) {
    let mut dir = root.join("message");
    if let Some(g) = group {
        dir = dir.join(g);
    }
    let dir = dir.join(session);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{id}.json")), body.to_string()).unwrap();
}

#[tokio::test]
async fn borrows_agent_and_model_from_prior_message() {
    let tmp = tempfile::tempdir().unwrap();
    seed_message(
        tmp.path(),
        None,
        "s1",
        "msg_0001",
        serde_json::json!({
            "id": "msg_0001",
            "sessionID": "s1",
            "role": "assistant",
            "time": {"created": 1},
            "agent": "coder",
            "model": {"providerID": "anthropic", "modelID": "claude-x"}
        }),
    );

    let inj = injector(tmp.path());
    let out = inj
        .try_inject("s1", "continue please", &InjectContext::default())
        .await
        .unwrap();

    assert_eq!(out.message.agent.as_deref(), Some("coder"));
    assert_eq!(out.message.model, Some(ModelRef::new("anthropic", "claude-x")));
    assert_eq!(out.message.role, "user");
    assert!(out.part.synthetic);
    assert_eq!(out.part.text, "continue please");
    assert_eq!(out.part.message_id, out.message.id);
}

#[tokio::test]
async fn brand_new_session_gets_default_agent() {
    let tmp = tempfile::tempdir().unwrap();
    let inj = injector(tmp.path());

    assert!(inj.inject("fresh", "hello", &InjectContext::default()).await);

    let stored = inj.store().list_messages("fresh").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].agent.as_deref(), Some(DEFAULT_AGENT));
    assert!(stored[0].model.is_none());

    let parts = inj.store().list_parts(&stored[0].id).await.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].text, "hello");
}

#[tokio::test]
async fn blank_text_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let inj = injector(tmp.path());

    assert!(!inj.inject("s1", "   \n\t", &InjectContext::default()).await);
    assert!(!tmp.path().join("message").exists());
    assert!(!tmp.path().join("part").exists());
}

#[tokio::test]
async fn writes_into_nested_session_dir() {
    let tmp = tempfile::tempdir().unwrap();
    seed_message(
        tmp.path(),
        Some("project-a"),
        "s2",
        "msg_0001",
        serde_json::json!({
            "id": "msg_0001",
            "sessionId": "s2",
            "role": "user",
            "agent": "plan",
            "model": {"providerId": "openai", "modelId": "gpt-x"}
        }),
    );

    let inj = injector(tmp.path());
    let out = inj
        .try_inject("s2", "note", &InjectContext::default())
        .await
        .unwrap();

    let expected = tmp
        .path()
        .join("message/project-a/s2")
        .join(format!("{}.json", out.message.id));
    assert!(expected.exists(), "message should land beside its siblings");
    assert!(!tmp.path().join("message/s2").exists());
    assert_eq!(out.message.agent.as_deref(), Some("plan"));
}

#[tokio::test]
async fn fallback_skips_incomplete_and_corrupt_messages() {
    let tmp = tempfile::tempdir().unwrap();
    seed_message(
        tmp.path(),
        None,
        "s3",
        "msg_0001",
        serde_json::json!({
            "id": "msg_0001", "sessionId": "s3", "role": "assistant",
            "agent": "coder", "model": {"providerId": "anthropic", "modelId": "claude-x"}
        }),
    );
    // Newer, but without a model.
    seed_message(
        tmp.path(),
        None,
        "s3",
        "msg_0002",
        serde_json::json!({"id": "msg_0002", "sessionId": "s3", "role": "user", "agent": "other"}),
    );
    // Newest, not JSON at all.
    let dir = tmp.path().join("message/s3");
    std::fs::write(dir.join("msg_0003.json"), "{not json").unwrap();

    let inj = injector(tmp.path());
    let found: Option<StoredMessage> = inj.find_fallback(&dir).await.unwrap();
    assert_eq!(found.unwrap().id, "msg_0001");
}

#[tokio::test]
async fn caller_context_overrides_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    seed_message(
        tmp.path(),
        None,
        "s4",
        "msg_0001",
        serde_json::json!({
            "id": "msg_0001", "sessionId": "s4", "role": "assistant",
            "agent": "coder", "model": {"providerId": "anthropic", "modelId": "claude-x"}
        }),
    );

    let ctx = InjectContext {
        agent: Some("reviewer".into()),
        ..Default::default()
    };
    let out = injector(tmp.path())
        .try_inject("s4", "look again", &ctx)
        .await
        .unwrap();
    assert_eq!(out.message.agent.as_deref(), Some("reviewer"));
    assert_eq!(out.message.model, Some(ModelRef::new("anthropic", "claude-x")));
}

#[tokio::test]
async fn invalid_session_id_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let inj = injector(tmp.path());
    assert!(!inj.inject("../escape", "x", &InjectContext::default()).await);
    assert!(!tmp.path().join("escape").exists());
}

#[tokio::test]
async fn failed_message_write_reports_false() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("message"), "not a directory").unwrap();
    let inj = injector(tmp.path());

    assert!(!inj.inject("s1", "hello", &InjectContext::default()).await);
    assert!(!tmp.path().join("part").exists());
}

#[tokio::test]
async fn failed_part_write_leaves_message_behind() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("part"), "not a directory").unwrap();
    let inj = injector(tmp.path());

    assert!(!inj.inject("s1", "hello", &InjectContext::default()).await);

    let stored = inj.store().list_messages("s1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, "user");
    let parts = inj.store().list_parts(&stored[0].id).await.unwrap_or_default();
    assert!(parts.is_empty());
}
