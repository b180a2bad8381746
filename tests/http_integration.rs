//! Integration tests for the HTTP surface.
//!
//! Each test spins up the bot's Axum router and a fake Slack Web API on
//! random ports, then drives the bot with signed reqwest calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use community_bot::archive::{ArchivePipeline, MapResolver, TriggerRegistry};
use community_bot::channels::{SignatureVerifier, SlackDispatcher};
use community_bot::content::ContentService;
use community_bot::routes::{AppState, app_routes};
use community_bot::store::InMemoryRepository;

/// Maximum time to wait for background work to reach the fake Slack API.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

const SIGNING_SECRET: &str = "test-signing-secret";

type SlackCalls = Arc<Mutex<Vec<(String, Value)>>>;

/// Fake Slack Web API: records every call, reports `already_reacted`
/// for a repeated reaction.
async fn fake_slack_method(
    State(calls): State<SlackCalls>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut calls = calls.lock().unwrap();
    let repeated_reaction = method == "reactions.add"
        && calls
            .iter()
            .any(|(m, b)| m == "reactions.add" && b["timestamp"] == body["timestamp"]);
    calls.push((method, body));

    if repeated_reaction {
        Json(json!({"ok": false, "error": "already_reacted"}))
    } else {
        Json(json!({"ok": true}))
    }
}

async fn spawn(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

struct TestBot {
    base: String,
    slack_calls: SlackCalls,
    client: reqwest::Client,
    signer: SignatureVerifier,
}

impl TestBot {
    /// POST `body` signed as Slack would sign it right now.
    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let raw = serde_json::to_vec(&body).unwrap();
        let signature = self.signer.sign(&timestamp, &raw).unwrap();
        self.post_raw(path, raw, &[
            ("X-Slack-Request-Timestamp", timestamp.as_str()),
            ("X-Slack-Signature", signature.as_str()),
        ])
        .await
    }

    async fn post_raw(
        &self,
        path: &str,
        raw: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base))
            .header("content-type", "application/json")
            .body(raw);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.send().await.unwrap()
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.slack_calls.lock().unwrap().clone()
    }

    /// Poll until the fake Slack API has seen at least `n` calls.
    async fn wait_for_calls(&self, n: usize) -> Vec<(String, Value)> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            let calls = self.calls();
            if calls.len() >= n {
                return calls;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} Slack calls, saw {calls:?}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn start_bot() -> TestBot {
    let slack_calls: SlackCalls = Arc::default();
    let slack_app = Router::new()
        .route("/{method}", post(fake_slack_method))
        .with_state(Arc::clone(&slack_calls));
    let slack_port = spawn(slack_app).await;

    let repo = InMemoryRepository::new();
    let dispatcher = Arc::new(SlackDispatcher::new(
        SecretString::from("xoxb-test".to_string()),
        format!("http://127.0.0.1:{slack_port}"),
    ));
    let mut resolver = MapResolver::default();
    resolver.insert("U2", "Bob");

    let registry = Arc::new(TriggerRegistry::new(repo.clone()));
    let state = AppState {
        content: Arc::new(ContentService::new(repo.clone(), dispatcher.clone())),
        registry: Arc::clone(&registry),
        pipeline: Arc::new(ArchivePipeline::new(
            repo,
            registry,
            Arc::new(resolver),
            dispatcher,
        )),
        verifier: Arc::new(SignatureVerifier::new(SecretString::from(SIGNING_SECRET))),
    };
    let port = spawn(app_routes(state)).await;

    TestBot {
        base: format!("http://127.0.0.1:{port}"),
        slack_calls,
        client: reqwest::Client::new(),
        signer: SignatureVerifier::new(SecretString::from(SIGNING_SECRET)),
    }
}

fn message_event(ts: &str, text: &str) -> Value {
    json!({
        "type": "event_callback",
        "team_id": "T1",
        "event": {
            "type": "message",
            "channel": "C1",
            "user": "U2",
            "text": text,
            "ts": ts
        }
    })
}

#[tokio::test]
async fn health_check() {
    let bot = start_bot().await;
    let resp = bot
        .client
        .get(format!("{}/health", bot.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn requests_with_bad_signatures_are_unauthorized() {
    let bot = start_bot().await;
    let body = message_event("100.1", "$retro hi");
    let raw = serde_json::to_vec(&body).unwrap();
    let now = chrono::Utc::now().timestamp().to_string();

    let forged = SignatureVerifier::new(SecretString::from("wrong-secret"))
        .sign(&now, &raw)
        .unwrap();
    let resp = bot
        .post_raw("/slack/events", raw.clone(), &[
            ("X-Slack-Request-Timestamp", now.as_str()),
            ("X-Slack-Signature", forged.as_str()),
        ])
        .await;
    assert_eq!(resp.status(), 401);

    let stale = (chrono::Utc::now().timestamp() - 600).to_string();
    let stale_sig = bot.signer.sign(&stale, &raw).unwrap();
    let resp = bot
        .post_raw("/slack/events", raw.clone(), &[
            ("X-Slack-Request-Timestamp", stale.as_str()),
            ("X-Slack-Signature", stale_sig.as_str()),
        ])
        .await;
    assert_eq!(resp.status(), 401);

    let resp = bot.post_raw("/slack/events", raw, &[]).await;
    assert_eq!(resp.status(), 401);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(bot.calls().is_empty());
}

#[tokio::test]
async fn api_routes_require_a_signature() {
    let bot = start_bot().await;
    let raw = serde_json::to_vec(
        &json!({"user_id": "U1", "channel_id": "C1", "trigger_word": "$retro"}),
    )
    .unwrap();
    let resp = bot.post_raw("/api/triggers", raw, &[]).await;
    assert_eq!(resp.status(), 401);

    // The rejected request left nothing behind, so the word is still free.
    let created = bot
        .post(
            "/api/triggers",
            json!({"user_id": "U1", "channel_id": "C1", "trigger_word": "$retro"}),
        )
        .await;
    assert_eq!(created.status(), 201);
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let bot = start_bot().await;
    let resp = bot
        .post(
            "/slack/events",
            json!({"type": "url_verification", "token": "t", "challenge": "3eZbrw1a"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["challenge"], "3eZbrw1a");
}

#[tokio::test]
async fn trigger_registration_reports_field_errors() {
    let bot = start_bot().await;

    let created = bot
        .post(
            "/api/triggers",
            json!({"user_id": "U1", "channel_id": "C1", "trigger_word": "$retro"}),
        )
        .await;
    assert_eq!(created.status(), 201);
    let trigger: Value = created.json().await.unwrap();
    assert_eq!(trigger["trigger_word"], "$retro");

    let collision = bot
        .post(
            "/api/triggers",
            json!({"user_id": "U1", "channel_id": "C1", "trigger_word": "$retrospective"}),
        )
        .await;
    assert_eq!(collision.status(), 422);
    let body: Value = collision.json().await.unwrap();
    let message = body["errors"]["trigger_word"].as_str().unwrap();
    assert!(message.contains("$retro"));

    let no_sigil = bot
        .post(
            "/api/triggers",
            json!({"user_id": "U1", "channel_id": "C1", "trigger_word": "hello"}),
        )
        .await;
    assert_eq!(no_sigil.status(), 422);
}

#[tokio::test]
async fn message_event_is_archived_via_slack_api() {
    let bot = start_bot().await;
    bot.post(
        "/api/triggers",
        json!({"user_id": "U1", "channel_id": "C1", "trigger_word": "$retro"}),
    )
    .await;

    let resp = bot
        .post(
            "/slack/events",
            message_event("100.1", "$retro today was good <@U2>"),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let calls = bot.wait_for_calls(2).await;
    assert_eq!(calls[0].0, "reactions.add");
    assert_eq!(calls[0].1["channel"], "C1");
    assert_eq!(calls[0].1["timestamp"], "100.1");
    assert_eq!(calls[0].1["name"], "round_pushpin");

    assert_eq!(calls[1].0, "chat.postMessage");
    assert_eq!(calls[1].1["thread_ts"], "100.1");
    assert_eq!(calls[1].1["text"], "Saved <@U2>'s `$retro` message #1. 😉");

    // An edit re-reacts (Slack reports already_reacted) and posts the update.
    bot.post(
        "/slack/events",
        json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "subtype": "message_changed",
                "channel": "C1",
                "ts": "100.9",
                "message": {
                    "type": "message",
                    "user": "U2",
                    "text": "$retro today was great <@U2>",
                    "ts": "100.1"
                }
            }
        }),
    )
    .await;

    let calls = bot.wait_for_calls(4).await;
    assert_eq!(calls[2].0, "reactions.add");
    assert_eq!(calls[3].0, "chat.postMessage");
    assert_eq!(calls[3].1["text"], "Updated <@U2>'s `$retro` message. 😉");
}

#[tokio::test]
async fn unmatched_message_makes_no_slack_calls() {
    let bot = start_bot().await;
    let resp = bot
        .post("/slack/events", message_event("100.1", "no keyword here"))
        .await;
    assert_eq!(resp.status(), 200);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(bot.calls().is_empty());
}

#[tokio::test]
async fn pass_and_submission_flow() {
    let bot = start_bot().await;

    let registered = bot
        .post(
            "/api/users",
            json!({"user_id": "U1", "name": "alice", "channel_id": "C1"}),
        )
        .await;
    assert_eq!(registered.status(), 200);
    let user: Value = registered.json().await.unwrap();
    assert_eq!(user["pass_count"], 2);

    let pass = json!({"user_id": "U1", "channel_id": "C1", "username": "alice"});
    assert_eq!(bot.post("/api/passes", pass.clone()).await.status(), 201);

    let again = bot.post("/api/passes", pass).await;
    assert_eq!(again.status(), 422);
    let body: Value = again.json().await.unwrap();
    assert!(body["errors"]["pass"].is_string());

    let bad_url = bot
        .post(
            "/api/submissions",
            json!({
                "user_id": "U1", "channel_id": "C1", "username": "alice",
                "url": "nope", "category": "Project"
            }),
        )
        .await;
    assert_eq!(bad_url.status(), 422);
    let body: Value = bad_url.json().await.unwrap();
    assert!(body["errors"]["url"].is_string());

    let bad_category = bot
        .post(
            "/api/submissions",
            json!({
                "user_id": "U1", "channel_id": "C1", "username": "alice",
                "url": "https://blog.dev/p", "category": "Cooking"
            }),
        )
        .await;
    assert_eq!(bad_category.status(), 422);
    let body: Value = bad_category.json().await.unwrap();
    assert!(body["errors"]["category"].is_string());

    let wrong_channel = bot
        .post(
            "/api/submissions",
            json!({
                "user_id": "U1", "channel_id": "C2", "username": "alice",
                "url": "https://blog.dev/p", "category": "Project"
            }),
        )
        .await;
    assert_eq!(wrong_channel.status(), 422);

    let submitted = bot
        .post(
            "/api/submissions",
            json!({
                "user_id": "U1", "channel_id": "C1", "username": "alice",
                "url": "https://blog.dev/p", "category": "job search & career",
                "description": "interview notes", "tags": "career, career ,hiring"
            }),
        )
        .await;
    assert_eq!(submitted.status(), 201);
    let content: Value = submitted.json().await.unwrap();
    assert_eq!(content["type"], "submit");
    assert_eq!(content["category"], "Job Search & Career");
    assert_eq!(content["tags"], "career,hiring");

    // One announcement per recorded pass or submission.
    let announcements: Vec<_> = bot
        .calls()
        .into_iter()
        .filter(|(m, _)| m == "chat.postMessage")
        .collect();
    assert_eq!(announcements.len(), 2);
    assert_eq!(announcements[0].1["channel"], "C1");
    assert!(
        announcements[1].1["text"]
            .as_str()
            .unwrap()
            .contains("tag : `career` `hiring`")
    );
}
