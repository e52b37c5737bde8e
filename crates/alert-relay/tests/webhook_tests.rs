//! End-to-end webhook tests: relay server in front of mock platforms.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alert_relay::{server, Config, NotificationPipeline};
use common::{start_mock, MockPlatform, Reply};
use serde_json::Value;
use tokio::net::TcpListener;

struct Harness {
    relay: SocketAddr,
    discord: Arc<MockPlatform>,
    slack: Arc<MockPlatform>,
    telegram: Arc<MockPlatform>,
}

async fn start_relay(discord_reply: Reply, timeout: Duration) -> Harness {
    let (discord_addr, discord) = start_mock(discord_reply).await;
    let (slack_addr, slack) = start_mock(common::slack_ok()).await;
    let (telegram_addr, telegram) = start_mock(common::telegram_ok()).await;

    let config = Config::from_yaml_str(&common::config_yaml(discord_addr, slack_addr, telegram_addr)).unwrap();
    let pipeline = NotificationPipeline::new(Arc::new(config), timeout).unwrap();
    let app = server::build_router(Arc::new(pipeline));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness {
        relay,
        discord,
        slack,
        telegram,
    }
}

async fn post(relay: SocketAddr, path: &str, body: &Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{relay}{path}"))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_critical_alert_reaches_discord_channel() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    let (status, body) = post(h.relay, "/alertmanager", &common::webhook("critical", "us-east-1", "firing")).await;
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({"status": "ok"}));

    let requests = h.discord.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/channels/123/messages");

    let embed = &requests[0].body["embeds"][0];
    assert_eq!(embed["title"], "[FIRING] InstanceDown");
    assert_eq!(embed["color"], 0x00E0_1E5A);
    assert_eq!(embed["author"]["name"], "Prometheus");
    assert_eq!(embed["timestamp"], "2024-05-01T10:00:00+00:00");

    // telegram routes critical too, slack only warning
    assert_eq!(h.telegram.requests().await.len(), 1);
    assert!(h.slack.requests().await.is_empty());
}

#[tokio::test]
async fn test_unmapped_region_uses_default_environment() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    let (status, _) = post(h.relay, "/alertmanager", &common::webhook("critical", "eu-west-1", "firing")).await;
    assert_eq!(status, 200);

    let requests = h.discord.requests().await;
    assert_eq!(requests.len(), 1);
    let description = requests[0].body["embeds"][0]["description"].as_str().unwrap();
    assert!(description.contains("**Environment**: prod"));
}

#[tokio::test]
async fn test_mapped_environment_without_routes_sends_nothing() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    // us-west-2 maps to test, which has no channels configured
    let (status, body) = post(h.relay, "/alertmanager", &common::webhook("critical", "us-west-2", "firing")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(h.discord.requests().await.is_empty());
    assert!(h.telegram.requests().await.is_empty());
}

#[tokio::test]
async fn test_unrouted_severity_is_still_ok() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    let (status, body) = post(h.relay, "/alertmanager", &common::webhook("info", "us-east-1", "firing")).await;
    assert_eq!(status, 200);
    assert_eq!(body, serde_json::json!({"status": "ok"}));

    assert!(h.discord.requests().await.is_empty());
    assert!(h.slack.requests().await.is_empty());
    assert!(h.telegram.requests().await.is_empty());
}

#[tokio::test]
async fn test_platform_timeout_does_not_block_others() {
    let h = start_relay(Reply::Hang(Duration::from_secs(5)), Duration::from_millis(300)).await;

    let (status, body) = post(h.relay, "/alertmanager", &common::webhook("critical", "us-east-1", "firing")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    assert_eq!(h.discord.requests().await.len(), 1);
    let telegram = h.telegram.requests().await;
    assert_eq!(telegram.len(), 1);
    assert_eq!(telegram[0].body["chat_id"], "-1001");
}

#[tokio::test]
async fn test_path_severity_applies_to_unlabelled_alerts() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    let mut payload = common::webhook("warning", "us-east-1", "firing");
    payload["alerts"][0]["labels"]
        .as_object_mut()
        .unwrap()
        .remove("severity");

    let (status, _) = post(h.relay, "/alertmanager/warning", &payload).await;
    assert_eq!(status, 200);

    let slack = h.slack.requests().await;
    assert_eq!(slack.len(), 1);
    assert_eq!(slack[0].body["channel"], "C0WARN");
    assert!(h.discord.requests().await.is_empty());

    // bare severity path
    let (status, _) = post(h.relay, "/warning", &payload).await;
    assert_eq!(status, 200);
    assert_eq!(h.slack.requests().await.len(), 2);
}

#[tokio::test]
async fn test_resolved_alert_is_green_with_duration() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    let (status, _) = post(h.relay, "/alertmanager", &common::webhook("critical", "us-east-1", "resolved")).await;
    assert_eq!(status, 200);

    let requests = h.discord.requests().await;
    let embed = &requests[0].body["embeds"][0];
    assert_eq!(embed["title"], "[RESOLVED] InstanceDown");
    assert_eq!(embed["color"], 0x002E_B67D);
    let value = embed["fields"][0]["value"].as_str().unwrap();
    assert!(value.contains("**Duration**: 30m"));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/alertmanager", h.relay))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["msg"].as_str().unwrap().contains("malformed"));

    let (status, _) = post(h.relay, "/alertmanager", &serde_json::json!({"alerts": "nope"})).await;
    assert_eq!(status, 400);
    assert!(h.discord.requests().await.is_empty());
}

#[tokio::test]
async fn test_ping_and_unknown_route() {
    let h = start_relay(common::discord_ok(), Duration::from_secs(5)).await;
    let client = reqwest::Client::new();

    let response = client.get(format!("http://{}/", h.relay)).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let response = client
        .get(format!("http://{}/nothing/here", h.relay))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
}
