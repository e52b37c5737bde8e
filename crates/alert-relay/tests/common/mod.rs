//! Mock chat platform shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json, Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// How the mock answers.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    /// Sleep before answering, to trip client timeouts
    Hang(Duration),
}

/// Shared state for one mock platform.
pub struct MockPlatform {
    pub requests: RwLock<Vec<Recorded>>,
    reply: RwLock<Reply>,
}

impl MockPlatform {
    pub async fn requests(&self) -> Vec<Recorded> {
        self.requests.read().await.clone()
    }

    pub async fn set_reply(&self, reply: Reply) {
        *self.reply.write().await = reply;
    }
}

async fn record(
    State(state): State<Arc<MockPlatform>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.requests.write().await.push(Recorded {
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
        body,
    });

    let reply = state.reply.read().await.clone();
    match reply {
        Reply::Json(status, body) => (
            StatusCode::from_u16(status).unwrap(),
            [("retry-after", "7")],
            Json(body),
        ),
        Reply::Hang(delay) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, [("retry-after", "0")], Json(Value::Null))
        }
    }
}

/// Start a mock platform answering every POST with `reply`.
pub async fn start_mock(reply: Reply) -> (SocketAddr, Arc<MockPlatform>) {
    let state = Arc::new(MockPlatform {
        requests: RwLock::new(Vec::new()),
        reply: RwLock::new(reply),
    });

    let app = Router::new().fallback(record).with_state(state.clone());

    // Bind to random port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub fn discord_ok() -> Reply {
    Reply::Json(200, serde_json::json!({"id": "111", "channel_id": "123"}))
}

pub fn slack_ok() -> Reply {
    Reply::Json(200, serde_json::json!({"ok": true, "ts": "1714557600.000100"}))
}

pub fn telegram_ok() -> Reply {
    Reply::Json(
        200,
        serde_json::json!({"ok": true, "result": {"message_id": 42}}),
    )
}

/// Routing config pointing every platform at a mock.
pub fn config_yaml(discord: SocketAddr, slack: SocketAddr, telegram: SocketAddr) -> String {
    format!(
        r"
discord:
  bot_token: discord-token
  api_url: http://{discord}
  environments:
    prod:
      critical:
        channel_id: 123
        author:
          name: Prometheus
          icon_url: https://example.com/prometheus.png
slack:
  token: xoxb-slack
  api_url: http://{slack}
  environments:
    prod:
      warning:
        channel_id: C0WARN
telegram:
  bot_token: tg-token
  api_url: http://{telegram}
  environments:
    prod:
      critical:
        chat_id: -1001
valid_environments: [prod, test]
default_environment: prod
environment_mapping:
  us-east-1: prod
  us-west-2: test
"
    )
}

/// One-alert webhook body.
pub fn webhook(severity: &str, region: &str, status: &str) -> Value {
    serde_json::json!({
        "version": "4",
        "groupKey": "{}:{alertname=\"InstanceDown\"}",
        "status": status,
        "receiver": "relay",
        "groupLabels": {"alertname": "InstanceDown"},
        "commonLabels": {"alertname": "InstanceDown", "severity": severity, "region": region},
        "commonAnnotations": {},
        "externalURL": "http://alertmanager:9093",
        "alerts": [{
            "status": status,
            "labels": {
                "alertname": "InstanceDown",
                "severity": severity,
                "region": region,
                "instance": "web-1:9100"
            },
            "annotations": {
                "summary": "web-1 is down",
                "description": "web-1 has been unreachable for 5 minutes"
            },
            "startsAt": "2024-05-01T10:00:00Z",
            "endsAt": if status == "resolved" { "2024-05-01T10:30:00Z" } else { "0001-01-01T00:00:00Z" },
            "generatorURL": "http://prometheus:9090/graph",
            "fingerprint": "abc123"
        }]
    })
}
