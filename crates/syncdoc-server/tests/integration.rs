//! End-to-end tests against a real listener, driven by WebSocket and REST clients.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use syncdoc_server::config::ServerConfig;
use syncdoc_server::http::UNSUPPORTED_REQUEST;
use syncdoc_server::server::{SyncServer, NAME_IN_USE_REPLY};
use syncdoc_store::DocumentStore;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    base: String,
    ws: String,
    server: Arc<SyncServer>,
}

/// Boot a server on an ephemeral port with the usual seed documents.
async fn boot_server() -> TestServer {
    let store = Arc::new(DocumentStore::new());
    store.seed([
        ("default".to_owned(), json!({"messages": [], "users": []})),
        ("system".to_owned(), Value::Null),
    ]);
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let server =
        Arc::new(SyncServer::new(ServerConfig::default(), store).with_metrics(metrics_handle));
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        base: format!("http://{addr}"),
        ws: format!("ws://{addr}/ws"),
        server,
    }
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Connect as `name` and wait until the session is registered.
async fn join(server: &TestServer, name: &str) -> WsStream {
    let mut ws = connect(&format!("{}/{name}", server.ws)).await;
    send(&mut ws, client("notify", name, json!("ready"))).await;
    let ready = read_json(&mut ws).await;
    assert_eq!(ready["message"], "ready");
    ws
}

/// A client envelope as sent over the socket.
fn client(command: &str, path: &str, message: Value) -> Value {
    json!({"source": "client", "command": command, "path": path, "message": message})
}

async fn send(ws: &mut WsStream, envelope: Value) {
    ws.send(Message::text(envelope.to_string())).await.unwrap();
}

/// Round-trip a notify to self so everything sent before it has been dispatched.
async fn barrier(ws: &mut WsStream, name: &str) {
    send(ws, client("notify", name, json!("barrier"))).await;
    loop {
        let msg = read_json(ws).await;
        if msg["message"] == "barrier" {
            return;
        }
    }
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn post(
    server: &TestServer,
    path: &str,
    content_type: &str,
    body: &Value,
) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}{path}", server.base))
        .header("content-type", content_type)
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn duplicate_name_is_rejected_with_text_then_closed() {
    let server = boot_server().await;
    let _alice = join(&server, "alice").await;

    let mut second = connect(&format!("{}/alice", server.ws)).await;
    let frame = timeout(TIMEOUT, second.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(frame, Message::text(NAME_IN_USE_REPLY));

    let after = timeout(TIMEOUT, second.next()).await.unwrap();
    assert!(matches!(after, None | Some(Ok(Message::Close(_)) | Err(_))));
    assert!(server.server.hub().registry().contains("alice"));
}

#[tokio::test]
async fn name_is_reusable_after_disconnect() {
    let server = boot_server().await;
    let mut first = join(&server, "reuse").await;
    first.close(None).await.unwrap();

    timeout(TIMEOUT, async {
        while server.server.hub().registry().contains("reuse") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let _second = join(&server, "reuse").await;
}

#[tokio::test]
async fn anonymous_sessions_get_generated_names() {
    let server = boot_server().await;
    let _ws = connect(&server.ws).await;
    timeout(TIMEOUT, async {
        while server.server.hub().registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(server.server.hub().registry().len(), 1);
}

#[tokio::test]
async fn empty_name_after_slash_is_generated() {
    let server = boot_server().await;
    let mut watcher = join(&server, "watcher").await;
    let mut anon = connect(&format!("{}/", server.ws)).await;
    send(&mut anon, client("notify", "watcher", json!("hi"))).await;

    let msg = read_json(&mut watcher).await;
    assert_eq!(msg["message"], "hi");
    let sender = msg["source"].as_str().unwrap();
    assert_eq!(sender.len(), 36);
    assert_eq!(sender.matches('-').count(), 4);
    assert!(server.server.hub().registry().contains(sender));
}

#[tokio::test]
async fn outbound_counts_start_at_zero_and_increase() {
    let server = boot_server().await;
    let mut ws = connect(&format!("{}/counter", server.ws)).await;
    for i in 0..3 {
        send(&mut ws, client("notify", "counter", json!(i))).await;
        let msg = read_json(&mut ws).await;
        assert_eq!(msg["count"], i);
        assert_eq!(msg["message"], i);
        assert_eq!(msg["source"], "counter");
    }
}

#[tokio::test]
async fn notify_between_sessions_stamps_sender() {
    let server = boot_server().await;
    let mut alice = join(&server, "alice").await;
    let mut bob = join(&server, "bob").await;

    send(&mut alice, client("notify", "bob", json!({"hi": true}))).await;
    let msg = read_json(&mut bob).await;
    assert_eq!(msg["source"], "alice");
    assert_eq!(msg["command"], "notify");
    assert_eq!(msg["path"], "bob");
    assert_eq!(msg["message"], json!({"hi": true}));

    let resp = post(
        &server,
        "/notify/bob",
        "application/json",
        &json!({"source": "client", "message": "from rest"}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let msg = read_json(&mut bob).await;
    assert_eq!(msg["source"], "http-request");
    assert_eq!(msg["message"], "from rest");
}

#[tokio::test]
async fn publish_reaches_subscribers() {
    let server = boot_server().await;
    let mut watcher = join(&server, "watcher").await;
    send(&mut watcher, client("subscribe", "default", Value::Null)).await;
    barrier(&mut watcher, "watcher").await;

    let mut writer = join(&server, "writer").await;
    let users = json!({"messages": [], "users": ["ann"]});
    send(&mut writer, client("publish", "default", users.clone())).await;

    let msg = read_json(&mut watcher).await;
    assert_eq!(msg["command"], "publish");
    assert_eq!(msg["path"], "default");
    assert_eq!(msg["message"], users);
    assert_eq!(server.server.hub().store().get("default"), Some(users));
}

#[tokio::test]
async fn merge_over_rest_pushes_current_state() {
    let server = boot_server().await;
    let mut watcher = join(&server, "watcher").await;
    send(&mut watcher, client("subscribe", "default", Value::Null)).await;
    barrier(&mut watcher, "watcher").await;

    let resp = post(
        &server,
        "/sharedobject/default",
        "application/json",
        &json!({"source": "client", "message": {"topic": "rust"}}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let msg = read_json(&mut watcher).await;
    assert_eq!(msg["source"], "server");
    assert!(msg.get("command").is_none());
    assert_eq!(msg["path"], "default");
    assert_eq!(msg["message"], json!({"messages": [], "users": [], "topic": "rust"}));
}

#[tokio::test]
async fn json_patch_over_rest_is_atomic() {
    let server = boot_server().await;
    let body = json!({"source": "client", "message": [
        {"op": "add", "path": "/users/-", "value": "ann"},
        {"op": "test", "path": "/users/0", "value": "bob"}
    ]});
    let resp = post(&server, "/sharedobject/default", "application/json-patch+json", &body).await;
    assert_eq!(resp.status(), 400);

    let resp = reqwest::Client::new()
        .patch(format!("{}/sharedobject/default", server.base))
        .header("content-type", "application/json-patch+json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["outcome"], "failed");
    assert_eq!(
        server.server.hub().store().get("default"),
        Some(json!({"messages": [], "users": []}))
    );
}

#[tokio::test]
async fn system_document_reaches_every_session() {
    let server = boot_server().await;
    let mut a = join(&server, "a").await;
    let mut b = join(&server, "b").await;

    let resp = post(
        &server,
        "/sharedobject/system",
        "application/json",
        &json!({"source": "client", "message": {"motd": "hello"}}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    for ws in [&mut a, &mut b] {
        let msg = read_json(ws).await;
        assert_eq!(msg["path"], "system");
        assert_eq!(msg["message"], json!({"motd": "hello"}));
    }
}

#[tokio::test]
async fn delete_sends_terminal_and_forgets_subscription() {
    let server = boot_server().await;
    let mut ws = join(&server, "owner").await;
    send(&mut ws, client("publish", "scratch", json!(1))).await;
    send(&mut ws, client("subscribe", "scratch", Value::Null)).await;
    send(&mut ws, client("delete", "scratch", Value::Null)).await;

    let msg = read_json(&mut ws).await;
    assert_eq!(msg["source"], "server");
    assert_eq!(msg["command"], "delete");
    assert_eq!(msg["path"], "scratch");
    assert!(msg["message"].is_null());
    assert!(server.server.hub().store().get("scratch").is_none());

    send(&mut ws, client("publish", "scratch", json!(2))).await;
    barrier(&mut ws, "owner").await;
    assert_eq!(server.server.hub().store().get("scratch"), Some(json!(2)));
}

#[tokio::test]
async fn non_client_sources_and_garbage_are_ignored() {
    let server = boot_server().await;
    let mut ws = join(&server, "noisy").await;
    ws.send(Message::text("this is not json")).await.unwrap();
    let foreign = json!({"source": "server", "command": "publish", "path": "x", "message": 1});
    send(&mut ws, foreign).await;
    send(&mut ws, client("explode", "x", Value::Null)).await;
    send(&mut ws, json!({"source": "client", "command": "publish", "message": 1})).await;
    barrier(&mut ws, "noisy").await;
    assert!(server.server.hub().store().get("x").is_none());
    assert!(server.server.hub().registry().contains("noisy"));
}

#[tokio::test]
async fn rest_rejects_unsupported_requests() {
    let server = boot_server().await;
    let resp = post(&server, "/publish/doc", "text/plain", &json!({})).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), UNSUPPORTED_REQUEST);

    let resp = reqwest::Client::new()
        .post(format!("{}/publish/doc", server.base))
        .header("content-type", "application/json")
        .body("{broken")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = post(
        &server,
        "/publish/doc",
        "application/json; charset=utf-8",
        &json!({"source": "client", "message": {"ok": true}}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(server.server.hub().store().get("doc"), Some(json!({"ok": true})));
}

#[tokio::test]
async fn health_reports_sessions_and_documents() {
    let server = boot_server().await;
    let _ws = join(&server, "probe").await;
    let health: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 1);
    assert_eq!(health["documents"], 2);
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let server = boot_server().await;
    let mut ws = join(&server, "leaving").await;
    server.server.shutdown().shutdown();

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
    assert!(!server.server.hub().registry().contains("leaving"));
}
