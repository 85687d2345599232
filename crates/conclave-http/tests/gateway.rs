//! End-to-end tests through the full router: pipeline, handlers, store and
//! keyring coordinator wired the way the agent wires them.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use conclave_acl::{AccessGuard, AccessLevel, AclConfig, DefaultPolicy, Rules};
use conclave_http::{Gateway, GatewayConfig};
use conclave_keyring::{
    federation_member_name, KeyringResults, KeyringScope, MemoryCluster, RotationCoordinator,
};
use conclave_store::{MemoryStore, QueryOptions, StateStore};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

const PRIMARY: &str = "T9jncgl9mbLus+baTTa7q7nPSUrXwbDi2dhbtqir37s=";
const SECONDARY: &str = "HT9Jb8mQ3YzXs2mK7xZ0Gg==";

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    cluster: Arc<MemoryCluster>,
}

fn deny_by_default() -> AclConfig {
    let mut tokens = HashMap::new();
    tokens.insert(
        "keyring-reader".to_string(),
        Rules {
            keyring: Some(AccessLevel::Read),
            ..Rules::default()
        },
    );
    AclConfig {
        enabled: true,
        default_policy: DefaultPolicy::Deny,
        master_token: Some("root".to_string()),
        default_token: None,
        tokens,
    }
}

fn base_config() -> GatewayConfig {
    GatewayConfig {
        node_name: "node1".to_string(),
        datacenter: "dc1".to_string(),
        server: true,
        ..GatewayConfig::default()
    }
}

fn harness(config: GatewayConfig, acl: AclConfig) -> Harness {
    let guard = AccessGuard::from_config(acl);
    let store = Arc::new(MemoryStore::new(
        guard.clone(),
        config.datacenter.clone(),
        Some(config.node_name.clone()),
    ));

    let cluster = Arc::new(MemoryCluster::new(
        config.node_name.clone(),
        &config.datacenter,
        PRIMARY,
    ));
    cluster.add_member(KeyringScope::Local, "node2", PRIMARY);
    cluster.add_member(
        KeyringScope::Federation,
        &federation_member_name(&config.node_name, &config.datacenter),
        PRIMARY,
    );
    let coordinator = Arc::new(RotationCoordinator::new(
        guard.clone(),
        cluster.clone(),
        config.server,
    ));

    let app = Gateway::new(config, guard, store.clone(), coordinator).into_router();
    Harness {
        app,
        store,
        cluster,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> Response {
    let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
    app.clone()
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap()
}

async fn body_string(resp: Response) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

async fn put_keys(store: &MemoryStore, count: usize) {
    let opts = QueryOptions {
        datacenter: "dc1".to_string(),
        ..QueryOptions::default()
    };
    for i in 0..count {
        store
            .kv_put(&format!("k{i}"), b"v".to_vec(), 0, &opts)
            .await
            .unwrap();
    }
}

fn key_body(key: &str) -> String {
    format!(r#"{{"Key":"{key}"}}"#)
}

// ── Routing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn index_and_unknown_paths() {
    let h = harness(base_config(), AclConfig::default());

    let resp = send(&h.app, Method::GET, "/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "Conclave Agent");

    let resp = send(&h.app, Method::GET, "/v1/nope", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(!body_string(resp).await.is_empty());
}

#[tokio::test]
async fn unsupported_method_is_405() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::PATCH, "/v1/operator/keyring", None).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ── Query options ───────────────────────────────────────────────────

#[tokio::test]
async fn conflicting_consistency_is_rejected_before_the_handler() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(
        &h.app,
        Method::PUT,
        "/v1/kv/should-not-exist?stale&consistent",
        Some("x"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_string(resp).await,
        "Cannot specify ?stale with ?consistent, conflicting semantics."
    );
    assert_eq!(h.store.index(), 0);
}

#[tokio::test]
async fn bad_wait_and_index_are_400() {
    let h = harness(base_config(), AclConfig::default());

    let resp = send(&h.app, Method::GET, "/v1/kv/a?wait=soon", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "Invalid wait time");

    let resp = send(&h.app, Method::GET, "/v1/kv/a?index=-1", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "Invalid index");
}

#[tokio::test]
async fn foreign_datacenter_is_a_server_error() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/kv/a?dc=dc9", None).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(resp).await, "No path to datacenter");
}

// ── Blocking queries ────────────────────────────────────────────────

#[tokio::test]
async fn blocking_read_past_index_returns_immediately() {
    let h = harness(base_config(), AclConfig::default());
    put_keys(&h.store, 7).await;

    let resp = tokio::time::timeout(
        Duration::from_millis(500),
        send(&h.app, Method::GET, "/v1/kv/k0?wait=1s&index=5", None),
    )
    .await
    .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-consul-index"], "7");
    assert_eq!(resp.headers()["x-consul-knownleader"], "true");
    assert_eq!(resp.headers()["x-consul-lastcontact"], "0");
}

#[tokio::test(start_paused = true)]
async fn blocking_read_at_index_waits_out_the_timeout() {
    let h = harness(base_config(), AclConfig::default());
    put_keys(&h.store, 5).await;

    let started = tokio::time::Instant::now();
    let resp = send(&h.app, Method::GET, "/v1/kv/k0?wait=1s&index=5", None).await;
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-consul-index"], "5");
}

// ── KV ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn kv_put_get_delete() {
    let h = harness(base_config(), AclConfig::default());

    let resp = send(&h.app, Method::PUT, "/v1/kv/web/config?flags=3", Some("hello")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "true");

    let resp = send(&h.app, Method::GET, "/v1/kv/web/config", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let entries: Vec<serde_json::Value> = body_json(resp).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["Key"], "web/config");
    assert_eq!(entries[0]["Flags"], 3);
    assert_eq!(entries[0]["Value"], "aGVsbG8=");

    let resp = send(&h.app, Method::DELETE, "/v1/kv/web/config", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&h.app, Method::GET, "/v1/kv/web/config", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.headers().contains_key("x-consul-index"));
}

#[tokio::test]
async fn kv_put_without_key_is_400() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::PUT, "/v1/kv/", Some("x")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "Missing key name");
}

#[tokio::test]
async fn kv_put_with_bad_flags_is_400() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::PUT, "/v1/kv/a?flags=x", Some("v")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(resp).await, "Invalid flags");
    assert_eq!(h.store.index(), 0);
}

#[tokio::test]
async fn kv_denied_token_is_403() {
    let h = harness(base_config(), deny_by_default());
    let resp = send(&h.app, Method::PUT, "/v1/kv/a", Some("x")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(body_string(resp).await.contains("Permission denied"));

    let resp = send(&h.app, Method::PUT, "/v1/kv/a?token=root", Some("x")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// ── Status / catalog / agent ────────────────────────────────────────

#[tokio::test]
async fn status_leader_reports_this_node() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/status/leader", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let leader: String = body_json(resp).await;
    assert!(!leader.is_empty());
}

#[tokio::test]
async fn catalog_nodes_carries_index_header() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/catalog/nodes?near=_agent", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-consul-index"));
}

#[tokio::test]
async fn agent_self_describes_the_node() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/agent/self", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["Config"]["NodeName"], "node1");
    assert_eq!(body["Config"]["Datacenter"], "dc1");
    assert_eq!(body["Config"]["Server"], true);
}

// ── Response composition ────────────────────────────────────────────

#[tokio::test]
async fn configured_and_translate_headers_are_applied() {
    let mut response_headers = BTreeMap::new();
    response_headers.insert("X-Powered-By".to_string(), "conclave".to_string());
    let config = GatewayConfig {
        response_headers,
        translate_wan_addrs: true,
        ..base_config()
    };
    let h = harness(config, AclConfig::default());

    let resp = send(&h.app, Method::GET, "/v1/status/leader", None).await;
    assert_eq!(resp.headers()["x-powered-by"], "conclave");
    assert_eq!(resp.headers()["x-consul-translate-addresses"], "true");

    let resp = send(&h.app, Method::GET, "/v1/kv/a?index=bogus", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()["x-powered-by"], "conclave");
}

#[tokio::test]
async fn translate_header_absent_by_default() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/status/leader", None).await;
    assert!(resp.headers().get("x-consul-translate-addresses").is_none());
}

#[tokio::test]
async fn pretty_flag_indents_output() {
    let h = harness(base_config(), AclConfig::default());

    let resp = send(&h.app, Method::GET, "/v1/agent/self?pretty", None).await;
    assert_eq!(resp.headers()["content-type"], "application/json");
    let pretty = body_string(resp).await;
    assert!(pretty.contains("\n    \"Config\""));
    assert!(pretty.ends_with('\n'));

    let resp = send(&h.app, Method::GET, "/v1/agent/self", None).await;
    assert!(!body_string(resp).await.contains('\n'));
}

#[tokio::test]
async fn dev_mode_always_pretty_prints() {
    let config = GatewayConfig {
        dev_mode: true,
        ..base_config()
    };
    let h = harness(config, AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/agent/self", None).await;
    assert!(body_string(resp).await.ends_with("}\n"));
}

// ── Keyring ─────────────────────────────────────────────────────────

#[tokio::test]
async fn keyring_operations_are_gated_by_acl() {
    let h = harness(base_config(), deny_by_default());
    let install = key_body(SECONDARY);

    let resp = send(&h.app, Method::GET, "/v1/operator/keyring", None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    for method in [Method::POST, Method::PUT, Method::DELETE] {
        let resp = send(&h.app, method, "/v1/operator/keyring", Some(&install)).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
    assert_eq!(h.cluster.query_count(), 0);

    let resp = send(
        &h.app,
        Method::POST,
        "/v1/operator/keyring?token=keyring-reader",
        Some(&install),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.cluster.query_count(), 0);

    let resp = send(
        &h.app,
        Method::GET,
        "/v1/operator/keyring?token=keyring-reader",
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&h.app, Method::GET, "/v1/operator/keyring?token=bogus", None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(body_string(resp).await.contains("ACL not found"));
}

#[tokio::test]
async fn keyring_token_header_is_honoured() {
    let h = harness(base_config(), deny_by_default());
    let resp = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/operator/keyring")
                .header("X-Consul-Token", "root")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn keyring_rotation_end_to_end() {
    let h = harness(base_config(), deny_by_default());
    let uri = "/v1/operator/keyring?token=root";

    let resp = send(&h.app, Method::POST, uri, Some(&key_body(SECONDARY))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let results: KeyringResults = body_json(resp).await;
    assert_eq!(results.local.num_nodes, 2);
    assert_eq!(results.local.keys[SECONDARY], 2);
    assert_eq!(results.federation.as_ref().unwrap().keys[SECONDARY], 1);

    let resp = send(&h.app, Method::PUT, uri, Some(&key_body(SECONDARY))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let results: KeyringResults = body_json(resp).await;
    assert_eq!(results.local.primary_keys[SECONDARY], 2);

    let resp = send(&h.app, Method::DELETE, uri, Some(&key_body(PRIMARY))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let results: KeyringResults = body_json(resp).await;
    assert_eq!(results.num_errors(), 0);
    assert!(!results.local.keys.contains_key(PRIMARY));
}

#[tokio::test]
async fn keyring_partial_failure_is_still_200() {
    let h = harness(base_config(), AclConfig::default());
    h.cluster.set_reachable(KeyringScope::Local, "node2", false);

    let resp = send(
        &h.app,
        Method::POST,
        "/v1/operator/keyring",
        Some(&key_body(SECONDARY)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let results: KeyringResults = body_json(resp).await;
    assert_eq!(results.local.num_nodes, 2);
    assert_eq!(results.local.num_responses, 1);
    assert_eq!(results.local.num_errors, 1);
    assert!(results.local.messages.contains_key("node2"));
}

#[tokio::test]
async fn keyring_primary_removal_is_refused() {
    let h = harness(base_config(), AclConfig::default());
    let resp = send(
        &h.app,
        Method::DELETE,
        "/v1/operator/keyring",
        Some(&key_body(PRIMARY)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(resp).await.contains("primary key"));
    assert_eq!(h.cluster.query_count(), 0);
}

#[tokio::test]
async fn keyring_bad_body_and_relay_factor_are_400() {
    let h = harness(base_config(), AclConfig::default());

    let resp = send(&h.app, Method::POST, "/v1/operator/keyring", Some("{")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &h.app,
        Method::GET,
        "/v1/operator/keyring?relay-factor=9",
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.cluster.query_count(), 0);
}

#[tokio::test]
async fn client_agents_report_only_the_local_scope() {
    let config = GatewayConfig {
        server: false,
        ..base_config()
    };
    let h = harness(config, AclConfig::default());
    let resp = send(&h.app, Method::GET, "/v1/operator/keyring", None).await;
    let body: serde_json::Value = body_json(resp).await;
    assert!(body.get("Local").is_some());
    assert!(body.get("Federation").is_none());
}

// ── Audit trail ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct LogBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
}

struct LogBufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogBufferWriter {
            buffer: self.buffer.clone(),
        }
    }
}

impl Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .expect("log buffer")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn take(&self) -> String {
        let mut buffer = self.buffer.lock().expect("log buffer");
        String::from_utf8(std::mem::take(&mut *buffer)).expect("utf8 logs")
    }
}

#[tokio::test]
async fn every_request_logs_one_redacted_completion_line() {
    let mut acl = deny_by_default();
    acl.tokens.insert(
        "SECRET".to_string(),
        Rules {
            keyring: Some(AccessLevel::Read),
            ..Rules::default()
        },
    );
    let h = harness(base_config(), acl);

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .finish();
    let _guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));

    let cases = [
        (Method::GET, "/v1/operator/keyring?token=SECRET", StatusCode::OK),
        (
            Method::GET,
            "/v1/kv/a?stale&consistent&token=SECRET",
            StatusCode::BAD_REQUEST,
        ),
        (
            Method::POST,
            "/v1/operator/keyring?token=SECRET",
            StatusCode::FORBIDDEN,
        ),
        (
            Method::GET,
            "/v1/kv/a?dc=dc9&token=SECRET",
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            Method::GET,
            "/v1/kv/SECRET?token=SE%43RET",
            StatusCode::FORBIDDEN,
        ),
    ];
    for (method, uri, expected) in cases {
        let body = (method == Method::POST).then(|| key_body(SECONDARY));
        let resp = send(&h.app, method.clone(), uri, body.as_deref()).await;
        assert_eq!(resp.status(), expected, "{method} {uri}");

        let logged = logs.take();
        let completions: Vec<&str> = logged
            .lines()
            .filter(|line| line.contains("conclave::http: Request method="))
            .collect();
        assert_eq!(completions.len(), 1, "{method} {uri}: {logged}");
        assert!(completions[0].contains("<hidden>"), "{}", completions[0]);
        assert!(!logged.contains("SECRET"), "{logged}");
        assert!(!logged.contains("SE%43RET"), "{logged}");
    }
}
