//! Engine integration tests
//!
//! Full poll cycles against a wiremock-mocked management API, dispatched
//! into an in-memory sink.

use std::collections::HashMap;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rabbitmq_collectd::config::{Connection, Credentials, IgnoreRules, PollConfig};
use rabbitmq_collectd::dispatch::{Dispatcher, Metric, VecSink};
use rabbitmq_collectd::engine::StatsEngine;

/// Build a PollConfig pointed at the mock server
fn poll_config(uri: &str, ignore: HashMap<String, Vec<String>>) -> PollConfig {
    let url = url::Url::parse(uri).expect("mock server uri");
    PollConfig {
        connection: Connection {
            scheme: url.scheme().to_string(),
            host: url.host_str().expect("mock server host").to_string(),
            port: url.port().expect("mock server port"),
            validate_certs: true,
        },
        credentials: Credentials {
            username: "guest".to_string(),
            password: "guest".to_string(),
            realm: "RabbitMQ Management".to_string(),
        },
        ignore: IgnoreRules::compile(&ignore).unwrap(),
        vhost_prefix: None,
        prefix: "rabbitmq".to_string(),
        timeout_ms: 5000,
    }
}

async fn run_cycle(server: &MockServer, ignore: HashMap<String, Vec<String>>) -> Vec<Metric> {
    let config = poll_config(&server.uri(), ignore);
    let engine = StatsEngine::new(&config).unwrap();
    let mut dispatcher = Dispatcher::new(VecSink::new());
    engine.read(&mut dispatcher).await;
    dispatcher.into_inner().metrics().to_vec()
}

fn find<'a>(
    metrics: &'a [Metric],
    plugin: &str,
    instance: &str,
    type_name: &str,
    type_instance: Option<&str>,
) -> Option<&'a Metric> {
    metrics.iter().find(|m| {
        m.identity.plugin == plugin
            && m.identity.plugin_instance.as_deref() == Some(instance)
            && m.identity.type_name == type_name
            && m.identity.type_instance.as_deref() == type_instance
    })
}

async fn mount_json(server: &MockServer, url_path: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_default_vhost_queue_cycle() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/nodes", json!([])).await;
    mount_json(&server, "/api/vhosts", json!([{"name": "/"}])).await;
    mount_json(&server, "/api/queues/%2F", json!([{"name": "orders"}])).await;
    mount_json(
        &server,
        "/api/queues/%2F/orders",
        json!({
            "name": "orders",
            "messages": 5,
            "messages_ready": 3,
            "message_stats": {
                "publish": 10,
                "publish_details": {"rate": 0.5},
            },
        }),
    )
    .await;
    mount_json(&server, "/api/exchanges/%2F", json!([])).await;

    let metrics = run_cycle(&server, HashMap::new()).await;

    let messages = find(&metrics, "queues", "orders", "messages", None).unwrap();
    assert_eq!(messages.values, vec![5.0]);
    assert_eq!(messages.identity.host, "rabbitmq_default");

    let ready = find(&metrics, "queues", "orders", "messages_ready", None).unwrap();
    assert_eq!(ready.values, vec![3.0]);

    let publish = find(&metrics, "queues", "orders", "publish", None).unwrap();
    assert_eq!(publish.values, vec![10.0]);

    let rate = find(&metrics, "queues", "orders", "publish_details", Some("rate")).unwrap();
    assert_eq!(rate.values, vec![0.5]);

    // Every dispatched metric carries the companion metadata flag
    for metric in &metrics {
        assert_eq!(metric.meta, json!({"0": true}));
    }
}

#[tokio::test]
async fn test_requests_carry_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/vhosts"))
        .and(header("authorization", "Basic Z3Vlc3Q6Z3Vlc3Q="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    mount_json(&server, "/api/nodes", json!([])).await;

    let _ = run_cycle(&server, HashMap::new()).await;

    server.verify().await;
}

#[tokio::test]
async fn test_ignored_names_suppress_detail_fetches() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/nodes", json!([])).await;
    mount_json(&server, "/api/vhosts", json!([{"name": "/"}])).await;
    mount_json(
        &server,
        "/api/queues/%2F",
        json!([{"name": "tmp-1"}, {"name": "tmp-2"}, {"name": "orders"}]),
    )
    .await;
    mount_json(&server, "/api/exchanges/%2F", json!([])).await;

    Mock::given(method("GET"))
        .and(path("/api/queues/%2F/orders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "orders", "messages": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // The filter runs before the detail fetch: zero calls for ignored names
    for ignored in ["tmp-1", "tmp-2"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/queues/%2F/{}", ignored)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;
    }

    let mut ignore = HashMap::new();
    ignore.insert("queue".to_string(), vec!["tmp-".to_string()]);
    let metrics = run_cycle(&server, ignore).await;

    server.verify().await;

    assert!(find(&metrics, "queues", "orders", "messages", None).is_some());
    assert!(!metrics
        .iter()
        .any(|m| matches!(m.identity.plugin_instance.as_deref(), Some(i) if i.starts_with("tmp-"))));
}

#[tokio::test]
async fn test_duplicate_nodes_get_distinct_instances() {
    let server = MockServer::start().await;

    mount_json(
        &server,
        "/api/nodes",
        json!([
            {"name": "rabbit@host1", "fd_used": 10},
            {"name": "rabbit@host1", "fd_used": 20},
        ]),
    )
    .await;
    mount_json(&server, "/api/vhosts", json!([])).await;

    let metrics = run_cycle(&server, HashMap::new()).await;

    let first = find(&metrics, "node", "host1", "fd_used", None).unwrap();
    assert_eq!(first.values, vec![10.0]);

    let second = find(&metrics, "node", "host11", "fd_used", None).unwrap();
    assert_eq!(second.values, vec![20.0]);
}

#[tokio::test]
async fn test_overview_cycle() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/nodes", json!([])).await;
    mount_json(&server, "/api/vhosts", json!([])).await;
    mount_json(
        &server,
        "/api/overview",
        json!({
            "cluster_name": "rabbit@host1",
            "object_totals": {"queues": 4, "exchanges": 9},
            "queue_totals": {
                "messages": 7,
                "messages_details": {"rate": 1.25},
            },
        }),
    )
    .await;

    let metrics = run_cycle(&server, HashMap::new()).await;

    let queues = find(
        &metrics,
        "overview",
        "rabbit_at_host1",
        "object_totals_queues",
        None,
    )
    .unwrap();
    assert_eq!(queues.values, vec![4.0]);
    assert_eq!(queues.identity.host, "rabbitmq_default");

    let messages = find(
        &metrics,
        "overview",
        "rabbit_at_host1",
        "queue_totals_messages",
        None,
    )
    .unwrap();
    assert_eq!(messages.values, vec![7.0]);

    let rate = find(
        &metrics,
        "overview",
        "rabbit_at_host1",
        "queue_totals_messages_details",
        Some("rate"),
    )
    .unwrap();
    assert_eq!(rate.values, vec![1.25]);

    // Keys the broker omitted still dispatch as 0
    let publish = find(
        &metrics,
        "overview",
        "rabbit_at_host1",
        "message_stats_publish",
        None,
    )
    .unwrap();
    assert_eq!(publish.values, vec![0.0]);
}

#[tokio::test]
async fn test_exchange_without_message_stats_emits_no_series() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/nodes", json!([])).await;
    mount_json(&server, "/api/vhosts", json!([{"name": "/"}])).await;
    mount_json(&server, "/api/queues/%2F", json!([])).await;
    mount_json(&server, "/api/exchanges/%2F", json!([{"name": "idle"}])).await;
    mount_json(
        &server,
        "/api/exchanges/%2F/idle",
        json!({"name": "idle", "type": "topic"}),
    )
    .await;

    let metrics = run_cycle(&server, HashMap::new()).await;

    // No traffic recorded yet is different from zero traffic: nothing at all
    assert!(metrics.iter().all(|m| m.identity.plugin != "exchanges"));
}

#[tokio::test]
async fn test_failed_detail_fetch_skips_entity_only() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/nodes", json!([])).await;
    mount_json(&server, "/api/vhosts", json!([{"name": "/"}])).await;
    mount_json(
        &server,
        "/api/queues/%2F",
        json!([{"name": "broken"}, {"name": "orders"}]),
    )
    .await;
    mount_json(&server, "/api/exchanges/%2F", json!([])).await;
    mount_json(
        &server,
        "/api/queues/%2F/orders",
        json!({"name": "orders", "messages": 2}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/queues/%2F/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let metrics = run_cycle(&server, HashMap::new()).await;

    // The failing entity is skipped; the rest of the category continues
    assert!(find(&metrics, "queues", "broken", "messages", None).is_none());
    let orders = find(&metrics, "queues", "orders", "messages", None).unwrap();
    assert_eq!(orders.values, vec![2.0]);
}

#[tokio::test]
async fn test_all_endpoints_failing_yields_empty_cycle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let metrics = run_cycle(&server, HashMap::new()).await;
    assert!(metrics.is_empty());
}

#[tokio::test]
async fn test_named_vhost_scope_label() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/nodes", json!([])).await;
    mount_json(&server, "/api/vhosts", json!([{"name": "logs/audit"}])).await;
    mount_json(
        &server,
        "/api/queues/logs%2Faudit",
        json!([{"name": "events"}]),
    )
    .await;
    mount_json(
        &server,
        "/api/queues/logs%2Faudit/events",
        json!({"name": "events", "messages": 1}),
    )
    .await;
    mount_json(&server, "/api/exchanges/logs%2Faudit", json!([])).await;

    let metrics = run_cycle(&server, HashMap::new()).await;

    let events = find(&metrics, "queues", "events", "messages", None).unwrap();
    assert_eq!(events.identity.host, "rabbitmq_logs_slash_audit");
}
