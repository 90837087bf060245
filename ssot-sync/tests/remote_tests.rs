mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use ssot_model::{Attributes, FieldValue, Handle};
use ssot_sync::remote::{self, CollectionSpec, RemoteAdapter, RemoteClient};
use ssot_sync::{
    Adapter, ApplyError, AuthScheme, LoadError, PermanentKind, RemoteConfig, RemoteError,
    SyncError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{
    body_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "0123456789abcdef";

fn config(server: &MockServer) -> RemoteConfig {
    RemoteConfig::new(server.uri(), TOKEN).with_auth_scheme(AuthScheme::Token)
}

fn adapter_with(config: RemoteConfig) -> RemoteAdapter {
    let client = Arc::new(RemoteClient::new(&config).unwrap());
    RemoteAdapter::new("netbox", registry(), client, remote::vlan_collections()).unwrap()
}

fn adapter(server: &MockServer) -> RemoteAdapter {
    adapter_with(config(server))
}

async fn mount_page(server: &MockServer, at: &str, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": results.as_array().map(Vec::len).unwrap_or(0),
            "next": null,
            "results": results
        })))
        .mount(server)
        .await;
}

// ── Construction ────────────────────────────────────────────────

#[test]
fn client_rejects_invalid_config() {
    let err = RemoteClient::new(&RemoteConfig::new("netbox.local", TOKEN)).unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

#[test]
fn client_builds_with_tls_verification_disabled() {
    let config = RemoteConfig::new("https://netbox.lab", TOKEN).with_verify_tls(false);
    let client = RemoteClient::new(&config).unwrap();
    assert_eq!(client.base_url(), "https://netbox.lab");
}

#[test]
fn client_resolves_relative_and_absolute_urls() {
    let client = RemoteClient::new(&RemoteConfig::new("https://netbox.lab/", TOKEN)).unwrap();
    assert_eq!(client.url("/api/ipam/vlans/"), "https://netbox.lab/api/ipam/vlans/");
    assert_eq!(
        client.url("https://other.lab/api/ipam/vlans/?offset=50"),
        "https://other.lab/api/ipam/vlans/?offset=50"
    );
}

#[test]
fn adapter_requires_a_collection_per_record_type() {
    let client = Arc::new(RemoteClient::new(&RemoteConfig::new("https://netbox.lab", TOKEN)).unwrap());
    let err = RemoteAdapter::new(
        "netbox",
        registry(),
        client,
        vec![CollectionSpec::new("vlan", remote::VLANS_PATH)],
    )
    .err()
    .unwrap();
    assert!(matches!(err, SyncError::Config(msg) if msg.contains("vlan_group")));
}

#[test]
fn adapter_rejects_rename_of_undeclared_field() {
    let client = Arc::new(RemoteClient::new(&RemoteConfig::new("https://netbox.lab", TOKEN)).unwrap());
    let specs = vec![
        CollectionSpec::new("vlan_group", remote::VLAN_GROUPS_PATH),
        CollectionSpec::new("vlan", remote::VLANS_PATH).rename("tenant__name", "tenant"),
    ];
    assert!(RemoteAdapter::new("netbox", registry(), client, specs).is_err());
}

// ── Load ────────────────────────────────────────────────────────

#[tokio::test]
async fn load_follows_next_cursor_across_pages() {
    let server = MockServer::start().await;
    mount_page(&server, remote::VLAN_GROUPS_PATH, json!([{"id": 7, "name": "eng", "description": ""}])).await;

    Mock::given(method("GET"))
        .and(path(remote::VLANS_PATH))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": format!("{}/api/ipam/vlans/?offset=1", server.uri()),
            "results": [{
                "id": 41, "vid": 10, "name": "users", "description": "old",
                "group": {"id": 7, "name": "eng"},
                "status": {"value": "active", "label": "Active"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(remote::VLANS_PATH))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": "/api/ipam/vlans/?offset=2",
            "results": [{"id": 42, "vid": 20, "name": "lab", "group": null, "status": null}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(remote::VLANS_PATH))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": null,
            "results": [{"id": 43, "vid": 30, "description": null}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = adapter(&server).load().await.unwrap();

    assert_eq!(snapshot.len("vlan_group"), 1);
    assert_eq!(snapshot.len("vlan"), 3);

    let users = snapshot.get("vlan", &vlan_key(10, Some("eng"))).unwrap();
    assert_eq!(users.handle, Some(Handle::from(41)));
    assert_eq!(users.record.attribute("status__name"), Some(&"Active".into()));

    let lab = snapshot.get("vlan", &vlan_key(20, None)).unwrap();
    assert_eq!(lab.record.attribute("description"), Some(&"".into()));
    assert_eq!(lab.record.attribute("status__name"), Some(&FieldValue::Null));

    assert!(snapshot.contains("vlan", &vlan_key(30, None)));
}

#[tokio::test]
async fn load_sends_configured_auth_header() {
    let server = MockServer::start().await;
    for at in [remote::VLAN_GROUPS_PATH, remote::VLANS_PATH] {
        Mock::given(method("GET"))
            .and(path(at))
            .and(header("authorization", format!("Token {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"next": null, "results": []})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let snapshot = adapter(&server).load().await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn bearer_is_the_default_scheme() {
    let server = MockServer::start().await;
    for at in [remote::VLAN_GROUPS_PATH, remote::VLANS_PATH] {
        Mock::given(method("GET"))
            .and(path(at))
            .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;
    }

    adapter_with(RemoteConfig::new(server.uri(), TOKEN))
        .load()
        .await
        .unwrap();
}

#[tokio::test]
async fn page_size_is_sent_as_limit() {
    let server = MockServer::start().await;
    for at in [remote::VLAN_GROUPS_PATH, remote::VLANS_PATH] {
        Mock::given(method("GET"))
            .and(path(at))
            .and(query_param("limit", "250"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;
    }

    adapter_with(config(&server).with_page_size(250))
        .load()
        .await
        .unwrap();
}

#[tokio::test]
async fn server_error_fails_the_load() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = adapter(&server).load().await.unwrap_err();
    assert!(matches!(err, LoadError::Remote(RemoteError::Status { status: 500, .. })));
}

#[tokio::test]
async fn item_without_id_is_malformed() {
    let server = MockServer::start().await;
    mount_page(&server, remote::VLAN_GROUPS_PATH, json!([{"name": "eng"}])).await;
    mount_page(&server, remote::VLANS_PATH, json!([])).await;

    let err = adapter(&server).load().await.unwrap_err();
    assert!(matches!(err, LoadError::Model(e) if e.is_load_fatal()));
}

#[tokio::test]
async fn group_without_natural_key_is_malformed() {
    let server = MockServer::start().await;
    mount_page(&server, remote::VLAN_GROUPS_PATH, json!([])).await;
    mount_page(&server, remote::VLANS_PATH, json!([{"id": 1, "vid": 10, "group": {"id": 7}}])).await;

    assert!(matches!(
        adapter(&server).load().await,
        Err(LoadError::Model(_))
    ));
}

#[tokio::test]
async fn duplicate_identity_fails_the_load() {
    let server = MockServer::start().await;
    mount_page(&server, remote::VLAN_GROUPS_PATH, json!([])).await;
    mount_page(&server, remote::VLANS_PATH, json!([{"id": 1, "vid": 10}, {"id": 2, "vid": 10}])).await;

    assert!(matches!(
        adapter(&server).load().await,
        Err(LoadError::Model(ssot_model::ModelError::DuplicateIdentity { .. }))
    ));
}

#[tokio::test]
async fn non_paginated_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
        .mount(&server)
        .await;

    let err = adapter(&server).load().await.unwrap_err();
    assert!(matches!(err, LoadError::Remote(RemoteError::Decode { .. })));
}

#[tokio::test]
async fn status_choice_resolves_to_its_label() {
    let server = MockServer::start().await;
    mount_page(&server, remote::VLAN_GROUPS_PATH, json!([])).await;
    mount_page(
        &server,
        remote::VLANS_PATH,
        json!([
            {"id": 1, "vid": 10, "status": {"value": "active", "label": "Active"}},
            {"id": 2, "vid": 20, "status": {"value": "deprecated", "label": "Deprecated"}},
            {"id": 3, "vid": 30, "status": null}
        ]),
    )
    .await;

    let snapshot = adapter(&server).load().await.unwrap();

    let status = |vid| {
        snapshot
            .get("vlan", &vlan_key(vid, None))
            .and_then(|entry| entry.record.attribute("status__name").cloned())
    };
    assert_eq!(status(10), Some(FieldValue::from("Active")));
    assert_eq!(status(20), Some(FieldValue::from("Deprecated")));
    assert_eq!(status(30), Some(FieldValue::Null));
}

// ── Pagination cursors ──────────────────────────────────────────

#[tokio::test]
async fn cursor_pointing_at_current_page_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(remote::VLAN_GROUPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}{}", server.uri(), remote::VLAN_GROUPS_PATH),
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, remote::VLANS_PATH, json!([])).await;

    let err = adapter(&server).load().await.unwrap_err();
    assert!(matches!(err, LoadError::Remote(RemoteError::Decode { .. })));
}

#[tokio::test]
async fn cursor_cycle_across_pages_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(remote::VLAN_GROUPS_PATH))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": "/api/ipam/vlan-groups/?page=2",
            "results": [{"id": 1, "name": "eng"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(remote::VLAN_GROUPS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}{}", server.uri(), remote::VLAN_GROUPS_PATH),
            "results": [{"id": 2, "name": "lab"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, remote::VLANS_PATH, json!([])).await;

    let err = tokio::time::timeout(Duration::from_secs(5), adapter(&server).load())
        .await
        .expect("pagination must terminate")
        .unwrap_err();
    assert!(
        matches!(&err, LoadError::Remote(RemoteError::Decode { reason, .. }) if reason.contains("revisits")),
        "{err}"
    );
}

#[tokio::test]
async fn cursor_to_another_origin_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(remote::VLAN_GROUPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": "http://collector.invalid/api/ipam/vlan-groups/?page=2",
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, remote::VLANS_PATH, json!([])).await;

    let err = adapter(&server).load().await.unwrap_err();
    assert!(
        matches!(&err, LoadError::Remote(RemoteError::Decode { reason, .. }) if reason.contains("leaves")),
        "{err}"
    );
}

// ── Concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn in_flight_requests_are_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(remote::VLANS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": []}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(6)
        .mount(&server)
        .await;

    let client = RemoteClient::new(&config(&server).with_max_in_flight(2)).unwrap();
    let url = client.url(remote::VLANS_PATH);

    let started = Instant::now();
    let responses = futures::future::join_all((0..6).map(|_| client.get_json(&url))).await;
    let elapsed = started.elapsed();

    assert!(responses.iter().all(Result::is_ok));
    // Six requests two at a time take three full delays.
    assert!(elapsed >= Duration::from_millis(600), "finished in {elapsed:?}");
}

// ── Writes ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_posts_identity_and_attributes_with_wire_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(remote::VLANS_PATH))
        .and(header("authorization", format!("Token {TOKEN}").as_str()))
        .and(body_json(json!({
            "vid": 20,
            "group__name": null,
            "name": "lab",
            "description": "x",
            "status": "active"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 77, "vid": 20})))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let record = vlan_with_status(20, None, "lab", "x", Some("Active"));
    let handle = adapter
        .creatable("vlan")
        .unwrap()
        .create(record.identity(), record.attributes())
        .await
        .unwrap();

    assert_eq!(handle, Handle::from(77));
}

#[tokio::test]
async fn update_sends_status_as_choice_value() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/ipam/vlans/41/"))
        .and(body_json(json!({"status": "reserved"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 41})))
        .expect(1)
        .mount(&server)
        .await;

    let changed: Attributes =
        BTreeMap::from([("status__name".to_string(), FieldValue::from("Reserved"))]);
    adapter(&server)
        .updatable("vlan")
        .unwrap()
        .update(&Handle::from(41), &changed)
        .await
        .unwrap();
}

#[tokio::test]
async fn update_patches_only_changed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/ipam/vlans/41/"))
        .and(body_json(json!({"description": "new"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 41})))
        .expect(1)
        .mount(&server)
        .await;

    let changed: Attributes = BTreeMap::from([("description".to_string(), FieldValue::from("new"))]);
    adapter(&server)
        .updatable("vlan")
        .unwrap()
        .update(&Handle::from(41), &changed)
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_addresses_item_by_handle() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/ipam/vlan-groups/7/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server)
        .deletable("vlan_group")
        .unwrap()
        .delete(&Handle::from(7))
        .await
        .unwrap();
}

#[tokio::test]
async fn write_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/ipam/vlans/1/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/ipam/vlans/2/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"vid": ["out of range"]})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/ipam/vlans/3/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let changed: Attributes = BTreeMap::from([("name".to_string(), FieldValue::from("x"))]);
    let updatable = adapter.updatable("vlan").unwrap();

    let unavailable = updatable.update(&Handle::from(1), &changed).await.unwrap_err();
    assert!(unavailable.is_transient());

    let rejected = updatable.update(&Handle::from(2), &changed).await.unwrap_err();
    match rejected {
        ApplyError::Permanent { kind, message } => {
            assert_eq!(kind, PermanentKind::Validation);
            assert!(message.contains("out of range"));
        }
        other => panic!("unexpected {other:?}"),
    }

    let missing = adapter
        .deletable("vlan")
        .unwrap()
        .delete(&Handle::from(3))
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        ApplyError::Permanent {
            kind: PermanentKind::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn create_response_without_id_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(remote::VLAN_GROUPS_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "eng"})))
        .mount(&server)
        .await;

    let record = group("eng", "");
    let err = adapter(&server)
        .creatable("vlan_group")
        .unwrap()
        .create(record.identity(), record.attributes())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Permanent {
            kind: PermanentKind::Decode,
            ..
        }
    ));
}
