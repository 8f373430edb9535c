//! The checker gates every outbound and route-rule commit.

use serde_json::{json, Value};

mod common;

fn sample() -> Value {
    json!({
        "outbounds": [{"tag": "A", "type": "direct"}],
        "route": {"rules": [{"outbound": "A", "domain": ["x.com"]}]}
    })
}

#[tokio::test]
async fn test_rejected_candidate_is_not_written() {
    let server = common::spawn_server(sample()).await;
    let before = server.read_raw();

    let res = server
        .client
        .post(server.url("/api/singbox/outbounds"))
        .json(&json!({"tag": "X", "type": "bad"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "configuration validation failed");
    assert_eq!(body["details"]["output"], "FATAL[0000] unknown type: bad");

    assert_eq!(server.validator.calls(), 1);
    assert_eq!(server.read_raw(), before);
}

#[tokio::test]
async fn test_each_commit_checks_once() {
    let server = common::spawn_server(sample()).await;

    for tag in ["B", "C"] {
        let res = server
            .client
            .post(server.url("/api/singbox/outbounds"))
            .json(&json!({"tag": tag, "type": "vless"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }
    let res = server
        .client
        .post(server.url("/api/singbox/rules/route/1/move-down"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // The failed move never reached the checker.
    assert_eq!(server.validator.calls(), 2);
}

#[tokio::test]
async fn test_validate_endpoint_reports_verdict() {
    let server = common::spawn_server(sample()).await;

    let res = server
        .client
        .post(server.url("/api/singbox/config/validate"))
        .json(&json!({"config": {"outbounds": [{"tag": "X", "type": "bad"}]}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["errors"], json!(["FATAL[0000] unknown type: bad"]));
    assert_eq!(body["data"]["validation_method"], "sing-box check");

    let res = server
        .client
        .post(server.url("/api/singbox/config/validate"))
        .json(&json!({"config": sample()}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["errors"], json!([]));
}

#[tokio::test]
async fn test_validate_current_reads_disk() {
    let server = common::spawn_server(json!({"outbounds": [{"tag": "X", "type": "bad"}]})).await;

    let res = server
        .client
        .post(server.url("/api/singbox/config/validate-current"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["valid"], false);
    assert_eq!(body["data"]["error"], "FATAL[0000] unknown type: bad");

    std::fs::remove_file(&server.config_path).unwrap();
    let res = server
        .client
        .post(server.url("/api/singbox/config/validate-current"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = common::spawn_server(sample()).await;

    let res = server
        .client
        .post(server.url("/api/singbox/outbounds"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], 400);

    let res = server
        .client
        .post(server.url("/api/singbox/outbounds"))
        .json(&json!({"type": "vmess"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(server.validator.calls(), 0);
}
