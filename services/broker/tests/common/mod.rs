//! Fake panels and registry files shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WEB_BASE_PATH: &str = "xui";

/// Registry entry for a node whose panel lives at `api_url`.
pub fn node_entry(id: &str, api_url: &str, users_limit: u64) -> Value {
    json!({
        "id": id,
        "apiUrl": api_url,
        "webBasePath": WEB_BASE_PATH,
        "username": "admin",
        "password": "secret",
        "usersLimit": users_limit,
        "publicHost": format!("{id}.vpn.example"),
        "publicPort": 443,
        "security": "reality",
        "pbk": "pubkey",
        "fp": "chrome",
        "sni": "www.example.com",
        "sid": "ab12",
        "spx": "/"
    })
}

pub fn write_registry(dir: &Path, entries: &[Value]) {
    std::fs::write(
        dir.join("servers.json"),
        serde_json::to_string_pretty(&json!({ "servers": entries })).unwrap(),
    )
    .unwrap();
}

/// Base URL of a port nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// A panel that accepts the login and reports `clients` clients on one inbound.
pub async fn healthy_panel(clients: usize) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/{WEB_BASE_PATH}/login")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "3x-ui=session; Path=/; HttpOnly")
                .set_body_json(json!({"success": true, "msg": "", "obj": null})),
        )
        .mount(&server)
        .await;

    let stats: Vec<Value> = (0..clients)
        .map(|i| json!({"id": i, "inboundId": 1, "email": format!("c{i}"), "enable": true}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/{WEB_BASE_PATH}/panel/api/inbounds/list")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "msg": "",
            "obj": [
                {"id": 1, "remark": "main", "protocol": "vless", "port": 443, "enable": true, "clientStats": stats}
            ]
        })))
        .mount(&server)
        .await;

    server
}

pub fn add_client_path() -> String {
    format!("/{WEB_BASE_PATH}/panel/api/inbounds/addClient")
}

/// Accept `addClient` calls, expecting exactly `times` of them.
pub async fn accept_add_client(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(add_client_path()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "msg": "added"})),
        )
        .expect(times)
        .mount(server)
        .await;
}
