//! Shared fixtures for the wiremock-backed integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use console_auth::TokenPair;
use console_client::{AppContext, ClientConfig, ClientStorage, HttpClient, MemoryStore, TokenStore};

pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri())
}

/// `{success: true, message: "ok", data}`
pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message": "ok",
        "data": data
    }))
}

pub fn rejected(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "message": message,
        "data": null
    }))
}

pub fn token_response(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {"accessToken": access, "refreshToken": refresh}
    }))
}

pub fn me_user() -> Value {
    json!({
        "_id": "me",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "role": {"_id": "r1", "name": "Super Admin"},
        "status": "active"
    })
}

/// Token store over its own profile on `durable`.
pub async fn token_store(durable: &Arc<MemoryStore>) -> Arc<TokenStore> {
    let storage = ClientStorage::open(durable.clone()).await.unwrap();
    Arc::new(TokenStore::new(Arc::new(storage)))
}

/// Persist a remembered credential so later profiles on `durable` see it.
pub async fn seed_credential(durable: &Arc<MemoryStore>, access: &str, refresh: &str) {
    let pair = TokenPair {
        access_token: access.into(),
        refresh_token: Some(refresh.into()),
    };
    token_store(durable)
        .await
        .set_credential(&pair, true, None)
        .await
        .unwrap();
}

pub fn http_client(server: &MockServer, tokens: Arc<TokenStore>) -> HttpClient {
    HttpClient::new(&config(server), tokens).unwrap()
}

/// A context restored from a stored credential (`/admin/me` is mounted).
pub async fn signed_in_context(server: &MockServer) -> AppContext {
    let durable = Arc::new(MemoryStore::new());
    seed_credential(&durable, "a1", "r1").await;

    Mock::given(method("GET"))
        .and(path("/admin/me"))
        .respond_with(ok(me_user()))
        .mount(server)
        .await;

    let ctx = AppContext::start(config(server), durable).await.unwrap();
    assert!(ctx.status().is_authenticated());
    ctx
}

pub async fn requests_to(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .collect()
}

pub fn body_text(request: &Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}
