//! Shared setup for gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use database::{gateway, phone_number, user, Database, NewPhoneNumber, PhoneNumber, User};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sms_gateway::AppState;
use sms_provider::{CredentialVault, ProviderConfig, ProviderFactory, RetryPolicy};
use sms_webhook::SignatureSecrets;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

pub const PUBLIC_BASE_URL: &str = "https://gw.example.com";
pub const TENANT_NUMBER: &str = "+14155551234";
pub const CONTACT: &str = "+19998887777";

pub struct Tenant {
    pub admin: User,
    pub member: User,
    pub number: PhoneNumber,
}

pub async fn state(provider_base_url: Option<&str>, secrets: SignatureSecrets) -> AppState {
    let db = Database::in_memory().await.unwrap();
    let vault = Arc::new(CredentialVault::new([9u8; 32]));
    let mut config = ProviderConfig::default().with_retry(RetryPolicy::none());
    if let Some(url) = provider_base_url {
        config = config.with_base_url(url);
    }
    let providers = ProviderFactory::new(vault, config).unwrap();
    AppState::new(db, providers, secrets, Some(PUBLIC_BASE_URL.to_string()))
}

/// Admin, one member and a Telnyx gateway with one number assigned to the member.
pub async fn telnyx_tenant(state: &AppState) -> Tenant {
    let pool = state.db.pool();
    let admin = user::create_admin(pool, "acme").await.unwrap();
    let member = user::create_member(pool, "mia", admin.id).await.unwrap();

    let sealed = state
        .providers()
        .seal_credentials(&json!({"apiKey": "KEY123"}))
        .unwrap();
    let gw = gateway::create_gateway(pool, admin.id, "telnyx", "Main", &sealed, true)
        .await
        .unwrap();

    let number = phone_number::upsert_phone_number(
        pool,
        &NewPhoneNumber {
            number: TENANT_NUMBER.to_string(),
            friendly_name: None,
            provider_sid: Some("pn-1".to_string()),
            provider: "telnyx".to_string(),
            gateway_id: Some(gw.id),
            tenant_id: admin.id,
            capabilities: vec!["sms".to_string(), "voice".to_string()],
            purchased_at: None,
            monthly_rate: None,
        },
    )
    .await
    .unwrap();
    let number = phone_number::set_assignee(pool, number.id, Some(member.id))
        .await
        .unwrap();

    Tenant {
        admin,
        member,
        number,
    }
}

/// Open a hub connection authenticated as `user_id`, with the auth frame drained.
pub async fn live_session(state: &AppState, user_id: i64) -> (u64, UnboundedReceiver<String>) {
    let (id, mut rx) = state.hub.connect();
    state.hub.authenticate(id, user_id).await.unwrap();
    let ack = next_frame(&mut rx);
    assert_eq!(ack["type"], "auth_success");
    (id, rx)
}

pub fn next_frame(rx: &mut UnboundedReceiver<String>) -> Value {
    let raw = rx.try_recv().expect("expected a frame");
    serde_json::from_str(&raw).unwrap()
}

pub fn telnyx_inbound(id: &str, text: &str) -> Value {
    json!({
        "data": {
            "event_type": "message.received",
            "payload": {
                "id": id,
                "from": {"phone_number": CONTACT},
                "to": [{"phone_number": TENANT_NUMBER}],
                "text": text
            }
        }
    })
}

pub fn telnyx_status(id: &str, status: &str) -> Value {
    json!({
        "data": {
            "event_type": "message.finalized",
            "payload": {
                "id": id,
                "to": [{"phone_number": CONTACT, "status": status}]
            }
        }
    })
}

pub fn json_request(method: &str, uri: &str, user_id: Option<i64>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, user_id: i64) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .body(Body::empty())
        .unwrap()
}

pub async fn send(state: &AppState, request: Request<Body>) -> Response<Body> {
    sms_gateway::app(state.clone()).oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
