//! Webhook scenarios: inbound recording, replay, status updates, signatures.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use database::{conversation, message, MessageDirection, MessageStatus};
use secrecy::SecretString;
use serde_json::json;
use sms_webhook::{signalwire_signature, twilio_signature, SignatureSecrets};

use common::*;

#[tokio::test]
async fn test_telnyx_inbound_reaches_admin_and_assignee() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let (_, mut admin_rx) = live_session(&state, tenant.admin.id).await;
    let (_, mut member_rx) = live_session(&state, tenant.member.id).await;

    let response = send(
        &state,
        json_request("POST", "/webhooks/sms/inbound", None, &telnyx_inbound("tx-1", "hi")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("content-type").is_none());

    let conversations = conversation::list_for_tenant(state.db.pool(), tenant.admin.id)
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    let conv = &conversations[0];
    assert_eq!(conv.contact_number, CONTACT);
    assert_eq!(conv.assigned_user_id, Some(tenant.member.id));
    assert_eq!(conv.unread_count, 1);

    let messages = message::list_for_conversation(state.db.pool(), conv.id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, MessageDirection::Inbound);
    assert_eq!(messages[0].status, MessageStatus::Delivered);
    assert_eq!(messages[0].content, "hi");

    for rx in [&mut admin_rx, &mut member_rx] {
        let event = next_frame(rx);
        assert_eq!(event["type"], "new_inbound_message");
        assert_eq!(event["conversationId"], conv.id);
        assert_eq!(event["message"]["content"], "hi");
        assert!(rx.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_inbound_replay_is_deduplicated() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let (_, mut admin_rx) = live_session(&state, tenant.admin.id).await;

    for _ in 0..2 {
        let response = send(
            &state,
            json_request("POST", "/webhooks/sms/inbound", None, &telnyx_inbound("tx-1", "hi")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let conversations = conversation::list_for_tenant(state.db.pool(), tenant.admin.id)
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].unread_count, 1);
    let messages = message::list_for_conversation(state.db.pool(), conversations[0].id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);

    // One event for the original, none for the replay.
    assert_eq!(next_frame(&mut admin_rx)["type"], "new_inbound_message");
    assert!(admin_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_inbound_to_unknown_number_is_404() {
    let state = state(None, SignatureSecrets::default()).await;
    telnyx_tenant(&state).await;

    let mut payload = telnyx_inbound("tx-1", "hi");
    payload["data"]["payload"]["to"] = json!([{"phone_number": "+12125550000"}]);
    let response = send(&state, json_request("POST", "/webhooks/sms/inbound", None, &payload)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unrecognized_payload_is_400() {
    let state = state(None, SignatureSecrets::default()).await;
    let response = send(
        &state,
        json_request("POST", "/webhooks/sms/inbound", None, &json!({"hello": "world"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_form_inbound_acknowledged_with_twiml() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/sms/inbound")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(
            "From=9998887777&To=%2B14155551234&Body=hello&MessageSid=SM1",
        ))
        .unwrap();
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/xml");
    assert!(body_text(response).await.contains("<Response>"));

    let conversations = conversation::list_for_tenant(state.db.pool(), tenant.admin.id)
        .await
        .unwrap();
    assert_eq!(conversations[0].contact_number, CONTACT);
}

#[tokio::test]
async fn test_status_updates_apply_in_arrival_order() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let pool = state.db.pool();

    let (conv, _) = conversation::find_or_create(pool, tenant.number.id, CONTACT, None)
        .await
        .unwrap();
    let sent = message::insert_message(
        pool,
        &database::NewMessage {
            conversation_id: conv.id,
            sender_id: Some(tenant.member.id),
            content: "hello".to_string(),
            direction: MessageDirection::Outbound,
            status: MessageStatus::Sent,
            provider_message_id: Some("msg-1".to_string()),
        },
    )
    .await
    .unwrap();
    let (_, mut member_rx) = live_session(&state, tenant.member.id).await;

    for (raw, expected) in [
        ("queued", MessageStatus::Pending),
        ("delivered", MessageStatus::Delivered),
        ("delivery_failed", MessageStatus::Failed),
    ] {
        let response = send(
            &state,
            json_request("POST", "/webhooks/sms/status", None, &telnyx_status("msg-1", raw)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = message::get_message(pool, sent.id).await.unwrap();
        assert_eq!(stored.status, expected, "after {raw}");

        let event = next_frame(&mut member_rx);
        assert_eq!(event["type"], "message_status");
        assert_eq!(event["messageId"], sent.id);
        assert_eq!(event["status"], expected.as_str());
    }
}

#[tokio::test]
async fn test_status_for_unknown_message_is_acknowledged() {
    let state = state(None, SignatureSecrets::default()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/sms/status")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("MessageSid=SM404&MessageStatus=delivered"))
        .unwrap();

    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

fn signed_secrets() -> SignatureSecrets {
    SignatureSecrets {
        twilio_auth_token: Some(SecretString::from("twilio-secret")),
        signalwire_signing_key: None,
    }
}

fn form_request(body: &'static str, header: Option<(&str, String)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/sms/status")
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_twilio_signature_checked_against_public_url() {
    let state = state(None, signed_secrets()).await;
    let body = "MessageSid=SM1&MessageStatus=delivered";
    let url = format!("{PUBLIC_BASE_URL}/webhooks/sms/status");

    let valid = twilio_signature("twilio-secret", &url, body.as_bytes());
    let response = send(
        &state,
        form_request(body, Some(("X-Twilio-Signature", valid))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let forged = twilio_signature("wrong-secret", &url, body.as_bytes());
    let response = send(
        &state,
        form_request(body, Some(("X-Twilio-Signature", forged))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid webhook signature");
}

#[tokio::test]
async fn test_missing_signature_header_is_skipped() {
    let state = state(None, signed_secrets()).await;
    let response = send(
        &state,
        form_request("MessageSid=SM1&MessageStatus=delivered", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signature_without_server_secret_is_rejected() {
    let state = state(None, signed_secrets()).await;
    let body = "MessageSid=SM1&MessageStatus=delivered";
    let signature = signalwire_signature("any-key", body.as_bytes());

    let response = send(
        &state,
        form_request(body, Some(("X-SignalWire-Signature", signature))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
