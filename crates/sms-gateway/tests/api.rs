//! API scenarios: gateways, outbound sends, assignment and access control.

mod common;

use axum::http::StatusCode;
use database::{conversation, gateway, message, user, MessageStatus};
use fanout::HubError;
use serde_json::json;
use sms_provider::CredentialVault;
use sms_webhook::SignatureSecrets;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

async fn mock_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/phone_numbers"))
        .and(header("authorization", "Bearer KEY123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_requests_without_user_are_unauthorized() {
    let state = state(None, SignatureSecrets::default()).await;
    let response = send(&state, json_request("GET", "/api/conversations", None, &json!({}))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&state, get_request("/api/conversations", 4242)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_create_and_activate_keeps_single_active() {
    let server = MockServer::start().await;
    mock_probe(&server).await;
    let state = state(Some(&server.uri()), SignatureSecrets::default()).await;
    let admin = user::create_admin(state.db.pool(), "acme").await.unwrap();

    let mut ids = Vec::new();
    for name in ["First", "Second"] {
        let response = send(
            &state,
            json_request(
                "POST",
                "/api/gateways",
                Some(admin.id),
                &json!({"provider": "telnyx", "name": name, "credentials": {"apiKey": "KEY123"}}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body.get("credentials").is_none());
        ids.push(body["id"].as_i64().unwrap());
    }

    let gateways = gateway::list_gateways(state.db.pool(), admin.id).await.unwrap();
    assert!(gateways.iter().find(|g| g.id == ids[0]).unwrap().is_active);
    assert!(!gateways.iter().find(|g| g.id == ids[1]).unwrap().is_active);
    // Stored credentials are sealed, never plaintext.
    assert!(!gateways[0].credentials.contains("KEY123"));

    let response = send(
        &state,
        json_request(
            "POST",
            &format!("/api/gateways/{}/activate", ids[1]),
            Some(admin.id),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&state, get_request("/api/gateways", admin.id)).await;
    let listed = body_json(response).await;
    let active: Vec<i64> = listed
        .as_array()
        .unwrap()
        .iter()
        .filter(|g| g["isActive"] == true)
        .map(|g| g["id"].as_i64().unwrap())
        .collect();
    assert_eq!(active, vec![ids[1]]);
}

#[tokio::test]
async fn test_gateway_with_rejected_credentials_is_not_saved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/phone_numbers"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"title": "Authentication failed", "detail": "Bad key"}]
        })))
        .mount(&server)
        .await;
    let state = state(Some(&server.uri()), SignatureSecrets::default()).await;
    let admin = user::create_admin(state.db.pool(), "acme").await.unwrap();

    let test = send(
        &state,
        json_request(
            "POST",
            "/api/gateways/test",
            Some(admin.id),
            &json!({"provider": "telnyx", "credentials": {"apiKey": "nope"}}),
        ),
    )
    .await;
    assert_eq!(test.status(), StatusCode::OK);
    let outcome = body_json(test).await;
    assert_eq!(outcome["success"], false);
    assert!(outcome["error"].as_str().unwrap().contains("Authentication failed"));
    assert!(!outcome["error"].as_str().unwrap().contains("nope"));

    let create = send(
        &state,
        json_request(
            "POST",
            "/api/gateways",
            Some(admin.id),
            &json!({"provider": "telnyx", "name": "Main", "credentials": {"apiKey": "nope"}}),
        ),
    )
    .await;
    assert_eq!(create.status(), StatusCode::BAD_REQUEST);
    assert!(gateway::list_gateways(state.db.pool(), admin.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_members_cannot_manage_gateways() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;

    let response = send(&state, get_request("/api/gateways", tenant.member.id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Access denied");
}

#[tokio::test]
async fn test_outbound_send_then_status_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"from": TENANT_NUMBER, "to": CONTACT, "text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "msg-1",
                "from": {"phone_number": TENANT_NUMBER},
                "to": [{"phone_number": CONTACT, "status": "queued"}],
                "text": "hello"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let state = state(Some(&server.uri()), SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let (_, mut admin_rx) = live_session(&state, tenant.admin.id).await;

    let response = send(
        &state,
        json_request(
            "POST",
            "/api/messages",
            Some(tenant.member.id),
            &json!({"phoneNumberId": tenant.number.id, "to": "(999) 888-7777", "body": "hello"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let sent = body_json(response).await;
    assert_eq!(sent["status"], "pending");
    assert_eq!(sent["providerMessageId"], "msg-1");
    let message_id = sent["id"].as_i64().unwrap();

    let event = next_frame(&mut admin_rx);
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["message"]["id"], message_id);

    let response = send(
        &state,
        json_request("POST", "/webhooks/sms/status", None, &telnyx_status("msg-1", "delivered")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = message::get_message(state.db.pool(), message_id).await.unwrap();
    assert_eq!(stored.status, MessageStatus::Delivered);
}

#[tokio::test]
async fn test_failed_send_is_persisted_as_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": [{"title": "Invalid destination", "detail": "Not reachable"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let state = state(Some(&server.uri()), SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let (conv, _) = conversation::find_or_create(state.db.pool(), tenant.number.id, CONTACT, None)
        .await
        .unwrap();

    let response = send(
        &state,
        json_request(
            "POST",
            &format!("/api/conversations/{}/messages", conv.id),
            Some(tenant.admin.id),
            &json!({"body": "hello"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    let message_id = body["messageId"].as_i64().unwrap();

    let stored = message::get_message(state.db.pool(), message_id).await.unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.content, "hello");
}

#[tokio::test]
async fn test_send_with_unreadable_credentials_is_persisted_as_failed() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let pool = state.db.pool();

    // Credentials sealed under a key this deployment does not hold.
    gateway::delete_gateway(pool, tenant.admin.id, tenant.number.gateway_id.unwrap())
        .await
        .unwrap();
    let foreign = CredentialVault::new([7u8; 32])
        .encrypt(r#"{"apiKey":"KEY123"}"#)
        .unwrap();
    gateway::create_gateway(pool, tenant.admin.id, "telnyx", "Rotated", &foreign, true)
        .await
        .unwrap();

    let (conv, _) = conversation::find_or_create(pool, tenant.number.id, CONTACT, None)
        .await
        .unwrap();
    let (_, mut admin_rx) = live_session(&state, tenant.admin.id).await;

    let response = send(
        &state,
        json_request(
            "POST",
            &format!("/api/conversations/{}/messages", conv.id),
            Some(tenant.admin.id),
            &json!({"body": "hello"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    let message_id = body["messageId"].as_i64().unwrap();
    assert!(!body["error"].as_str().unwrap().contains("KEY123"));

    let stored = message::get_message(pool, message_id).await.unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    assert_eq!(stored.content, "hello");

    let event = next_frame(&mut admin_rx);
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["message"]["id"], message_id);
    assert_eq!(event["message"]["status"], "failed");
}

#[tokio::test]
async fn test_send_without_gateway_is_configuration_error() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    gateway::delete_gateway(state.db.pool(), tenant.admin.id, tenant.number.gateway_id.unwrap())
        .await
        .unwrap();

    let response = send(
        &state,
        json_request(
            "POST",
            "/api/messages",
            Some(tenant.admin.id),
            &json!({"phoneNumberId": tenant.number.id, "to": CONTACT, "body": "hello"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let stored = message::get_message(state.db.pool(), body["messageId"].as_i64().unwrap())
        .await
        .unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
}

#[tokio::test]
async fn test_unassigned_member_cannot_subscribe_or_read() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let outsider = user::create_member(state.db.pool(), "max", tenant.admin.id)
        .await
        .unwrap();
    let (conv, _) = conversation::find_or_create(state.db.pool(), tenant.number.id, CONTACT, None)
        .await
        .unwrap();

    let (connection, mut rx) = live_session(&state, outsider.id).await;
    let result = state.hub.subscribe(connection, conv.id).await;
    assert_eq!(result, Err(HubError::AccessDenied(conv.id)));
    assert_eq!(next_frame(&mut rx)["type"], "error");
    assert_eq!(state.hub.conversation_subscribers(conv.id), 0);

    let response = send(
        &state,
        get_request(&format!("/api/conversations/{}/messages", conv.id), outsider.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (assignee_conn, mut assignee_rx) = live_session(&state, tenant.member.id).await;
    state.hub.subscribe(assignee_conn, conv.id).await.unwrap();
    assert_eq!(next_frame(&mut assignee_rx)["type"], "subscribed");
}

#[tokio::test]
async fn test_assignment_change_notifies_old_and_new_assignee() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    let next = user::create_member(state.db.pool(), "max", tenant.admin.id)
        .await
        .unwrap();
    let stranger_admin = user::create_admin(state.db.pool(), "other").await.unwrap();
    let (_, mut old_rx) = live_session(&state, tenant.member.id).await;
    let (_, mut new_rx) = live_session(&state, next.id).await;

    let uri = format!("/api/phone-numbers/{}/assign", tenant.number.id);
    let rejected = send(
        &state,
        json_request("PUT", &uri, Some(tenant.admin.id), &json!({"userId": stranger_admin.id})),
    )
    .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &state,
        json_request("PUT", &uri, Some(tenant.admin.id), &json!({"userId": next.id})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["assignedUserId"], next.id);

    for rx in [&mut old_rx, &mut new_rx] {
        let event = next_frame(rx);
        assert_eq!(event["type"], "phone_assignment_changed");
        assert_eq!(event["previousAssigneeId"], tenant.member.id);
    }

    let visible = send(&state, get_request("/api/phone-numbers", next.id)).await;
    assert_eq!(body_json(visible).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_read_resets_unread() {
    let state = state(None, SignatureSecrets::default()).await;
    let tenant = telnyx_tenant(&state).await;
    send(
        &state,
        json_request("POST", "/webhooks/sms/inbound", None, &telnyx_inbound("tx-1", "hi")),
    )
    .await;
    let conv = conversation::list_for_tenant(state.db.pool(), tenant.admin.id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(conv.unread_count, 1);

    let response = send(
        &state,
        json_request(
            "POST",
            &format!("/api/conversations/{}/read", conv.id),
            Some(tenant.member.id),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["unreadCount"], 0);

    let response = send(
        &state,
        json_request(
            "PATCH",
            &format!("/api/conversations/{}", conv.id),
            Some(tenant.member.id),
            &json!({"isPinned": true, "contactName": "Dana"}),
        ),
    )
    .await;
    let updated = body_json(response).await;
    assert_eq!(updated["isPinned"], true);
    assert_eq!(updated["contactName"], "Dana");
}
