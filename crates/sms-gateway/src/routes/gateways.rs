//! Gateway management (admin only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::{gateway, Gateway, ProviderKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sms_provider::ConnectionTest;
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::routes::identity::CurrentUser;
use crate::state::AppState;
use crate::tenancy::TenancyPolicy;

/// Provider credentials submitted by an admin.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub provider: String,
    pub credentials: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateGatewayRequest {
    pub provider: String,
    pub name: String,
    pub credentials: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGatewayResponse {
    pub success: bool,
    pub detached_numbers: u64,
}

fn parse_kind(provider: &str) -> Result<ProviderKind> {
    provider
        .parse()
        .map_err(|e: database::UnknownProvider| GatewayError::BadRequest(e.to_string()))
}

/// List the tenant's gateways. Credentials are never serialized.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Gateway>>> {
    TenancyPolicy::require_admin(&user)?;
    Ok(Json(gateway::list_gateways(state.db.pool(), user.id).await?))
}

/// Probe credentials without saving them.
pub async fn test(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<ConnectionTest>> {
    TenancyPolicy::require_admin(&user)?;
    let kind = parse_kind(&request.provider)?;

    let outcome = match state.providers().build(kind, &request.credentials) {
        Ok(adapter) => adapter.test_connection().await,
        Err(e) => ConnectionTest::failed(e.to_string()),
    };
    Ok(Json(outcome))
}

/// Verify, encrypt and store a gateway. The tenant's first gateway is activated.
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateGatewayRequest>,
) -> Result<(StatusCode, Json<Gateway>)> {
    TenancyPolicy::require_admin(&user)?;
    let kind = parse_kind(&request.provider)?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(GatewayError::BadRequest("Gateway name is required".to_string()));
    }

    let adapter = state.providers().build(kind, &request.credentials)?;
    if !adapter.is_configured() {
        return Err(GatewayError::Configuration(format!(
            "{kind} credentials are incomplete"
        )));
    }
    let probe = adapter.test_connection().await;
    if !probe.success {
        return Err(GatewayError::Configuration(
            probe
                .error
                .unwrap_or_else(|| format!("Could not connect to {kind}")),
        ));
    }

    let sealed = state.providers().seal_credentials(&request.credentials)?;
    let activate = gateway::get_active_gateway(state.db.pool(), user.id)
        .await?
        .is_none();
    let created =
        gateway::create_gateway(state.db.pool(), user.id, kind.as_str(), name, &sealed, activate)
            .await?;

    info!(
        gateway_id = created.id,
        tenant_id = user.id,
        provider = %kind,
        active = created.is_active,
        "Gateway created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// Make a gateway the tenant's only active one.
pub async fn activate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Gateway>> {
    TenancyPolicy::require_admin(&user)?;
    let activated = gateway::activate_gateway(state.db.pool(), user.id, id).await?;
    info!(gateway_id = id, tenant_id = user.id, "Gateway activated");
    Ok(Json(activated))
}

/// Detach the gateway's numbers, then delete it.
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DeleteGatewayResponse>> {
    TenancyPolicy::require_admin(&user)?;
    let detached_numbers = gateway::delete_gateway(state.db.pool(), user.id, id).await?;
    info!(gateway_id = id, detached_numbers, "Gateway deleted");
    Ok(Json(DeleteGatewayResponse {
        success: true,
        detached_numbers,
    }))
}
