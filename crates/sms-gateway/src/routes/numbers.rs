//! Phone number routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use database::{phone_number, DatabaseError, NewPhoneNumber, PhoneNumber};
use fanout::{ServerEvent, Target};
use serde::{Deserialize, Serialize};
use sms_provider::{AvailableNumber, Capability, NumberSearch};
use sms_webhook::format_to_e164;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::routes::identity::CurrentUser;
use crate::state::AppState;
use crate::tenancy::TenancyPolicy;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// `None` unassigns.
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub synced: usize,
    pub skipped: usize,
    pub numbers: Vec<PhoneNumber>,
}

fn capability_names(capabilities: &[Capability]) -> Vec<String> {
    capabilities.iter().map(|c| c.as_str().to_string()).collect()
}

/// Numbers visible to the caller.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PhoneNumber>>> {
    Ok(Json(state.tenancy.visible_numbers(&user).await?))
}

/// Search purchasable numbers through the tenant's active gateway.
pub async fn available(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(search): Query<NumberSearch>,
) -> Result<Json<Vec<AvailableNumber>>> {
    let context = state.tenancy.resolve_provider_context(user.id).await?;
    let numbers = context.adapter.search_available_numbers(&search).await?;
    Ok(Json(numbers))
}

/// Buy a number and record it for the tenant.
pub async fn purchase(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PhoneNumber>> {
    TenancyPolicy::require_admin(&user)?;
    let context = state.tenancy.resolve_provider_context(user.id).await?;
    let gateway = context.require_gateway()?;

    let wanted = format_to_e164(&request.phone_number);
    let purchased = context.adapter.purchase_number(&wanted).await?;

    let number = phone_number::upsert_phone_number(
        state.db.pool(),
        &NewPhoneNumber {
            number: format_to_e164(&purchased.phone_number),
            friendly_name: purchased.friendly_name.clone(),
            provider_sid: Some(purchased.provider_sid.clone()),
            provider: gateway.provider.clone(),
            gateway_id: Some(gateway.id),
            tenant_id: context.tenant_id,
            capabilities: capability_names(&purchased.capabilities),
            purchased_at: None,
            monthly_rate: None,
        },
    )
    .await?;

    info!(
        phone_number_id = number.id,
        gateway_id = gateway.id,
        number = %number.number,
        "Number purchased"
    );
    Ok(Json(number))
}

/// Import every number the active gateway's account owns.
pub async fn sync(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SyncResponse>> {
    TenancyPolicy::require_admin(&user)?;
    let context = state.tenancy.resolve_provider_context(user.id).await?;
    let gateway = context.require_gateway()?;

    let owned = context.adapter.list_owned_numbers().await?;
    let mut numbers = Vec::with_capacity(owned.len());
    let mut skipped = 0;

    for owned_number in owned {
        let record = NewPhoneNumber {
            number: format_to_e164(&owned_number.phone_number),
            friendly_name: owned_number.friendly_name,
            provider_sid: Some(owned_number.provider_sid),
            provider: gateway.provider.clone(),
            gateway_id: Some(gateway.id),
            tenant_id: context.tenant_id,
            capabilities: capability_names(&owned_number.capabilities),
            purchased_at: owned_number.purchased_at,
            monthly_rate: None,
        };
        match phone_number::upsert_phone_number(state.db.pool(), &record).await {
            Ok(number) => numbers.push(number),
            Err(DatabaseError::AlreadyExists { .. }) => {
                warn!(number = %record.number, "Number belongs to another tenant, skipping");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(gateway_id = gateway.id, synced = numbers.len(), skipped, "Numbers synced");
    Ok(Json(SyncResponse {
        synced: numbers.len(),
        skipped,
        numbers,
    }))
}

/// Assign or unassign a number. The assignee must be on the same team.
pub async fn assign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<PhoneNumber>> {
    TenancyPolicy::require_admin(&user)?;
    let number = state.tenancy.authorize_number(&user, id).await?;
    if let Some(assignee) = request.user_id {
        state.tenancy.check_assignee(user.id, assignee).await?;
    }

    let previous_assignee_id = number.assigned_user_id;
    let updated = phone_number::set_assignee(state.db.pool(), number.id, request.user_id).await?;

    let mut targets = vec![Target::User(updated.tenant_id)];
    targets.extend(request.user_id.map(Target::User));
    targets.extend(previous_assignee_id.map(Target::User));
    state.hub.publish(
        &targets,
        &ServerEvent::PhoneAssignmentChanged {
            phone_number: updated.clone(),
            previous_assignee_id,
        },
    );

    info!(
        phone_number_id = updated.id,
        assignee = ?request.user_id,
        previous = ?previous_assignee_id,
        "Number assignment changed"
    );
    Ok(Json(updated))
}
