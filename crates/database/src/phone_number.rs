//! Phone number operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewPhoneNumber, PhoneNumber};

const PHONE_COLUMNS: &str = "id, number, friendly_name, provider_sid, provider, gateway_id, \
    tenant_id, assigned_user_id, capabilities, is_active, purchased_at, monthly_rate";

/// Insert a number, or refresh the provider-side fields of an existing one.
///
/// The assignee of an existing row is preserved. A number already owned by a
/// different tenant is reported as [`DatabaseError::AlreadyExists`].
pub async fn upsert_phone_number(pool: &SqlitePool, number: &NewPhoneNumber) -> Result<PhoneNumber> {
    let capabilities = number.capabilities.join(",");

    sqlx::query_as::<_, PhoneNumber>(&format!(
        r#"
        INSERT INTO phone_numbers (
            number, friendly_name, provider_sid, provider, gateway_id,
            tenant_id, capabilities, purchased_at, monthly_rate
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(number) DO UPDATE SET
            friendly_name = COALESCE(excluded.friendly_name, phone_numbers.friendly_name),
            provider_sid = COALESCE(excluded.provider_sid, phone_numbers.provider_sid),
            provider = excluded.provider,
            gateway_id = excluded.gateway_id,
            capabilities = excluded.capabilities,
            purchased_at = COALESCE(phone_numbers.purchased_at, excluded.purchased_at),
            monthly_rate = COALESCE(excluded.monthly_rate, phone_numbers.monthly_rate),
            is_active = 1
        WHERE phone_numbers.tenant_id = excluded.tenant_id
        RETURNING {PHONE_COLUMNS}
        "#
    ))
    .bind(&number.number)
    .bind(&number.friendly_name)
    .bind(&number.provider_sid)
    .bind(&number.provider)
    .bind(number.gateway_id)
    .bind(number.tenant_id)
    .bind(&capabilities)
    .bind(&number.purchased_at)
    .bind(number.monthly_rate)
    .fetch_optional(pool)
    .await?
    // The conflict WHERE clause filtered the update out: another tenant owns it.
    .ok_or_else(|| DatabaseError::AlreadyExists {
        entity: "PhoneNumber",
        id: number.number.clone(),
    })
}

/// Get a phone number by ID.
pub async fn get_phone_number(pool: &SqlitePool, id: i64) -> Result<PhoneNumber> {
    sqlx::query_as::<_, PhoneNumber>(&format!(
        r#"
        SELECT {PHONE_COLUMNS}
        FROM phone_numbers
        WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("PhoneNumber", id))
}

/// Look up a phone number by its E.164 value.
pub async fn find_by_number(pool: &SqlitePool, number: &str) -> Result<Option<PhoneNumber>> {
    let phone = sqlx::query_as::<_, PhoneNumber>(&format!(
        r#"
        SELECT {PHONE_COLUMNS}
        FROM phone_numbers
        WHERE number = ?
        "#
    ))
    .bind(number)
    .fetch_optional(pool)
    .await?;

    Ok(phone)
}

/// All numbers owned by a tenant.
pub async fn list_for_tenant(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<PhoneNumber>> {
    let numbers = sqlx::query_as::<_, PhoneNumber>(&format!(
        r#"
        SELECT {PHONE_COLUMNS}
        FROM phone_numbers
        WHERE tenant_id = ?
        ORDER BY number
        "#
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(numbers)
}

/// Numbers assigned to a user.
pub async fn list_assigned_to(pool: &SqlitePool, user_id: i64) -> Result<Vec<PhoneNumber>> {
    let numbers = sqlx::query_as::<_, PhoneNumber>(&format!(
        r#"
        SELECT {PHONE_COLUMNS}
        FROM phone_numbers
        WHERE assigned_user_id = ?
        ORDER BY number
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(numbers)
}

/// Set or clear the assignee of a number.
///
/// Tenant membership of the assignee is checked by the caller.
pub async fn set_assignee(
    pool: &SqlitePool,
    phone_number_id: i64,
    assignee: Option<i64>,
) -> Result<PhoneNumber> {
    sqlx::query_as::<_, PhoneNumber>(&format!(
        r#"
        UPDATE phone_numbers
        SET assigned_user_id = ?
        WHERE id = ?
        RETURNING {PHONE_COLUMNS}
        "#
    ))
    .bind(assignee)
    .bind(phone_number_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("PhoneNumber", phone_number_id))
}
