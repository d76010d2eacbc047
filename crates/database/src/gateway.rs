//! Gateway operations.
//!
//! A tenant may own several gateways but at most one is active. The active
//! swap and the delete path each run in a single transaction.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Gateway;

const GATEWAY_COLUMNS: &str =
    "id, tenant_id, provider, name, credentials, is_active, created_at, updated_at";

/// Create a gateway. It starts inactive unless `activate` is set, in which
/// case the tenant's other gateways are deactivated in the same transaction.
pub async fn create_gateway(
    pool: &SqlitePool,
    tenant_id: i64,
    provider: &str,
    name: &str,
    credentials: &str,
    activate: bool,
) -> Result<Gateway> {
    let mut tx = pool.begin().await?;

    if activate {
        sqlx::query(
            r#"
            UPDATE gateways
            SET is_active = 0, updated_at = datetime('now')
            WHERE tenant_id = ? AND is_active = 1
            "#,
        )
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;
    }

    let gateway = sqlx::query_as::<_, Gateway>(&format!(
        r#"
        INSERT INTO gateways (tenant_id, provider, name, credentials, is_active)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {GATEWAY_COLUMNS}
        "#
    ))
    .bind(tenant_id)
    .bind(provider)
    .bind(name)
    .bind(credentials)
    .bind(activate)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(gateway)
}

/// Get a gateway by ID.
pub async fn get_gateway(pool: &SqlitePool, id: i64) -> Result<Gateway> {
    sqlx::query_as::<_, Gateway>(&format!(
        r#"
        SELECT {GATEWAY_COLUMNS}
        FROM gateways
        WHERE id = ?
        "#
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Gateway", id))
}

/// List a tenant's gateways, newest first.
pub async fn list_gateways(pool: &SqlitePool, tenant_id: i64) -> Result<Vec<Gateway>> {
    let gateways = sqlx::query_as::<_, Gateway>(&format!(
        r#"
        SELECT {GATEWAY_COLUMNS}
        FROM gateways
        WHERE tenant_id = ?
        ORDER BY id DESC
        "#
    ))
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(gateways)
}

/// The single active gateway for a tenant, if any.
pub async fn get_active_gateway(pool: &SqlitePool, tenant_id: i64) -> Result<Option<Gateway>> {
    let gateway = sqlx::query_as::<_, Gateway>(&format!(
        r#"
        SELECT {GATEWAY_COLUMNS}
        FROM gateways
        WHERE tenant_id = ? AND is_active = 1
        LIMIT 1
        "#
    ))
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    Ok(gateway)
}

/// Make `gateway_id` the tenant's only active gateway.
///
/// Deactivate-all and activate-one commit together, so readers never observe
/// zero or two active gateways. Concurrent activations serialize on the write
/// lock and the last one wins.
pub async fn activate_gateway(pool: &SqlitePool, tenant_id: i64, gateway_id: i64) -> Result<Gateway> {
    let mut tx = pool.begin().await?;

    // Write first so the transaction takes the write lock up front.
    sqlx::query(
        r#"
        UPDATE gateways
        SET is_active = 0, updated_at = datetime('now')
        WHERE tenant_id = ? AND is_active = 1
          AND EXISTS (SELECT 1 FROM gateways WHERE id = ? AND tenant_id = ?)
        "#,
    )
    .bind(tenant_id)
    .bind(gateway_id)
    .bind(tenant_id)
    .execute(&mut *tx)
    .await?;

    let gateway = sqlx::query_as::<_, Gateway>(&format!(
        r#"
        UPDATE gateways
        SET is_active = 1, updated_at = datetime('now')
        WHERE id = ? AND tenant_id = ?
        RETURNING {GATEWAY_COLUMNS}
        "#
    ))
    .bind(gateway_id)
    .bind(tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Gateway", gateway_id))?;

    tx.commit().await?;
    Ok(gateway)
}

/// Delete a gateway after detaching every phone number that references it.
///
/// Returns the number of phone numbers that were detached.
pub async fn delete_gateway(pool: &SqlitePool, tenant_id: i64, gateway_id: i64) -> Result<u64> {
    let mut tx = pool.begin().await?;

    let detached = sqlx::query(
        r#"
        UPDATE phone_numbers
        SET gateway_id = NULL
        WHERE gateway_id = ?
        "#,
    )
    .bind(gateway_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let result = sqlx::query(
        r#"
        DELETE FROM gateways
        WHERE id = ? AND tenant_id = ?
        "#,
    )
    .bind(gateway_id)
    .bind(tenant_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Gateway", gateway_id));
    }

    tx.commit().await?;
    Ok(detached)
}
