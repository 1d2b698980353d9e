//! Federated link repository.
//!
//! Links are established by an external handshake; this module only stores
//! and looks them up.

use chrono::Utc;
use circles_common::models::link::{FederatedLink, LinkStatus};
use sqlx::AnyPool;
use uuid::Uuid;

const LINK_COLUMNS: &str = "id, circle_id, linkage_id, address, token, status, created_at";

/// Record a link from `circle_id` to the remote circle `linkage_id` at `address`.
///
/// Fails with a unique violation if the circle already links to `address`.
pub async fn create_link(
    pool: &AnyPool,
    circle_id: &str,
    linkage_id: &str,
    address: &str,
    token: &str,
    status: LinkStatus,
) -> Result<FederatedLink, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO federated_links (id, circle_id, linkage_id, address, token, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&id)
    .bind(circle_id)
    .bind(linkage_id)
    .bind(address)
    .bind(token)
    .bind(status.as_str())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(FederatedLink {
        id,
        circle_id: circle_id.to_owned(),
        linkage_id: linkage_id.to_owned(),
        address: address.to_owned(),
        token: token.to_owned(),
        status,
        created_at: now,
    })
}

/// List a circle's links in the given status.
pub async fn list_for_circle(
    pool: &AnyPool,
    circle_id: &str,
    status: LinkStatus,
) -> Result<Vec<FederatedLink>, sqlx::Error> {
    sqlx::query_as::<_, FederatedLink>(&format!(
        "SELECT {LINK_COLUMNS} FROM federated_links WHERE circle_id = $1 AND status = $2"
    ))
    .bind(circle_id)
    .bind(status.as_str())
    .fetch_all(pool)
    .await
}

/// Find the link identified by an inbound token and linkage id.
pub async fn find_by_token(
    pool: &AnyPool,
    token: &str,
    linkage_id: &str,
) -> Result<Option<FederatedLink>, sqlx::Error> {
    sqlx::query_as::<_, FederatedLink>(&format!(
        "SELECT {LINK_COLUMNS} FROM federated_links WHERE token = $1 AND linkage_id = $2"
    ))
    .bind(token)
    .bind(linkage_id)
    .fetch_optional(pool)
    .await
}

/// Update a link's status.
pub async fn update_status(pool: &AnyPool, id: &str, status: LinkStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE federated_links SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
