//! Circle repository: circle records.

use chrono::Utc;
use circles_common::models::circle::Circle;
use sqlx::AnyPool;

/// Create a new circle. Members (including the owner) are added separately.
pub async fn create_circle(
    pool: &AnyPool,
    unique_id: &str,
    name: &str,
    owner_id: &str,
) -> Result<Circle, sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO circles (unique_id, name, owner_id, created_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(unique_id)
    .bind(name)
    .bind(owner_id)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Circle {
        unique_id: unique_id.to_owned(),
        name: name.to_owned(),
        owner_id: owner_id.to_owned(),
        members: Vec::new(),
        viewer: None,
        created_at: now,
    })
}

/// Find a circle record by unique id (without members).
pub async fn find_by_id(pool: &AnyPool, unique_id: &str) -> Result<Option<Circle>, sqlx::Error> {
    sqlx::query_as::<_, Circle>(
        "SELECT unique_id, name, owner_id, created_at FROM circles WHERE unique_id = $1",
    )
    .bind(unique_id)
    .fetch_optional(pool)
    .await
}
