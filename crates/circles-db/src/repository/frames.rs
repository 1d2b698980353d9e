//! Sharing frame repository.
//!
//! `(circle_id, unique_id)` is the primary key. Inserts never overwrite and the
//! cloud id can only be written while it is still NULL.

use chrono::Utc;
use circles_common::models::frame::SharingFrame;
use sqlx::AnyPool;

/// Insert a frame unless `(circle_id, unique_id)` is already stored.
///
/// Returns `false` when the row already existed. The check and the insert are a
/// single statement, so two racing inserts of the same frame cannot both win.
pub async fn insert_frame(
    pool: &AnyPool,
    circle_id: &str,
    unique_id: &str,
    frame: &SharingFrame,
) -> Result<bool, sqlx::Error> {
    let headers = serde_json::to_string(&frame.headers)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let payload = serde_json::to_string(&frame.payload)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let created_at = frame.created_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(
        r#"
        INSERT INTO sharing_frames
            (circle_id, unique_id, source, frame_type, author, cloud_id, headers, payload, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (circle_id, unique_id) DO NOTHING
        "#,
    )
    .bind(circle_id)
    .bind(unique_id)
    .bind(&frame.source)
    .bind(&frame.frame_type)
    .bind(frame.author.clone())
    .bind(frame.cloud_id.clone())
    .bind(headers)
    .bind(payload)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Find a frame by circle and unique id.
pub async fn find_frame(
    pool: &AnyPool,
    circle_id: &str,
    unique_id: &str,
) -> Result<Option<SharingFrame>, sqlx::Error> {
    sqlx::query_as::<_, SharingFrame>(
        r#"
        SELECT circle_id, unique_id, source, frame_type, author, cloud_id, headers, payload, created_at
        FROM sharing_frames
        WHERE circle_id = $1 AND unique_id = $2
        "#,
    )
    .bind(circle_id)
    .bind(unique_id)
    .fetch_optional(pool)
    .await
}

/// Set the cloud id of a frame that has none yet. Returns `false` if nothing changed.
pub async fn set_cloud_id(
    pool: &AnyPool,
    circle_id: &str,
    unique_id: &str,
    cloud_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE sharing_frames SET cloud_id = $1
        WHERE circle_id = $2 AND unique_id = $3 AND cloud_id IS NULL
        "#,
    )
    .bind(cloud_id)
    .bind(circle_id)
    .bind(unique_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Count stored copies of a frame across all circles on this node.
pub async fn count_copies(pool: &AnyPool, unique_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sharing_frames WHERE unique_id = $1")
            .bind(unique_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
