//! Member repository: circle membership management.

use chrono::Utc;
use circles_common::models::member::{Member, MemberLevel};
use sqlx::AnyPool;

/// Add a user to a circle at the given level.
pub async fn add_member(
    pool: &AnyPool,
    circle_id: &str,
    user_id: &str,
    display_name: &str,
    level: MemberLevel,
) -> Result<Member, sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO circle_members (circle_id, user_id, display_name, level, joined_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(circle_id)
    .bind(user_id)
    .bind(display_name)
    .bind(level.as_str())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(Member {
        circle_id: circle_id.to_owned(),
        user_id: user_id.to_owned(),
        display_name: display_name.to_owned(),
        level,
        joined_at: now,
    })
}

/// List every member of a circle.
pub async fn list_members(pool: &AnyPool, circle_id: &str) -> Result<Vec<Member>, sqlx::Error> {
    sqlx::query_as::<_, Member>(
        r#"
        SELECT circle_id, user_id, display_name, level, joined_at
        FROM circle_members
        WHERE circle_id = $1
        ORDER BY joined_at, user_id
        "#,
    )
    .bind(circle_id)
    .fetch_all(pool)
    .await
}
