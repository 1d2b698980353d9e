//! Manual `sqlx::FromRow<'_, sqlx::any::AnyRow>` implementations for the
//! circles-common model types.
//!
//! `sqlx::AnyPool` only decodes primitive types natively (i64, f64, bool,
//! String, bytes). Timestamps, enums, and JSON columns are stored as text and
//! parsed here, so the same schema works on Postgres and SQLite.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{any::AnyRow, Row};

use crate::models::{
    circle::Circle,
    frame::SharingFrame,
    link::{FederatedLink, LinkStatus},
    member::{Member, MemberLevel},
};

// ── Internal helpers ──────────────────────────────────────────────────────────

fn dt(row: &AnyRow, col: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let s: String = row.try_get(col)?;
    parse_dt(&s).map_err(sqlx::Error::Decode)
}

fn parse_dt(
    s: &str,
) -> Result<DateTime<Utc>, Box<dyn std::error::Error + Send + Sync + 'static>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Ok(d.with_timezone(&Utc));
    }
    if let Ok(d) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(d.and_utc());
    }
    if let Ok(d) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(d.and_utc());
    }
    Err(format!("cannot parse timestamp '{s}'").into())
}

fn json(row: &AnyRow, col: &str) -> Result<serde_json::Value, sqlx::Error> {
    let s: String = row.try_get(col)?;
    serde_json::from_str(&s).map_err(|e| sqlx::Error::Decode(Box::new(e) as _))
}

fn str_map(row: &AnyRow, col: &str) -> Result<BTreeMap<String, String>, sqlx::Error> {
    let s: String = row.try_get(col)?;
    if s.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&s).map_err(|e| sqlx::Error::Decode(Box::new(e) as _))
}

fn parse_enum<T>(
    row: &AnyRow,
    col: &str,
    f: impl Fn(&str) -> Option<T>,
) -> Result<T, sqlx::Error> {
    let s: String = row.try_get(col)?;
    f(&s).ok_or_else(|| sqlx::Error::Decode(format!("unknown enum variant: {s}").into()))
}

// ── Circle ────────────────────────────────────────────────────────────────────

/// Decodes the `circles` row only; members and viewer are attached by the repository.
impl<'r> sqlx::FromRow<'r, AnyRow> for Circle {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Circle {
            unique_id: row.try_get("unique_id")?,
            name: row.try_get("name")?,
            owner_id: row.try_get("owner_id")?,
            members: Vec::new(),
            viewer: None,
            created_at: dt(row, "created_at")?,
        })
    }
}

// ── Member ────────────────────────────────────────────────────────────────────

impl<'r> sqlx::FromRow<'r, AnyRow> for Member {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Member {
            circle_id: row.try_get("circle_id")?,
            user_id: row.try_get("user_id")?,
            display_name: row.try_get("display_name")?,
            level: parse_enum(row, "level", MemberLevel::parse)?,
            joined_at: dt(row, "joined_at")?,
        })
    }
}

// ── FederatedLink ─────────────────────────────────────────────────────────────

impl<'r> sqlx::FromRow<'r, AnyRow> for FederatedLink {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(FederatedLink {
            id: row.try_get("id")?,
            circle_id: row.try_get("circle_id")?,
            linkage_id: row.try_get("linkage_id")?,
            address: row.try_get("address")?,
            token: row.try_get("token")?,
            status: parse_enum(row, "status", LinkStatus::parse)?,
            created_at: dt(row, "created_at")?,
        })
    }
}

// ── SharingFrame ──────────────────────────────────────────────────────────────

impl<'r> sqlx::FromRow<'r, AnyRow> for SharingFrame {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        Ok(SharingFrame {
            unique_id: Some(row.try_get("unique_id")?),
            circle_id: Some(row.try_get("circle_id")?),
            source: row.try_get("source")?,
            frame_type: row.try_get("frame_type")?,
            author: row.try_get("author")?,
            cloud_id: row.try_get("cloud_id")?,
            headers: str_map(row, "headers")?,
            payload: json(row, "payload")?,
            created_at: Some(dt(row, "created_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_dt;

    #[test]
    fn parses_both_timestamp_dialects() {
        assert!(parse_dt("2024-01-15T10:30:00+00:00").is_ok());
        assert!(parse_dt("2024-01-15 10:30:00").is_ok());
        assert!(parse_dt("2024-01-15 10:30:00.123456").is_ok());
        assert!(parse_dt("yesterday").is_err());
    }
}
