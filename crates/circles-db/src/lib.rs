//! # circles-db
//!
//! Storage layer for Circles. A single `sqlx::AnyPool` backs it, so the same
//! code runs against PostgreSQL in production and SQLite for lite deployments
//! and tests.
//!
//! - **Frame store**: sharing frames keyed by `(circle_id, unique_id)`
//! - **Link registry**: federated links per circle, resolved by token
//! - **Membership resolver**: circles, their members, and the viewer's level
//!
//! The contracts live in [`store`]; [`Database`] implements them over SQL and
//! [`memory::MemoryStore`] implements them in-process.

pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

use anyhow::Result;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

pub use error::DbError;
pub use memory::MemoryStore;
pub use store::{FrameStore, LinkRegistry, MembershipResolver};

/// Shared database state passed through Axum extractors.
#[derive(Clone, Debug)]
pub struct Database {
    pub pool: AnyPool,
}

impl Database {
    /// Connect to the database at `url` (`postgres://…` or `sqlite://…`).
    pub async fn connect(config: &circles_common::config::DatabaseConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        tracing::info!("Connecting to database...");
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;
        tracing::info!("Connected to database");

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Health check: verify the database is reachable.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Test support: a migrated single-connection in-memory SQLite database.
#[doc(hidden)]
pub async fn sqlite_memory() -> Result<Database> {
    let db = Database::connect(&circles_common::config::DatabaseConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        min_connections: 1,
    })
    .await?;
    db.migrate().await?;
    Ok(db)
}
