//! Database migration command.
//!
//! # Environment Variables
//!
//! - `NIMBUS_DATABASE_URL` or `DATABASE_URL` - `PostgreSQL` connection string
//! - otherwise `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`, `DB_NAME`
//!
//! # Migration Files
//!
//! `crates/server/migrations/`:
//! ```text
//! migrations/
//! ├── 20240501000001_create_users.sql
//! └── 20240501000002_create_locations.sql
//! ```

use nimbus_server::{config, db};

use super::CommandError;

/// Apply all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let database_url = config::database_url_from_env();

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
