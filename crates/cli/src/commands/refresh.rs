//! One-shot refresh command.
//!
//! Builds the same services as the server and runs a single refresh pass,
//! useful from cron or after restoring a backup.

use nimbus_server::cache::CacheStore;
use nimbus_server::config::ServerConfig;
use nimbus_server::db;
use nimbus_server::jobs::RefreshOutcome;
use nimbus_server::state::AppState;

use super::CommandError;

/// Refresh every stored location once and log the summary.
pub async fn run() -> Result<(), CommandError> {
    let config = ServerConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let cache = CacheStore::from_config(&config.cache).await?;
    let state = AppState::new(config, pool, cache)?;

    match state.refresh_job().run_once().await? {
        RefreshOutcome::Completed(summary) => {
            for failure in &summary.failures {
                tracing::warn!(
                    location_id = %failure.location_id,
                    city = %failure.city,
                    reason = %failure.reason,
                    "Location not refreshed"
                );
            }
            tracing::info!(
                total = summary.total,
                refreshed = summary.refreshed,
                failed = summary.failures.len(),
                "Refresh complete"
            );
        }
        RefreshOutcome::Skipped => tracing::info!("Refresh already running, nothing to do"),
    }

    Ok(())
}
