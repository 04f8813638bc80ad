//! Periodic refresh of every stored location's weather.
//!
//! Each run lists all locations once, then for each one, in order: fetches
//! current weather straight from the provider (skipping the cache read),
//! stores it on the location and replaces the `weather:<city>` cache entry.
//! A failing location is recorded and the run moves on.
//!
//! Runs never overlap: a run that starts while another is in progress
//! returns [`RefreshOutcome::Skipped`] without touching anything. Single
//! instance only; there is no cross-process lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use nimbus_core::{CacheKey, CityName, LocationId, WeatherKind};

use crate::cache::CacheStore;
use crate::models::Location;
use crate::services::{FavoritesError, FavoritesService};
use crate::weather::{UpstreamError, WeatherProvider};

/// Why a single location could not be refreshed.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The provider fetch failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The fresh payload could not be stored on the location.
    #[error(transparent)]
    Store(#[from] FavoritesError),
}

/// One location that could not be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub location_id: LocationId,
    pub city: CityName,
    /// Rendered [`RefreshError`].
    pub reason: String,
}

/// Result of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Locations listed at the start of the run.
    pub total: usize,
    /// Locations fetched, stored and re-cached.
    pub refreshed: usize,
    pub failures: Vec<RefreshFailure>,
}

/// What a call to [`RefreshJob::run_once`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(RunSummary),
    /// Another run was in progress.
    Skipped,
}

/// Clears the running flag when dropped, including on panic.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The refresh job. Share it behind an `Arc`.
pub struct RefreshJob {
    favorites: FavoritesService,
    provider: Arc<dyn WeatherProvider>,
    cache: CacheStore,
    running: AtomicBool,
}

impl RefreshJob {
    #[must_use]
    pub fn new(
        favorites: FavoritesService,
        provider: Arc<dyn WeatherProvider>,
        cache: CacheStore,
    ) -> Self {
        Self {
            favorites,
            provider,
            cache,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Perform one run, unless one is already in progress.
    ///
    /// # Errors
    ///
    /// Returns `FavoritesError` if the locations cannot be listed; nothing is
    /// refreshed in that case. Per-location failures do not error, they are
    /// reported in the summary.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RefreshOutcome, FavoritesError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("Refresh already running, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        tracing::info!("Starting location weather refresh");
        let locations = self.favorites.list_all().await?;

        let mut summary = RunSummary {
            total: locations.len(),
            ..RunSummary::default()
        };

        for location in locations {
            match self.refresh_location(&location).await {
                Ok(()) => summary.refreshed += 1,
                Err(e) => {
                    tracing::error!(
                        location_id = %location.id,
                        city = %location.city,
                        error = %e,
                        "Failed to refresh location"
                    );
                    summary.failures.push(RefreshFailure {
                        location_id: location.id,
                        city: location.city,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            total = summary.total,
            refreshed = summary.refreshed,
            failed = summary.failures.len(),
            "Location weather refresh finished"
        );
        Ok(RefreshOutcome::Completed(summary))
    }

    async fn refresh_location(&self, location: &Location) -> Result<(), RefreshError> {
        let payload = self
            .provider
            .fetch(WeatherKind::Current, &location.city)
            .await?;

        self.favorites.update_weather(location.id, &payload).await?;

        let key = CacheKey::new(WeatherKind::Current, &location.city);
        self.cache.delete(&key).await;
        self.cache.set(&key, &payload, None).await;

        tracing::debug!(location_id = %location.id, "Location refreshed");
        Ok(())
    }
}

/// Run `job` every `period` until `shutdown` is cancelled.
///
/// The first run fires one full period after the call. Each run is spawned so
/// the timer keeps its cadence; a tick that lands while a run is still going
/// is skipped by the job itself.
pub fn spawn_scheduler(
    job: Arc<RefreshJob>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(period_secs = period.as_secs(), "Refresh scheduler started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Refresh scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let job = Arc::clone(&job);
                    tokio::spawn(async move {
                        if let Err(e) = job.run_once().await {
                            tracing::error!(error = %e, "Refresh run aborted");
                        }
                    });
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::cache::{CacheBackend, CacheError, MemoryBackend};
    use crate::db::LocationRepository;
    use crate::db::UserRepository;
    use crate::db::memory::{MemoryLocationRepository, MemoryUserRepository};
    use nimbus_core::{UserId, Username, WeatherPayload};

    /// Fails for one city, answers `{"name": city}` for the rest.
    struct FlakyProvider {
        failing_city: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for FlakyProvider {
        async fn fetch(
            &self,
            _kind: WeatherKind,
            city: &CityName,
        ) -> Result<WeatherPayload, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if city.as_str() == self.failing_city {
                return Err(UpstreamError::Status(StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(WeatherPayload::new(json!({ "name": city.as_str() })))
        }
    }

    /// Parks inside `fetch` until released.
    struct BlockingProvider {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl WeatherProvider for BlockingProvider {
        async fn fetch(
            &self,
            _kind: WeatherKind,
            _city: &CityName,
        ) -> Result<WeatherPayload, UpstreamError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(WeatherPayload::new(json!({})))
        }
    }

    /// Memory backend whose writes always fail. Reads and deletes work.
    struct ReadOnlyBackend(MemoryBackend);

    #[async_trait]
    impl CacheBackend for ReadOnlyBackend {
        async fn get(&self, key: &str) -> Result<Option<WeatherPayload>, CacheError> {
            self.0.get(key).await
        }

        async fn set(
            &self,
            _key: &str,
            _value: &WeatherPayload,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(serde_json::from_str::<serde_json::Value>("{").unwrap_err().into())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.0.delete(key).await
        }
    }

    /// Records the TTL of every write.
    #[derive(Default)]
    struct TtlRecorder {
        ttls: std::sync::Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl CacheBackend for TtlRecorder {
        async fn get(&self, _key: &str) -> Result<Option<WeatherPayload>, CacheError> {
            Ok(None)
        }

        async fn set(
            &self,
            _key: &str,
            _value: &WeatherPayload,
            ttl: Duration,
        ) -> Result<(), CacheError> {
            self.ttls.lock().unwrap().push(ttl);
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Ok(())
        }
    }

    struct Fixture {
        favorites: FavoritesService,
        locations: Arc<MemoryLocationRepository>,
        cache: CacheStore,
        owner: UserId,
    }

    async fn fixture(cities: &[&str]) -> Fixture {
        let users = Arc::new(MemoryUserRepository::new());
        let owner = users
            .create(&Username::parse("alice").unwrap(), "hash")
            .await
            .unwrap()
            .id;
        let locations = Arc::new(MemoryLocationRepository::new());
        for city in cities {
            locations
                .insert(owner, &CityName::parse(city).unwrap())
                .await
                .unwrap();
        }
        let cache = CacheStore::new(Arc::new(MemoryBackend::new(100)), Duration::from_secs(300));
        let favorites =
            FavoritesService::new(users, Arc::clone(&locations) as Arc<dyn LocationRepository>);
        Fixture {
            favorites,
            locations,
            cache,
            owner,
        }
    }

    #[tokio::test]
    async fn test_failing_location_does_not_stop_the_run() {
        let f = fixture(&["Paris", "Berlin", "Madrid"]).await;
        let provider = Arc::new(FlakyProvider {
            failing_city: "Berlin",
            calls: AtomicUsize::new(0),
        });
        let job = RefreshJob::new(f.favorites.clone(), provider.clone(), f.cache.clone());

        let RefreshOutcome::Completed(summary) = job.run_once().await.unwrap() else {
            panic!("run was skipped");
        };

        assert_eq!(summary.total, 3);
        assert_eq!(summary.refreshed, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].city.as_str(), "Berlin");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        let stored = f.favorites.list_by_owner(f.owner).await.unwrap();
        assert!(stored[0].weather.is_some());
        assert!(stored[1].weather.is_none());
        assert_eq!(
            stored[2].weather.as_ref().unwrap().as_json(),
            &json!({"name": "Madrid"})
        );
        assert!(!job.is_running());
    }

    #[tokio::test]
    async fn test_cache_entry_uses_lowercased_city() {
        let f = fixture(&["MADRID"]).await;
        let provider = Arc::new(FlakyProvider {
            failing_city: "",
            calls: AtomicUsize::new(0),
        });
        let job = RefreshJob::new(f.favorites.clone(), provider, f.cache.clone());

        job.run_once().await.unwrap();

        let key = CacheKey::new(WeatherKind::Current, &CityName::parse("madrid").unwrap());
        assert_eq!(key.as_str(), "weather:madrid");
        assert_eq!(
            f.cache.get(&key).await.unwrap().as_json(),
            &json!({"name": "MADRID"})
        );
    }

    #[tokio::test]
    async fn test_failed_cache_write_leaves_no_stale_entry() {
        let f = fixture(&["Paris"]).await;
        let backend = Arc::new(ReadOnlyBackend(MemoryBackend::new(100)));
        let key = CacheKey::new(WeatherKind::Current, &CityName::parse("Paris").unwrap());
        backend
            .0
            .set(
                key.as_str(),
                &WeatherPayload::new(json!({"name": "stale"})),
                Duration::from_secs(300),
            )
            .await
            .unwrap();
        let cache = CacheStore::new(backend, Duration::from_secs(300));
        assert!(cache.get(&key).await.is_some());

        let provider = Arc::new(FlakyProvider {
            failing_city: "",
            calls: AtomicUsize::new(0),
        });
        let job = RefreshJob::new(f.favorites.clone(), provider, cache.clone());

        let RefreshOutcome::Completed(summary) = job.run_once().await.unwrap() else {
            panic!("run was skipped");
        };

        // Cache write failures don't fail the location
        assert_eq!(summary.refreshed, 1);
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_writes_with_default_ttl() {
        let f = fixture(&["Paris", "Berlin"]).await;
        let backend = Arc::new(TtlRecorder::default());
        let cache = CacheStore::new(
            Arc::clone(&backend) as Arc<dyn CacheBackend>,
            Duration::from_secs(42),
        );
        let provider = Arc::new(FlakyProvider {
            failing_city: "",
            calls: AtomicUsize::new(0),
        });
        let job = RefreshJob::new(f.favorites.clone(), provider, cache.clone());

        job.run_once().await.unwrap();

        let ttls = backend.ttls.lock().unwrap().clone();
        assert_eq!(ttls, vec![cache.default_ttl(); 2]);
    }

    #[tokio::test]
    async fn test_failure_reason_is_the_upstream_error() {
        let f = fixture(&["Berlin"]).await;
        let provider = Arc::new(FlakyProvider {
            failing_city: "Berlin",
            calls: AtomicUsize::new(0),
        });
        let job = RefreshJob::new(f.favorites.clone(), provider, f.cache.clone());

        let RefreshOutcome::Completed(summary) = job.run_once().await.unwrap() else {
            panic!("run was skipped");
        };

        let err = RefreshError::from(UpstreamError::Status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(matches!(err, RefreshError::Upstream(_)));
        assert_eq!(summary.failures[0].reason, err.to_string());
        assert_eq!(
            summary.failures[0].reason,
            "upstream returned status 500 Internal Server Error"
        );
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let f = fixture(&["Paris"]).await;
        let provider = Arc::new(BlockingProvider {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let job = Arc::new(RefreshJob::new(
            f.favorites.clone(),
            provider.clone(),
            f.cache.clone(),
        ));

        let first = tokio::spawn({
            let job = Arc::clone(&job);
            async move { job.run_once().await }
        });
        provider.entered.notified().await;
        assert!(job.is_running());

        assert_eq!(job.run_once().await.unwrap(), RefreshOutcome::Skipped);

        provider.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, RefreshOutcome::Completed(s) if s.refreshed == 1));
        assert!(!job.is_running());
        assert!(!f.locations.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_store_completes_with_zero() {
        let f = fixture(&[]).await;
        let provider = Arc::new(FlakyProvider {
            failing_city: "",
            calls: AtomicUsize::new(0),
        });
        let job = RefreshJob::new(f.favorites, provider, f.cache);

        assert_eq!(
            job.run_once().await.unwrap(),
            RefreshOutcome::Completed(RunSummary::default())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_waits_one_period_and_stops_on_cancel() {
        let f = fixture(&["Paris"]).await;
        let provider = Arc::new(FlakyProvider {
            failing_city: "",
            calls: AtomicUsize::new(0),
        });
        let job = Arc::new(RefreshJob::new(f.favorites, provider.clone(), f.cache));
        let shutdown = CancellationToken::new();

        let handle = spawn_scheduler(job, Duration::from_secs(60), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        for _ in 0..100 {
            if provider.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
