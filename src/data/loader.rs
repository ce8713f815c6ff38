use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::entities::{DataSource, Snapshot};

use super::error::{DataError, DataResult, LoadError, LoadResult};
use super::table::RawTables;

/// Somewhere both tables can be fetched from in one go
pub trait TableSource: Send + Sync {
    fn source(&self) -> DataSource;

    fn fetch(&self) -> BoxFuture<'_, DataResult<RawTables>>;
}

struct CachedSnapshot {
    snapshot: Arc<Snapshot>,
    expires_at: Instant,
}

/// Loads the stop and student tables from the first source that works and
/// keeps the result for a fixed window. A source that takes longer than
/// `fetch_timeout` counts as failed.
///
/// Snapshots are replaced wholesale, callers inside the window all share the
/// same `Arc<Snapshot>`.
pub struct DataLoader {
    sources: Vec<Box<dyn TableSource>>,
    ttl: Duration,
    fetch_timeout: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
}

impl DataLoader {
    /// `sources` are tried in order
    pub fn new(sources: Vec<Box<dyn TableSource>>, ttl: Duration, fetch_timeout: Duration) -> Self {
        DataLoader {
            sources,
            ttl,
            fetch_timeout,
            cache: Mutex::new(None),
        }
    }

    pub async fn load_data(&self) -> LoadResult<Arc<Snapshot>> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.snapshot.clone());
            }
            log::info!("Cached data expired");
        }

        let snapshot = Arc::new(self.fetch_snapshot().await?);
        *cache = Some(self.cached(snapshot.clone()));
        Ok(snapshot)
    }

    /// Fetches now regardless of the cache. On failure the previous snapshot
    /// stays in place.
    pub async fn reload(&self) -> LoadResult<Arc<Snapshot>> {
        let mut cache = self.cache.lock().await;

        let snapshot = Arc::new(self.fetch_snapshot().await?);
        *cache = Some(self.cached(snapshot.clone()));
        Ok(snapshot)
    }

    fn cached(&self, snapshot: Arc<Snapshot>) -> CachedSnapshot {
        CachedSnapshot {
            snapshot,
            expires_at: Instant::now() + self.ttl,
        }
    }

    async fn fetch_snapshot(&self) -> LoadResult<Snapshot> {
        let mut failures = vec![];

        for source in &self.sources {
            let label = source.source();
            let result = tokio::time::timeout(self.fetch_timeout, source.fetch())
                .await
                .unwrap_or(Err(DataError::Timeout(self.fetch_timeout)))
                .and_then(|tables| tables.into_snapshot(label));

            match result {
                Ok(snapshot) => {
                    log::info!(
                        "Loaded {} stops and {} students from {}",
                        snapshot.stops.len(),
                        snapshot.students.len(),
                        label
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    log::warn!("Could not load from {}: {}", label, e);
                    failures.push(format!("{}: {}", label, e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no sources configured".to_string());
        }

        Err(LoadError(failures.join("; ")))
    }
}

#[cfg(test)]
mod test {

    use std::sync::atomic::Ordering;

    use crate::data::RawTable;
    use crate::test_utils::{table, FakeSource};

    use super::*;

    const TTL: Duration = Duration::from_secs(600);
    const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

    fn tables(stop_name: &str) -> RawTables {
        RawTables {
            stops: table(&["route", "stop_name", "lat", "lng"], &[&["1便", stop_name, "35.0", "139.0"]]),
            students: table(&["name", "route", "stop_name", "direction"], &[&["山田", "1便", stop_name, "登校"]]),
        }
    }

    #[tokio::test]
    async fn test_remote_first() {
        let remote = FakeSource::ok(DataSource::Spreadsheet, tables("remote"));
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let local_fetches = local.fetch_counter();
        let loader = DataLoader::new(vec![Box::new(remote), Box::new(local)], TTL, FETCH_TIMEOUT);

        let snapshot = loader.load_data().await.unwrap();

        assert_eq!(snapshot.source, DataSource::Spreadsheet);
        assert_eq!(snapshot.stops[0].stop_name, "remote");
        assert_eq!(local_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_local() {
        let remote = FakeSource::failing(DataSource::Spreadsheet);
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let loader = DataLoader::new(vec![Box::new(remote), Box::new(local)], TTL, FETCH_TIMEOUT);

        let snapshot = loader.load_data().await.unwrap();

        assert_eq!(snapshot.source, DataSource::LocalCsv);
        assert_eq!(snapshot.stops[0].stop_name, "local");
    }

    #[tokio::test]
    async fn test_malformed_remote_table_falls_back() {
        let broken = RawTables {
            stops: RawTable {
                headers: vec!["only_one_column".to_string()],
                rows: vec![vec!["x".to_string()]],
            },
            students: RawTable::default(),
        };
        let remote = FakeSource::ok(DataSource::Spreadsheet, broken);
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let loader = DataLoader::new(vec![Box::new(remote), Box::new(local)], TTL, FETCH_TIMEOUT);

        let snapshot = loader.load_data().await.unwrap();

        assert_eq!(snapshot.source, DataSource::LocalCsv);
    }

    #[tokio::test]
    async fn test_all_sources_fail() {
        let loader = DataLoader::new(
            vec![
                Box::new(FakeSource::failing(DataSource::Spreadsheet)),
                Box::new(FakeSource::failing(DataSource::LocalCsv)),
            ],
            TTL,
            FETCH_TIMEOUT,
        );

        let LoadError(message) = loader.load_data().await.unwrap_err();

        assert!(message.contains("spreadsheet"));
        assert!(message.contains("local csv"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_remote_falls_back() {
        let remote = FakeSource::stalled(DataSource::Spreadsheet);
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let loader = DataLoader::new(vec![Box::new(remote), Box::new(local)], TTL, FETCH_TIMEOUT);

        let snapshot = tokio::time::timeout(FETCH_TIMEOUT * 2, loader.load_data())
            .await
            .expect("loader should give up on the stalled source")
            .unwrap();

        assert_eq!(snapshot.source, DataSource::LocalCsv);
        assert_eq!(snapshot.stops[0].stop_name, "local");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_only_source_is_unavailable() {
        let loader = DataLoader::new(
            vec![Box::new(FakeSource::stalled(DataSource::Spreadsheet))],
            TTL,
            FETCH_TIMEOUT,
        );

        let LoadError(message) = loader.load_data().await.unwrap_err();

        assert!(message.contains("No answer within"));
    }

    #[tokio::test]
    async fn test_no_sources() {
        let loader = DataLoader::new(vec![], TTL, FETCH_TIMEOUT);

        assert!(loader.load_data().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_within_window() {
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let fetches = local.fetch_counter();
        let loader = DataLoader::new(vec![Box::new(local)], TTL, FETCH_TIMEOUT);

        let first = loader.load_data().await.unwrap();
        tokio::time::advance(Duration::from_secs(599)).await;
        let second = loader.load_data().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            serde_json::to_string(&*first).unwrap(),
            serde_json::to_string(&*second).unwrap()
        );
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_reloads() {
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let fetches = local.fetch_counter();
        let loader = DataLoader::new(vec![Box::new(local)], TTL, FETCH_TIMEOUT);

        let first = loader.load_data().await.unwrap();
        tokio::time::advance(Duration::from_secs(601)).await;
        let second = loader.load_data().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reload_fetches_inside_window() {
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let fetches = local.fetch_counter();
        let loader = DataLoader::new(vec![Box::new(local)], TTL, FETCH_TIMEOUT);

        let first = loader.load_data().await.unwrap();
        let reloaded = loader.reload().await.unwrap();
        let after = loader.load_data().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert!(Arc::ptr_eq(&reloaded, &after));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_snapshot() {
        let local = FakeSource::ok(DataSource::LocalCsv, tables("local"));
        let healthy = local.health();
        let loader = DataLoader::new(vec![Box::new(local)], TTL, FETCH_TIMEOUT);

        let first = loader.load_data().await.unwrap();
        healthy.store(false, Ordering::SeqCst);

        assert!(loader.reload().await.is_err());
        let after = loader.load_data().await.unwrap();
        assert!(Arc::ptr_eq(&first, &after));
    }
}
