//! In-memory complaint collection, refreshed from the data endpoint.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::complaint::{Complaint, ComplaintCollection};
use crate::error::DataFetchError;

/// The external complaint data endpoint, as seen by the store.
pub trait ComplaintSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<Complaint>, DataFetchError>> + Send;
}

/// Reads `{ "complaints": [...] }` from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ComplaintSource for JsonFileSource {
    async fn fetch(&self) -> Result<Vec<Complaint>, DataFetchError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| DataFetchError::Io {
                path: self.path.clone(),
                source,
            })?;
        let data: ComplaintCollection = serde_json::from_slice(&bytes)?;
        Ok(data.complaints)
    }
}

/// Complaint snapshot shared by every reader.
///
/// `load` swaps in a whole new snapshot under the write lock, so readers see
/// either the old collection or the new one.
#[derive(Debug)]
pub struct ComplaintStore {
    current: RwLock<Arc<[Complaint]>>,
}

impl Default for ComplaintStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplaintStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Vec::new().into()),
        }
    }

    pub async fn snapshot(&self) -> Arc<[Complaint]> {
        Arc::clone(&*self.current.read().await)
    }

    pub async fn len(&self) -> usize {
        self.current.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.current.read().await.is_empty()
    }

    /// Fetch from `source` and replace the collection.
    ///
    /// On failure the previous collection stays in place and the error is
    /// logged before being handed back.
    pub async fn load<S: ComplaintSource>(
        &self,
        source: &S,
    ) -> Result<Arc<[Complaint]>, DataFetchError> {
        match source.fetch().await {
            Ok(complaints) => {
                let next: Arc<[Complaint]> = complaints.into();
                *self.current.write().await = Arc::clone(&next);
                info!("Loaded {} complaints", next.len());
                Ok(next)
            }
            Err(e) => {
                error!("Failed to fetch complaints: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::sample;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakySource {
        fail: AtomicBool,
        data: Vec<Complaint>,
    }

    impl ComplaintSource for FlakySource {
        async fn fetch(&self) -> Result<Vec<Complaint>, DataFetchError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(DataFetchError::Endpoint("connection refused".to_string()))
            } else {
                Ok(self.data.clone())
            }
        }
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_collection() {
        let store = ComplaintStore::new();
        let source = FlakySource {
            fail: AtomicBool::new(false),
            data: vec![sample("Air Quality", 1.0, 1.0), sample("Other", 2.0, 2.0)],
        };

        let first = store.load(&source).await.unwrap();
        assert_eq!(first.len(), 2);

        source.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.load(&source).await,
            Err(DataFetchError::Endpoint(_))
        ));

        let after = store.snapshot().await;
        assert!(Arc::ptr_eq(&first, &after));
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot_across_loads() {
        let store = ComplaintStore::new();
        assert!(store.is_empty().await);

        let a = FlakySource {
            fail: AtomicBool::new(false),
            data: vec![sample("Air Quality", 1.0, 1.0)],
        };
        store.load(&a).await.unwrap();
        let held = store.snapshot().await;

        let b = FlakySource {
            fail: AtomicBool::new(false),
            data: vec![sample("Other", 2.0, 2.0), sample("Other", 3.0, 3.0)],
        };
        store.load(&b).await.unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn json_file_source_reports_missing_file_and_bad_json() {
        let dir =
            std::env::temp_dir().join(format!("complaint_map_store_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = JsonFileSource::new(dir.join("nope.json"));
        assert!(matches!(
            missing.fetch().await,
            Err(DataFetchError::Io { .. })
        ));

        let bad = dir.join("bad.json");
        std::fs::write(&bad, b"{ not json").unwrap();
        assert!(matches!(
            JsonFileSource::new(&bad).fetch().await,
            Err(DataFetchError::Parse(_))
        ));

        let good = dir.join("good.json");
        std::fs::write(
            &good,
            br#"{"complaints":[{"issue_type":"Illegal Dumping","date":"2024-01-15","coordinates":[37.43,-122.17]}]}"#,
        )
        .unwrap();
        let loaded = JsonFileSource::new(&good).fetch().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].source_links.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn legacy_records_without_iso_dates_still_load() {
        let dir = std::env::temp_dir().join(format!(
            "complaint_map_store_dates_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("complaints.json");
        std::fs::write(
            &path,
            br#"{"complaints":[
                {"issue_type":"Illegal Dumping","date":"2024-01-15","coordinates":[37.43,-122.17]},
                {"issue_type":"Air Quality","coordinates":[37.4301,-122.1701]},
                {"issue_type":"Air Pollution","date":"2024-02-03T08:15:00-08:00","coordinates":[37.44,-122.18]}
            ]}"#,
        )
        .unwrap();

        let store = ComplaintStore::new();
        let set = store.load(&JsonFileSource::new(&path)).await.unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(store.len().await, 3);
        assert!(set[1].date.date().is_none());
        assert_eq!(set[2].date.long_form(), "February 3, 2024");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
