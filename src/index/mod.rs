//! Content-based similarity index
//!
//! Turns each catalog entry's combined-features text into a term-count vector,
//! precomputes the full cosine similarity matrix, and answers nearest-neighbor
//! queries against an immutable snapshot. Rebuilds construct a fresh snapshot off
//! the async runtime and publish it with a single pointer swap, so queries never
//! observe a half-built matrix.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{Mutex, RwLock};

use crate::models::CatalogEntry;

pub mod matrix;
pub mod snapshot;
pub mod tokenizer;

pub use snapshot::Snapshot;

/// Errors that cross the index boundary
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    /// The query title is not in the catalog
    #[error("Movie not found: {0}")]
    NotFound(String),

    /// The catalog could not be loaded or was empty
    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

enum IndexState {
    /// Nothing has been built yet
    Uninitialized,
    Ready(Arc<Snapshot>),
    /// The first build failed; stays until an explicit rebuild succeeds
    Unavailable(String),
}

/// State shared between the index handle and its build tasks
struct IndexShared {
    state: RwLock<IndexState>,
    build_gate: Mutex<()>,
    /// Bumped after every completed build attempt, successful or not
    generation: AtomicU64,
}

/// Process-wide holder of the current similarity snapshot
pub struct SimilarityIndex {
    shared: Arc<IndexShared>,
}

impl Default for SimilarityIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(IndexShared {
                state: RwLock::new(IndexState::Uninitialized),
                build_gate: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Number of completed build attempts
    pub fn generation(&self) -> u64 {
        self.shared.generation()
    }

    /// The published snapshot.
    ///
    /// `Ok(None)` when nothing has been built yet, `Err(Unavailable)` when the last
    /// build left no usable snapshot.
    pub async fn snapshot(&self) -> Result<Option<Arc<Snapshot>>, IndexError> {
        self.shared.snapshot().await
    }

    /// Top `k` entries similar to `title` in the current snapshot
    pub async fn top_k(&self, title: &str, k: usize) -> Result<Vec<CatalogEntry>, IndexError> {
        let snapshot = self.snapshot().await?.ok_or_else(not_built)?;

        Ok(snapshot
            .top_k(title, k)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Loads a catalog and publishes a freshly built snapshot.
    ///
    /// Rebuilds are serialized. A caller that waited on the build gate while
    /// another rebuild finished receives that result instead of building again.
    pub async fn rebuild<F>(&self, load: F) -> Result<Arc<Snapshot>, IndexError>
    where
        F: FnOnce() -> Result<Vec<CatalogEntry>, IndexError> + Send + 'static,
    {
        let observed = self.generation();
        self.rebuild_since(observed, load).await
    }

    /// Rebuilds unless a build has completed since generation `observed`.
    ///
    /// The build runs in its own task and always runs to completion, so a caller
    /// that is dropped mid-build (a disconnected client) does not throw the work
    /// away and callers queued behind it still join the published result.
    pub async fn rebuild_since<F>(&self, observed: u64, load: F) -> Result<Arc<Snapshot>, IndexError>
    where
        F: FnOnce() -> Result<Vec<CatalogEntry>, IndexError> + Send + 'static,
    {
        let shared = self.shared.clone();
        tokio::spawn(async move { shared.rebuild_since(observed, load).await })
            .await
            .map_err(|e| IndexError::Unavailable(format!("index build task failed: {}", e)))?
    }
}

impl IndexShared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn snapshot(&self) -> Result<Option<Arc<Snapshot>>, IndexError> {
        match &*self.state.read().await {
            IndexState::Uninitialized => Ok(None),
            IndexState::Ready(snapshot) => Ok(Some(snapshot.clone())),
            IndexState::Unavailable(reason) => Err(IndexError::Unavailable(reason.clone())),
        }
    }

    async fn rebuild_since<F>(&self, observed: u64, load: F) -> Result<Arc<Snapshot>, IndexError>
    where
        F: FnOnce() -> Result<Vec<CatalogEntry>, IndexError> + Send + 'static,
    {
        let _gate = self.build_gate.lock().await;

        if self.generation() != observed {
            tracing::debug!(observed, current = self.generation(), "Joining completed rebuild");
            return self.snapshot().await?.ok_or_else(not_built);
        }

        let next_generation = observed + 1;
        let started = std::time::Instant::now();
        let built = tokio::task::spawn_blocking(move || Snapshot::build(load()?, next_generation))
            .await
            .map_err(|e| IndexError::Unavailable(format!("index build task failed: {}", e)))
            .and_then(|result| result);

        let result = self.publish(built).await;
        self.generation.store(next_generation, Ordering::SeqCst);

        match &result {
            Ok(snapshot) => tracing::info!(
                movies = snapshot.len(),
                vocabulary = snapshot.vocabulary_size(),
                generation = snapshot.generation(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Similarity matrix built"
            ),
            Err(e) => tracing::error!(error = %e, "Similarity matrix build failed"),
        }

        result
    }

    async fn publish(
        &self,
        built: Result<Snapshot, IndexError>,
    ) -> Result<Arc<Snapshot>, IndexError> {
        let mut state = self.state.write().await;
        match built {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *state = IndexState::Ready(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                // A previously published snapshot keeps serving
                if !matches!(*state, IndexState::Ready(_)) {
                    let reason = match &e {
                        IndexError::Unavailable(reason) | IndexError::NotFound(reason) => {
                            reason.clone()
                        }
                    };
                    *state = IndexState::Unavailable(reason);
                }
                Err(e)
            }
        }
    }
}

fn not_built() -> IndexError {
    IndexError::Unavailable("similarity index has not been built".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::atomic::AtomicUsize, time::Duration};

    fn nolan_catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new("Inception", "sci fi nolan dicaprio"),
            CatalogEntry::new("The Dark Knight", "batman nolan action"),
            CatalogEntry::new("Tenet", "sci fi nolan time"),
        ]
    }

    #[tokio::test]
    async fn test_unbuilt_index_is_unavailable() {
        let index = SimilarityIndex::new();
        assert!(index.snapshot().await.unwrap().is_none());
        let err = index.top_k("Inception", 10).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_rebuild_then_query() {
        let index = SimilarityIndex::new();
        let snapshot = index.rebuild(|| Ok(nolan_catalog())).await.unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(index.generation(), 1);

        let result = index.top_k("Inception", 2).await.unwrap();
        let titles: Vec<&str> = result.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Tenet", "The Dark Knight"]);
    }

    #[tokio::test]
    async fn test_empty_catalog_stays_unavailable() {
        let index = SimilarityIndex::new();
        let err = index.rebuild(|| Ok(Vec::new())).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));

        // Not NotFound: there is no catalog to search
        let err = index.top_k("Inception", 10).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable(_)));
        assert!(index.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_loader_failure_is_unavailable() {
        let index = SimilarityIndex::new();
        let err = index
            .rebuild(|| Err(IndexError::Unavailable("no such file".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err, IndexError::Unavailable("no such file".to_string()));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let index = SimilarityIndex::new();
        index.rebuild(|| Ok(nolan_catalog())).await.unwrap();

        assert!(index.rebuild(|| Ok(Vec::new())).await.is_err());
        assert_eq!(index.generation(), 2);

        let result = index.top_k("Tenet", 1).await.unwrap();
        assert_eq!(result[0].title, "Inception");
    }

    #[tokio::test]
    async fn test_explicit_rebuild_recovers_unavailable_index() {
        let index = SimilarityIndex::new();
        assert!(index.rebuild(|| Ok(Vec::new())).await.is_err());
        index.rebuild(|| Ok(nolan_catalog())).await.unwrap();
        assert!(index.top_k("Tenet", 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_old_snapshot_survives_swap() {
        let index = SimilarityIndex::new();
        let old = index.rebuild(|| Ok(nolan_catalog())).await.unwrap();

        let new = index
            .rebuild(|| Ok(vec![CatalogEntry::new("Heat", "crime"), CatalogEntry::new("Ronin", "crime")]))
            .await
            .unwrap();

        // In-flight readers holding the old Arc still see a consistent pairing
        assert_eq!(old.len(), 3);
        assert_eq!(old.top_k("Inception", 1).unwrap()[0].title, "Tenet");
        assert_eq!(new.len(), 2);
        assert!(index.top_k("Inception", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_stale_rebuild_joins_completed_build() {
        let index = SimilarityIndex::new();
        let observed = index.generation();
        index.rebuild(|| Ok(nolan_catalog())).await.unwrap();

        // A caller that observed generation 0 must not rebuild again
        let joined = index
            .rebuild_since(observed, || panic!("loader must not run"))
            .await
            .unwrap();
        assert_eq!(joined.generation(), 1);
        assert_eq!(index.generation(), 1);
    }

    fn slow_loader(
        loads: Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl FnOnce() -> Result<Vec<CatalogEntry>, IndexError> + Send + 'static {
        move || {
            loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(delay);
            Ok(nolan_catalog())
        }
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_discard_build() {
        let index = Arc::new(SimilarityIndex::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let first = tokio::spawn({
            let index = index.clone();
            let load = slow_loader(loads.clone(), Duration::from_millis(300));
            async move { index.rebuild_since(0, load).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = tokio::spawn({
            let index = index.clone();
            let load = slow_loader(loads.clone(), Duration::from_millis(300));
            async move { index.rebuild_since(0, load).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The first caller goes away while its build is still running
        first.abort();

        let snapshot = second.await.unwrap().unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(index.generation(), 1);
    }

    #[tokio::test]
    async fn test_reads_are_served_while_rebuild_runs() {
        let index = Arc::new(SimilarityIndex::new());
        index.rebuild(|| Ok(nolan_catalog())).await.unwrap();

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let rebuild = tokio::spawn({
            let index = index.clone();
            async move {
                index
                    .rebuild(move || {
                        let _ = release_rx.recv();
                        Ok(vec![
                            CatalogEntry::new("Heat", "crime"),
                            CatalogEntry::new("Ronin", "crime"),
                        ])
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = tokio::time::timeout(Duration::from_secs(1), index.top_k("Inception", 2))
            .await
            .expect("read blocked behind the rebuild")
            .unwrap();
        let titles: Vec<&str> = result.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Tenet", "The Dark Knight"]);
        assert!(!rebuild.is_finished());

        release_tx.send(()).unwrap();
        let snapshot = rebuild.await.unwrap().unwrap();
        assert_eq!(snapshot.generation(), 2);
        assert_eq!(index.top_k("Heat", 1).await.unwrap()[0].title, "Ronin");
    }
}
