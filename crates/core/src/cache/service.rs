//! Catalog service.
//!
//! Owns the cache and drives the refresh cycle:
//! - Fetching: first page, delivered as soon as it lands
//! - Backfilling: concurrent per-genre top-ups joined by a pending group
//! - Idle: accepts `load_more` and the next refresh
//!
//! The cache lock is never held across a network call. Sub-request results
//! travel back over a channel and are applied by the task that started the
//! round, after the group has finalized.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::pending::PendingRequestGroup;
use super::store::CatalogCache;
use super::types::{
    CatalogEvent, LoadPhase, PageOutcome, RefreshOutcome, SearchResults, SearchSource, SyncError,
    SyncState, SyncStatus,
};
use crate::config::SyncConfig;
use crate::locale::{LocaleSource, StaticLocale};
use crate::metrics;
use crate::movie::Movie;
use crate::overlay::{OverlayError, OverlaySnapshot, OverlayStore};
use crate::query::{CatalogSource, QueryError};
use crate::views;

const EVENT_CAPACITY: usize = 64;

/// One backfill sub-request.
struct SubRequest {
    label: String,
    future: BoxFuture<'static, Result<Vec<Movie>, QueryError>>,
}

/// Completes a backfill group when a sub-request task ends, including by
/// panic.
struct CompleteOnDrop {
    group: Arc<PendingRequestGroup>,
    label: String,
}

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("Backfill {} panicked", self.label);
            metrics::BACKFILL_REQUESTS
                .with_label_values(&["failed"])
                .inc();
        }
        self.group.complete();
    }
}

/// Wait for a cycle task.
async fn join_cycle<T>(handle: JoinHandle<Result<T, SyncError>>) -> Result<T, SyncError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(SyncError::Aborted(e.to_string())),
    }
}

/// Mutable state behind the service lock.
#[derive(Default)]
struct SyncInner {
    cache: CatalogCache,
    state: SyncState,
    offset: usize,
    /// Full records the overlay points at, unioned back after every merge.
    referenced: IndexMap<i64, Movie>,
    /// Latest remote search page, so its records can be acted on.
    search_hits: IndexMap<i64, Movie>,
    recommendations: Vec<Movie>,
    recommendations_dirty: bool,
    /// Bumped when the language changes. Results from an older cycle are
    /// dropped instead of admitted.
    generation: u64,
    /// Set by a language change that lands mid-cycle.
    reload_queued: bool,
}

impl SyncInner {
    /// Merge overlay flags into `movies`, admit them and union in the
    /// referenced records. Returns how many of `movies` were new.
    fn admit(&mut self, mut movies: Vec<Movie>, snapshot: &OverlaySnapshot) -> usize {
        CatalogCache::merge_overlay(&mut movies, snapshot);
        for movie in &movies {
            if snapshot.references(movie.id) {
                self.referenced
                    .entry(movie.id)
                    .or_insert_with(|| movie.clone());
            }
        }

        let added = self.cache.admit_all(movies);
        self.union_referenced(snapshot);
        added
    }

    /// Enter `Fetching` with an empty cache. Returns the cycle generation.
    fn begin_refresh(&mut self) -> u64 {
        self.state = SyncState::Fetching;
        self.cache.clear();
        self.offset = 0;
        self.generation
    }

    fn union_referenced(&mut self, snapshot: &OverlaySnapshot) {
        self.referenced.retain(|id, _| snapshot.references(*id));
        let referenced: Vec<Movie> = self.referenced.values().cloned().collect();
        self.cache.admit_all(referenced);
        self.cache.remerge(snapshot);
        metrics::CACHE_SIZE.set(self.cache.len() as i64);
    }

    fn lookup(&self, id: i64) -> Option<Movie> {
        self.cache
            .get(id)
            .or_else(|| self.referenced.get(&id))
            .or_else(|| self.search_hits.get(&id))
            .cloned()
    }
}

/// Dependency-injected catalog service. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    source: Arc<dyn CatalogSource>,
    overlay: Arc<dyn OverlayStore>,
    locale: Arc<StaticLocale>,
    config: SyncConfig,
    sync: RwLock<SyncInner>,
    rng: Mutex<StdRng>,
    events: broadcast::Sender<CatalogEvent>,
}

impl CatalogService {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        overlay: Arc<dyn OverlayStore>,
        locale: Arc<StaticLocale>,
        config: SyncConfig,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(ServiceInner {
                source,
                overlay,
                locale,
                config,
                sync: RwLock::new(SyncInner::default()),
                rng: Mutex::new(rng),
                events,
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Subscribe to cache events.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Refresh cycle
    // =========================================================================

    /// Clear the cache, load the first page, then backfill thin genres.
    ///
    /// Returns `Rejected` without touching anything if a cycle or page load
    /// is already running. A failed first page ends the cycle and is
    /// returned; backfill failures are only logged.
    ///
    /// The cycle runs on its own task, so dropping this future does not
    /// strand the state. A language change during the cycle queues another
    /// one, which this call also waits for.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SyncError> {
        let generation = {
            let mut sync = self.inner.sync.write().await;
            if !sync.state.is_idle() {
                debug!("Refresh rejected, state is {:?}", sync.state);
                metrics::REFRESH_CYCLES
                    .with_label_values(&["rejected"])
                    .inc();
                return Ok(RefreshOutcome::Rejected);
            }
            sync.begin_refresh()
        };

        let service = self.clone();
        join_cycle(tokio::spawn(async move {
            service.refresh_cycles(generation).await
        }))
        .await
    }

    /// Run refresh cycles until no reload is queued. The state is already
    /// `Fetching` for `generation`.
    async fn refresh_cycles(&self, mut generation: u64) -> Result<RefreshOutcome, SyncError> {
        loop {
            let result = self.unwinding_to_idle(self.run_refresh(generation)).await;
            match self.take_queued_reload().await {
                Some(next) => {
                    info!("Reloading after language change");
                    generation = next;
                }
                None => return result,
            }
        }
    }

    async fn run_refresh(&self, generation: u64) -> Result<RefreshOutcome, SyncError> {
        info!("Refresh started");

        let movies = match self
            .inner
            .source
            .fetch_page(self.inner.config.initial_page_size, 0)
            .await
        {
            Ok(movies) => movies,
            Err(e) => {
                let e = SyncError::from(e);
                self.fail_refresh(&e).await;
                return Err(e);
            }
        };

        let admitted = {
            let mut sync = self.inner.sync.write().await;
            // Snapshot and admit under one lock.
            match self.inner.overlay.snapshot() {
                Ok(snapshot) => {
                    if sync.generation == generation {
                        sync.offset = movies.len();
                        sync.admit(movies, &snapshot);
                    }
                    sync.state = SyncState::Backfilling;
                    Ok((sync.cache.len(), snapshot))
                }
                Err(e) => Err(SyncError::from(e)),
            }
        };
        let (total, snapshot) = match admitted {
            Ok(admitted) => admitted,
            Err(e) => {
                self.fail_refresh(&e).await;
                return Err(e);
            }
        };

        info!("Initial page loaded, {} records cached", total);
        self.emit(CatalogEvent::DataLoaded {
            phase: LoadPhase::Initial,
            total,
        });

        self.backfill(generation, snapshot).await;

        metrics::REFRESH_CYCLES
            .with_label_values(&["completed"])
            .inc();
        Ok(RefreshOutcome::Completed)
    }

    async fn fail_refresh(&self, err: &SyncError) {
        self.inner.sync.write().await.state = SyncState::Idle;
        error!("Refresh failed: {}", err);
        metrics::REFRESH_CYCLES.with_label_values(&["failed"]).inc();
        self.emit(CatalogEvent::RefreshFailed {
            message: err.to_string(),
        });
    }

    /// Run `cycle`, putting the state back to Idle if it panics.
    async fn unwinding_to_idle<T>(
        &self,
        cycle: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        match AssertUnwindSafe(cycle).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!("Sync cycle panicked, returning to Idle");
                self.inner.sync.write().await.state = SyncState::Idle;
                metrics::REFRESH_CYCLES.with_label_values(&["failed"]).inc();
                Err(SyncError::Aborted("cycle panicked".to_string()))
            }
        }
    }

    /// Start the reload queued by a language change, if the service is idle.
    async fn take_queued_reload(&self) -> Option<u64> {
        let mut sync = self.inner.sync.write().await;
        if !sync.reload_queued || !sync.state.is_idle() {
            return None;
        }
        sync.reload_queued = false;
        Some(sync.begin_refresh())
    }

    /// Run one backfill round and return to Idle.
    async fn backfill(&self, generation: u64, snapshot: OverlaySnapshot) {
        let requests = self.plan_backfill(&snapshot).await;
        let issued = requests.len();

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let group = PendingRequestGroup::new(
            issued,
            Box::new(move || {
                let _ = done_tx.send(());
            }),
        );

        for request in requests {
            let results_tx = results_tx.clone();
            let completion = CompleteOnDrop {
                group: Arc::clone(&group),
                label: request.label.clone(),
            };
            tokio::spawn(async move {
                let _completion = completion;
                let result = request.future.await;
                let _ = results_tx.send((request.label, result));
            });
        }
        drop(results_tx);
        drop(group);

        if done_rx.await.is_err() {
            warn!("Backfill group dropped before finalizing");
        }

        let total = {
            let mut sync = self.inner.sync.write().await;
            let current = sync.generation == generation;

            // Overlay writes made during the round must survive the remerge.
            let snapshot = match self.inner.overlay.snapshot() {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!("Overlay re-read after backfill failed: {}", e);
                    snapshot
                }
            };

            while let Ok((label, result)) = results_rx.try_recv() {
                match result {
                    Ok(movies) => {
                        metrics::BACKFILL_REQUESTS.with_label_values(&["ok"]).inc();
                        if current {
                            let fetched = movies.len();
                            let added = sync.admit(movies, &snapshot);
                            debug!("Backfill {} returned {}, {} new", label, fetched, added);
                        }
                    }
                    Err(e) => {
                        metrics::BACKFILL_REQUESTS
                            .with_label_values(&["failed"])
                            .inc();
                        warn!("Backfill {} failed: {}", label, e);
                    }
                }
            }

            if current {
                sync.union_referenced(&snapshot);
            }
            sync.state = SyncState::Idle;
            sync.cache.len()
        };

        info!(
            "Backfill finished after {} requests, {} records cached",
            issued, total
        );
        self.emit(CatalogEvent::DataLoaded {
            phase: LoadPhase::Backfilled,
            total,
        });
    }

    /// One request per target genre under the floor, plus one for overlay
    /// records the cache has never seen.
    async fn plan_backfill(&self, snapshot: &OverlaySnapshot) -> Vec<SubRequest> {
        let sync = self.inner.sync.read().await;
        let floor = self.inner.config.genre_floor;
        let mut requests = Vec::new();

        for genre in &self.inner.config.target_genres {
            let have = sync.cache.records().filter(|m| m.has_genre(genre)).count();
            if have >= floor {
                continue;
            }
            let wanted = floor - have;
            debug!("Genre {} has {}/{}, requesting {}", genre, have, floor, wanted);

            let source = Arc::clone(&self.inner.source);
            let genre = genre.clone();
            requests.push(SubRequest {
                label: format!("genre {}", genre),
                future: async move { source.fetch_by_genre(&genre, wanted).await }.boxed(),
            });
        }

        let unknown: Vec<i64> = snapshot
            .referenced_ids()
            .into_iter()
            .filter(|id| !sync.cache.contains(*id))
            .collect();
        if !unknown.is_empty() {
            debug!("Requesting {} overlay records missing from cache", unknown.len());
            let source = Arc::clone(&self.inner.source);
            requests.push(SubRequest {
                label: format!("{} overlay ids", unknown.len()),
                future: async move { source.fetch_by_ids(&unknown).await }.boxed(),
            });
        }

        requests
    }

    /// Fetch the next page. Only runs while Idle.
    ///
    /// Like `refresh`, the page load runs on its own task.
    pub async fn load_more(&self) -> Result<PageOutcome, SyncError> {
        let (offset, generation) = {
            let mut sync = self.inner.sync.write().await;
            if !sync.state.is_idle() {
                debug!("Load more rejected, state is {:?}", sync.state);
                return Ok(PageOutcome::Rejected);
            }
            sync.state = SyncState::Paging;
            (sync.offset, sync.generation)
        };

        let service = self.clone();
        join_cycle(tokio::spawn(async move {
            let result = service
                .unwinding_to_idle(service.run_load_more(offset, generation))
                .await;
            if let Some(next) = service.take_queued_reload().await {
                info!("Reloading after language change");
                let reload = service.clone();
                tokio::spawn(async move {
                    if let Err(e) = reload.refresh_cycles(next).await {
                        warn!("Reload after language change failed: {}", e);
                    }
                });
            }
            result
        }))
        .await
    }

    async fn run_load_more(&self, offset: usize, generation: u64) -> Result<PageOutcome, SyncError> {
        let result = self
            .inner
            .source
            .fetch_page(self.inner.config.page_size, offset)
            .await;

        let mut sync = self.inner.sync.write().await;
        sync.state = SyncState::Idle;

        let movies = match result {
            Ok(movies) => movies,
            Err(e) => {
                warn!("Load more at offset {} failed: {}", offset, e);
                return Err(e.into());
            }
        };

        let fetched = movies.len();
        if sync.generation != generation {
            return Ok(PageOutcome::Loaded { fetched, added: 0 });
        }

        let snapshot = self.inner.overlay.snapshot()?;
        sync.offset += fetched;
        let added = sync.admit(movies, &snapshot);
        let total = sync.cache.len();
        drop(sync);

        debug!("Page at offset {} returned {}, {} new", offset, fetched, added);
        self.emit(CatalogEvent::DataLoaded {
            phase: LoadPhase::Page,
            total,
        });
        Ok(PageOutcome::Loaded { fetched, added })
    }

    // =========================================================================
    // Overlay mutations
    // =========================================================================

    pub async fn add_watchlist(&self, id: i64) -> Result<Movie, SyncError> {
        self.mutate_overlay(id, true, |overlay| overlay.add_watchlist(id))
            .await
    }

    pub async fn remove_watchlist(&self, id: i64) -> Result<Movie, SyncError> {
        self.mutate_overlay(id, true, |overlay| overlay.remove_watchlist(id))
            .await
    }

    pub async fn add_watched(&self, id: i64) -> Result<Movie, SyncError> {
        self.mutate_overlay(id, true, |overlay| overlay.add_watched(id))
            .await
    }

    pub async fn remove_watched(&self, id: i64) -> Result<Movie, SyncError> {
        self.mutate_overlay(id, true, |overlay| overlay.remove_watched(id))
            .await
    }

    /// Store a resume position. Does not invalidate recommendations.
    pub async fn set_resume(&self, id: i64, minutes: u32) -> Result<Movie, SyncError> {
        self.mutate_overlay(id, false, |overlay| overlay.set_resume(id, minutes))
            .await
    }

    /// Write through to the overlay store, then update the cached record.
    /// The write error is returned as-is; it is never swallowed.
    async fn mutate_overlay<F>(
        &self,
        id: i64,
        invalidates: bool,
        write: F,
    ) -> Result<Movie, SyncError>
    where
        F: FnOnce(&dyn OverlayStore) -> Result<(), OverlayError>,
    {
        let mut sync = self.inner.sync.write().await;
        let mut movie = sync.lookup(id).ok_or(SyncError::UnknownMovie(id))?;

        write(self.inner.overlay.as_ref())?;
        let snapshot = self.inner.overlay.snapshot()?;

        CatalogCache::merge_overlay(std::slice::from_mut(&mut movie), &snapshot);
        if let Some(cached) = sync.cache.get_mut(id) {
            *cached = movie.clone();
        }
        if snapshot.references(id) {
            sync.referenced.insert(id, movie.clone());
            sync.union_referenced(&snapshot);
        }
        if invalidates {
            sync.recommendations_dirty = true;
        }

        debug!("Overlay updated for movie {}", id);
        Ok(movie)
    }

    /// Switch the synopsis language. Clears the cache, paging and
    /// recommendations. When idle the caller refreshes afterwards; when a
    /// cycle is running its results are dropped and a reload runs as soon
    /// as it ends.
    pub async fn set_language(&self, language: &str) {
        self.inner.locale.set(language);

        let mut sync = self.inner.sync.write().await;
        sync.generation += 1;
        if !sync.state.is_idle() {
            sync.reload_queued = true;
        }
        sync.cache.clear();
        sync.referenced.clear();
        sync.search_hits.clear();
        sync.offset = 0;
        sync.recommendations.clear();
        sync.recommendations_dirty = true;
        metrics::CACHE_SIZE.set(0);

        info!("Language set to {}, cache cleared", language);
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Every cached record in admission order.
    pub async fn movies(&self) -> Vec<Movie> {
        self.inner.sync.read().await.cache.to_vec()
    }

    pub async fn movie(&self, id: i64) -> Option<Movie> {
        self.inner.sync.read().await.lookup(id)
    }

    pub async fn significant_genres(&self) -> Vec<String> {
        let sync = self.inner.sync.read().await;
        views::significant_genres(
            sync.cache.records(),
            self.inner.config.significant_genre_limit,
        )
    }

    /// Fresh random sample on every call.
    pub async fn movies_for_genre(&self, genre: &str) -> Vec<Movie> {
        let sync = self.inner.sync.read().await;
        let mut rng = self.rng();
        views::movies_for_genre(
            sync.cache.records(),
            genre,
            self.inner.config.genre_sample_limit,
            &mut *rng,
        )
    }

    /// Cached recommendations, recomputed when dirty or empty.
    pub async fn recommendations(&self) -> Result<Vec<Movie>, SyncError> {
        let mut sync = self.inner.sync.write().await;
        if sync.recommendations_dirty || sync.recommendations.is_empty() {
            let snapshot = self.inner.overlay.snapshot()?;
            self.recompute_recommendations(&mut sync, &snapshot);
        }
        Ok(current_recommendations(&sync))
    }

    /// Force recomputation. With an empty cache and no overlay signal the
    /// pool is seeded from a random remote sample.
    pub async fn refresh_recommendations(&self) -> Result<Vec<Movie>, SyncError> {
        let snapshot = self.inner.overlay.snapshot()?;
        let (empty, generation) = {
            let sync = self.inner.sync.read().await;
            (sync.cache.is_empty(), sync.generation)
        };

        if empty && snapshot.has_no_signal() {
            let limit = self.inner.config.recommendation_limit;
            let movies = self.inner.source.fetch_random(limit).await.map_err(|e| {
                warn!("Random recommendation seed failed: {}", e);
                e
            })?;
            let mut sync = self.inner.sync.write().await;
            if sync.generation == generation {
                sync.admit(movies, &snapshot);
            }
        }

        let mut sync = self.inner.sync.write().await;
        self.recompute_recommendations(&mut sync, &snapshot);
        Ok(current_recommendations(&sync))
    }

    fn recompute_recommendations(&self, sync: &mut SyncInner, snapshot: &OverlaySnapshot) {
        let records = sync.cache.to_vec();
        let pool = views::recommendation_pool(&records, snapshot);
        let mut rng = self.rng();
        sync.recommendations =
            views::sample(pool, self.inner.config.recommendation_limit, &mut *rng);
        sync.recommendations_dirty = false;
        debug!("Recomputed {} recommendations", sync.recommendations.len());
    }

    pub async fn continue_watching(&self) -> Vec<Movie> {
        let sync = self.inner.sync.read().await;
        views::continue_watching(sync.cache.records())
    }

    /// Instant match against the cache.
    pub async fn search_local(&self, query: &str) -> Vec<Movie> {
        let sync = self.inner.sync.read().await;
        views::search_local(sync.cache.records(), query)
    }

    /// Authoritative match against the full catalog.
    pub async fn search_remote(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Movie>, SyncError> {
        let mut movies = self
            .inner
            .source
            .search_by_title(query, limit, offset)
            .await
            .map_err(|e| {
                warn!("Remote search for {:?} failed: {}", query, e);
                e
            })?;
        let snapshot = self.inner.overlay.snapshot()?;
        CatalogCache::merge_overlay(&mut movies, &snapshot);

        let mut sync = self.inner.sync.write().await;
        if offset == 0 {
            sync.search_hits.clear();
        }
        for movie in &movies {
            sync.search_hits.insert(movie.id, movie.clone());
        }
        Ok(movies)
    }

    /// Remote results, or the local pass if the remote search fails.
    pub async fn search(&self, query: &str, limit: usize, offset: usize) -> SearchResults {
        match self.search_remote(query, limit, offset).await {
            Ok(movies) => SearchResults {
                source: SearchSource::Remote,
                movies,
            },
            Err(_) => SearchResults {
                source: SearchSource::Local,
                movies: self.search_local(query).await,
            },
        }
    }

    /// Skeleton records for a loading view.
    pub fn placeholders(count: usize) -> Vec<Movie> {
        (0..count).map(Movie::placeholder).collect()
    }

    pub async fn state(&self) -> SyncState {
        self.inner.sync.read().await.state
    }

    pub async fn status(&self) -> SyncStatus {
        let sync = self.inner.sync.read().await;
        SyncStatus {
            state: sync.state,
            cached: sync.cache.len(),
            offset: sync.offset,
            recommendations_dirty: sync.recommendations_dirty,
            language: self.inner.locale.language(),
        }
    }

    fn emit(&self, event: CatalogEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        match self.inner.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cached recommendations with overlay flags taken from the live cache.
fn current_recommendations(sync: &SyncInner) -> Vec<Movie> {
    sync.recommendations
        .iter()
        .map(|m| sync.cache.get(m.id).cloned().unwrap_or_else(|| m.clone()))
        .collect()
}
