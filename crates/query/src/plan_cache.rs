//! Per-worker compiled plan cache.
//!
//! Each worker owns one `WorkerCache`; workers never share entries, so a
//! hit only touches the worker's own map. Within a worker, concurrent
//! first-time callers for the same key serialize on that key's slot, and
//! the compiler runs at most once per key.
//!
//! The locks exist for callers that share a worker id across threads. A
//! hit takes the worker's map mutex for the lookup, reads the slot's
//! template without locking and bumps relaxed counters; with one thread
//! per worker the mutex is never contended. Only a miss takes the slot's
//! compile lock.
//!
//! Entries are keyed by normalized query text plus the requested result
//! type. A failed compile (or a result type mismatch) leaves no entry
//! behind, so the next call compiles again.

use crate::error::{EngineError, EngineResult, WorkerId};
use crate::planner::{PlanTemplate, QueryCompiler, ResultType};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Folds ASCII case and collapses whitespace outside quoted literals and
/// identifiers. Quoted text is kept verbatim.
pub fn normalize_query_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    for ch in text.trim().chars() {
        if let Some(q) = quote {
            out.push(ch);
            // a doubled quote re-opens the literal on the next char
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            out.push(ch);
        } else {
            out.push(ch.to_ascii_lowercase());
        }
    }
    out
}

/// Cache key within one worker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub result_type: ResultType,
}

impl CacheKey {
    pub fn new(query: &str, result_type: &ResultType) -> Self {
        Self {
            text: normalize_query_text(query),
            result_type: result_type.clone(),
        }
    }
}

/// Which cached plans a schema change touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaChangeScope {
    All,
    /// Plans reading the extent. Use this when an index is created, since
    /// plans of the extent may now compile differently.
    Extent(String),
    /// Plans scanning the index.
    Index { extent: String, index: String },
}

impl SchemaChangeScope {
    pub fn affects(&self, template: &PlanTemplate) -> bool {
        match self {
            SchemaChangeScope::All => true,
            SchemaChangeScope::Extent(extent) => template.reads_extent(extent),
            SchemaChangeScope::Index { extent, index } => template.uses_index(extent, index),
        }
    }
}

/// Counters of one worker cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub worker: WorkerId,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub compiles: u64,
}

impl CacheStats {
    /// Returns cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A slot is filled at most once. Invalidation removes the slot from the
/// map instead of emptying it, so a compile that finishes afterwards lands
/// in a slot nobody can reach.
#[derive(Debug, Default)]
struct CacheSlot {
    template: OnceLock<Arc<PlanTemplate>>,
    compile: Mutex<()>,
    last_access: AtomicU64,
}

impl CacheSlot {
    fn is_filled(&self) -> bool {
        self.template.get().is_some()
    }
}

/// The plan cache shard of one worker.
#[derive(Debug)]
pub struct WorkerCache {
    worker: WorkerId,
    slots: Mutex<HashMap<CacheKey, Arc<CacheSlot>>>,
    /// `None` means unbounded.
    max_entries: Option<usize>,
    /// Global access counter for LRU tracking.
    access_counter: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    compiles: AtomicU64,
}

impl WorkerCache {
    pub fn new(worker: WorkerId, max_entries: Option<usize>) -> Self {
        Self {
            worker,
            slots: Mutex::new(HashMap::new()),
            max_entries: max_entries.map(|n| n.max(1)),
            access_counter: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compiles: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Returns the cached template for `(query, expected)`, compiling it on
    /// the first request.
    pub fn get_or_compile(
        &self,
        query: &str,
        expected: &ResultType,
        compiler: &dyn QueryCompiler,
    ) -> EngineResult<Arc<PlanTemplate>> {
        let key = CacheKey::new(query, expected);
        let slot = self.slot(&key);
        if let Some(found) = slot.template.get() {
            return Ok(self.hit(&key, found));
        }
        let guard = lock(&slot.compile);
        // filled while this caller waited
        if let Some(found) = slot.template.get() {
            return Ok(self.hit(&key, found));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.compiles.fetch_add(1, Ordering::Relaxed);
        let compiled = compiler
            .compile(query)
            .map_err(EngineError::from)
            .and_then(|compiled| compiled.binding.check(expected).map(|_| compiled));
        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(err) => {
                drop(guard);
                self.discard_empty(&key, &slot);
                debug!(worker = self.worker, query = %key.text, error = %err, "plan compile failed");
                return Err(err);
            }
        };

        let built = Arc::clone(slot.template.get_or_init(|| {
            Arc::new(PlanTemplate::new(key.text.clone(), compiled))
        }));
        debug!(
            worker = self.worker,
            query = %key.text,
            result_type = %expected,
            fingerprint = %built.fingerprint(),
            "plan compiled"
        );
        Ok(built)
    }

    fn hit(&self, key: &CacheKey, found: &Arc<PlanTemplate>) -> Arc<PlanTemplate> {
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(worker = self.worker, query = %key.text, "plan cache hit");
        Arc::clone(found)
    }

    /// Finds or creates the slot for `key` and marks it used.
    fn slot(&self, key: &CacheKey) -> Arc<CacheSlot> {
        let tick = self.access_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slots = lock(&self.slots);
        let slot = match slots.get(key) {
            Some(slot) => Arc::clone(slot),
            None => {
                if let Some(max) = self.max_entries {
                    while slots.len() >= max {
                        if !Self::evict_lru(&mut slots) {
                            break;
                        }
                    }
                }
                let slot = Arc::new(CacheSlot::default());
                slots.insert(key.clone(), Arc::clone(&slot));
                slot
            }
        };
        slot.last_access.store(tick, Ordering::Relaxed);
        slot
    }

    /// Evicts the least recently used entry.
    fn evict_lru(slots: &mut HashMap<CacheKey, Arc<CacheSlot>>) -> bool {
        let lru_key = slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_access.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());
        match lru_key {
            Some(key) => {
                slots.remove(&key);
                true
            }
            None => false,
        }
    }

    fn discard_empty(&self, key: &CacheKey, slot: &Arc<CacheSlot>) {
        let mut slots = lock(&self.slots);
        let same = slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot));
        if same && !slot.is_filled() {
            slots.remove(key);
        }
    }

    /// Drops every entry `scope` affects, plus any compile still in flight.
    /// Returns the number of compiled entries dropped. Never waits for a
    /// compile.
    pub fn invalidate(&self, scope: &SchemaChangeScope) -> usize {
        let mut slots = lock(&self.slots);
        let mut dropped = 0;
        slots.retain(|_, slot| match slot.template.get() {
            Some(template) if scope.affects(template) => {
                dropped += 1;
                false
            }
            Some(_) => true,
            // compiling against the old schema
            None => false,
        });
        dropped
    }

    /// Number of compiled entries.
    pub fn len(&self) -> usize {
        lock(&self.slots).values().filter(|s| s.is_filled()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            worker: self.worker,
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
        }
    }

    /// Clears the cache.
    pub fn clear(&self) {
        lock(&self.slots).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.compiles.store(0, Ordering::Relaxed);
    }
}

/// One `WorkerCache` per worker, indexed by worker id.
#[derive(Debug)]
pub struct PlanCache {
    workers: Vec<WorkerCache>,
}

impl PlanCache {
    pub fn new(workers: usize, max_entries_per_worker: Option<usize>) -> Self {
        Self {
            workers: (0..workers)
                .map(|id| WorkerCache::new(id, max_entries_per_worker))
                .collect(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, worker: WorkerId) -> EngineResult<&WorkerCache> {
        self.workers.get(worker).ok_or(EngineError::UnknownWorker {
            worker,
            workers: self.workers.len(),
        })
    }

    pub fn get_or_compile(
        &self,
        query: &str,
        expected: &ResultType,
        worker: WorkerId,
        compiler: &dyn QueryCompiler,
    ) -> EngineResult<Arc<PlanTemplate>> {
        self.worker(worker)?.get_or_compile(query, expected, compiler)
    }

    /// Applies a schema change to every worker. Returns the number of
    /// entries dropped across workers.
    pub fn invalidate(&self, scope: &SchemaChangeScope) -> usize {
        let dropped = self.workers.iter().map(|w| w.invalidate(scope)).sum();
        info!(?scope, dropped, "plan cache invalidated");
        dropped
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.workers.iter().map(WorkerCache::stats).collect()
    }

    pub fn clear(&self) {
        for worker in &self.workers {
            worker.clear();
        }
    }
}
