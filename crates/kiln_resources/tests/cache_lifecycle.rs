//! Lifecycle tests for resource caches, driven through a counting backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kiln_resources::{
    CacheConfig, CacheError, RefEntry, ReleaseOutcome, ResourceBackend, ResourceCache,
    ResourceHandle, SharedResourceCache,
};
use proptest::prelude::*;

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

impl Counters {
    fn live(&self) -> usize {
        self.created.load(Ordering::SeqCst) - self.destroyed.load(Ordering::SeqCst)
    }
}

/// Produces the resource name as its payload. Names starting with
/// `missing_` fail to load.
struct CountingBackend {
    counters: Arc<Counters>,
    create_delay: Duration,
}

impl CountingBackend {
    fn new() -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let backend = Self {
            counters: Arc::clone(&counters),
            create_delay: Duration::ZERO,
        };
        (backend, counters)
    }
}

impl ResourceBackend for CountingBackend {
    type Resource = String;
    type Params = ();
    type Error = String;

    fn create(&mut self, name: &str, _: &()) -> Result<String, String> {
        if name.starts_with("missing_") {
            return Err(format!("no such file: {name}"));
        }
        if !self.create_delay.is_zero() {
            thread::sleep(self.create_delay);
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(name.to_owned())
    }

    fn create_default(&mut self) -> Result<String, String> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok("checkerboard".to_owned())
    }

    fn destroy(&mut self, _: String) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn cache(max_count: u32) -> (ResourceCache<CountingBackend>, Arc<Counters>) {
    let (backend, counters) = CountingBackend::new();
    let cache = ResourceCache::new(CacheConfig::new(max_count), backend).unwrap();
    (cache, counters)
}

#[test]
fn test_eviction_frees_slot_for_next_name() {
    let (mut cache, _) = cache(2);

    let a = cache.acquire("a", &(), true).unwrap();
    cache.acquire("b", &(), true).unwrap();
    assert_eq!(cache.ref_count("a"), 1);
    assert_eq!(cache.ref_count("b"), 1);

    assert_eq!(
        cache.acquire("c", &(), true),
        Err(CacheError::CapacityExhausted {
            name: "c".into(),
            max_count: 2
        })
    );

    assert_eq!(cache.release("a").unwrap(), ReleaseOutcome::Evicted);

    let c = cache.acquire("c", &(), true).unwrap();
    assert_eq!(c.index(), a.index());
    assert_eq!(c.generation(), a.generation().map(|g| g + 1));
    assert!(!cache.is_valid(a));
    assert_eq!(cache.get(c).map(String::as_str), Some("c"));
}

#[test]
fn test_full_cache_does_not_touch_backend() {
    let (mut cache, counters) = cache(1);
    cache.acquire("a", &(), true).unwrap();
    let before = counters.created.load(Ordering::SeqCst);

    assert!(cache.acquire("b", &(), true).is_err());
    assert_eq!(counters.created.load(Ordering::SeqCst), before);
    assert_eq!(cache.entry("b"), RefEntry::ABSENT);
}

#[test]
fn test_pinned_resource_survives_and_is_reused() {
    let (mut cache, counters) = cache(2);

    let first = cache.acquire("ui_font", &(), false).unwrap();
    assert_eq!(cache.release("ui_font").unwrap(), ReleaseOutcome::Pinned);
    assert!(cache.is_valid(first));
    assert_eq!(cache.stats().pinned, 1);

    let second = cache.acquire("ui_font", &(), true).unwrap();
    assert_eq!(first, second);
    // Default plus one font.
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);

    // The re-acquire after pinning switched the name to auto-release.
    assert_eq!(cache.release("ui_font").unwrap(), ReleaseOutcome::Evicted);
    assert!(!cache.is_valid(first));
}

#[test]
fn test_failed_load_leaves_no_trace() {
    let (mut cache, counters) = cache(2);

    let err = cache.acquire("missing_texture", &(), true).unwrap_err();
    assert!(matches!(err, CacheError::Backend { ref name, .. } if name == "missing_texture"));
    assert_eq!(cache.entry("missing_texture"), RefEntry::ABSENT);
    assert_eq!(cache.stats().resident, 0);
    assert_eq!(counters.live(), 1);

    assert_eq!(
        cache.release("missing_texture"),
        Err(CacheError::NotFound("missing_texture".into()))
    );
}

#[test]
fn test_handles_count_like_names() {
    let (mut cache, _) = cache(2);

    let handle = cache.acquire("brick", &(), true).unwrap();
    assert_eq!(cache.acquire_handle(handle).unwrap(), handle);
    assert_eq!(cache.ref_count("brick"), 2);

    assert_eq!(
        cache.release_handle(handle).unwrap(),
        ReleaseOutcome::Retained { ref_count: 1 }
    );
    assert_eq!(cache.release_handle(handle).unwrap(), ReleaseOutcome::Evicted);

    let stale = CacheError::StaleHandle {
        index: 0,
        generation: 0,
    };
    assert_eq!(cache.release_handle(handle), Err(stale.clone()));
    assert_eq!(cache.acquire_handle(handle), Err(stale));
}

#[test]
fn test_stale_handle_never_sees_new_occupant() {
    let (mut cache, _) = cache(1);

    let old = cache.acquire("brick", &(), true).unwrap();
    cache.release("brick").unwrap();
    let new = cache.acquire("grass", &(), true).unwrap();

    assert_eq!(old.index(), new.index());
    assert!(cache.get(old).is_none());
    assert_eq!(cache.name_of(old), None);
    assert_eq!(cache.name_of(new), Some("grass"));
}

#[test]
fn test_default_handle_ops_are_uncounted() {
    let (mut cache, _) = cache(1);

    assert_eq!(
        cache.acquire_handle(ResourceHandle::Default).unwrap(),
        ResourceHandle::Default
    );
    assert_eq!(
        cache.release_handle(ResourceHandle::Default).unwrap(),
        ReleaseOutcome::Ignored
    );
    assert_eq!(cache.default_resource(), "checkerboard");
    assert_eq!(cache.stats().total_references, 0);
}

#[test]
fn test_stats() {
    let (mut cache, _) = cache(4);
    cache.acquire("a", &(), true).unwrap();
    cache.acquire("a", &(), true).unwrap();
    cache.acquire("b", &(), false).unwrap();
    cache.acquire("c", &(), false).unwrap();
    cache.release("c").unwrap();

    let stats = cache.stats();
    assert_eq!(stats.capacity, 4);
    assert_eq!(stats.resident, 3);
    assert_eq!(stats.referenced, 2);
    assert_eq!(stats.pinned, 1);
    assert_eq!(stats.total_references, 3);
}

#[test]
fn test_shutdown_destroys_everything() {
    let (mut cache, counters) = cache(4);
    cache.acquire("a", &(), true).unwrap();
    cache.acquire("b", &(), false).unwrap();
    cache.release("b").unwrap();
    assert_eq!(counters.live(), 3);

    let backend = cache.shutdown();
    assert_eq!(counters.live(), 0);
    assert_eq!(backend.counters.destroyed.load(Ordering::SeqCst), 3);
}

#[test]
fn test_concurrent_acquire_creates_once() {
    let (mut backend, counters) = CountingBackend::new();
    backend.create_delay = Duration::from_millis(20);
    let cache = SharedResourceCache::new(CacheConfig::new(4), backend).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || cache.acquire("terrain_atlas", &(), true).unwrap())
        })
        .collect();
    let handles: Vec<ResourceHandle> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(cache.ref_count("terrain_atlas"), 8);
    // Default plus exactly one atlas.
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);

    for _ in 0..8 {
        cache.release("terrain_atlas").unwrap();
    }
    assert_eq!(counters.live(), 1);
}

#[test]
fn test_concurrent_acquire_release_never_underflows() {
    let (backend, counters) = CountingBackend::new();
    let cache = SharedResourceCache::new(CacheConfig::new(4), backend).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    cache.acquire("sky_box", &(), true)?;
                    cache.release("sky_box")?;
                }
                Ok::<(), CacheError>(())
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), Ok(()));
    }

    assert_eq!(cache.ref_count("sky_box"), 0);
    assert!(cache.lock().handle_of("sky_box").is_none());
    // Only the default resource is left alive.
    assert_eq!(counters.live(), 1);
}

#[derive(Clone, Debug)]
enum Op {
    Acquire { name: usize, auto_release: bool },
    Release { name: usize },
}

const NAMES: [&str; 5] = ["brick", "grass", "water", "sand", "lava"];
const MAX_COUNT: u32 = 3;

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..NAMES.len(), any::<bool>())
            .prop_map(|(name, auto_release)| Op::Acquire { name, auto_release }),
        (0..NAMES.len()).prop_map(|name| Op::Release { name }),
    ]
}

#[derive(Clone, Copy, Debug, Default)]
struct Model {
    ref_count: u64,
    auto_release: bool,
    resident: bool,
}

proptest! {
    #[test]
    fn ref_counts_follow_the_model(ops in proptest::collection::vec(op(), 1..120)) {
        let (mut cache, counters) = cache(MAX_COUNT);
        let mut model: HashMap<&str, Model> = HashMap::new();

        for op in ops {
            match op {
                Op::Acquire { name, auto_release } => {
                    let name = NAMES[name];
                    let mut entry = model.get(name).copied().unwrap_or_default();
                    let resident = model.values().filter(|m| m.resident).count();
                    let result = cache.acquire(name, &(), auto_release);

                    if !entry.resident && resident == MAX_COUNT as usize {
                        let is_exhausted = matches!(result, Err(CacheError::CapacityExhausted { .. }));
                        prop_assert!(is_exhausted);
                    } else {
                        prop_assert!(result.is_ok());
                        if entry.ref_count == 0 {
                            entry.auto_release = auto_release;
                        }
                        entry.ref_count += 1;
                        entry.resident = true;
                        model.insert(name, entry);
                    }
                }
                Op::Release { name } => {
                    let name = NAMES[name];
                    let mut entry = model.get(name).copied().unwrap_or_default();
                    let result = cache.release(name);

                    if entry.ref_count == 0 {
                        prop_assert_eq!(result, Err(CacheError::NotFound(name.to_owned())));
                    } else {
                        entry.ref_count -= 1;
                        let expected = if entry.ref_count > 0 {
                            ReleaseOutcome::Retained { ref_count: entry.ref_count }
                        } else if entry.auto_release {
                            entry.resident = false;
                            entry.auto_release = false;
                            ReleaseOutcome::Evicted
                        } else {
                            ReleaseOutcome::Pinned
                        };
                        prop_assert_eq!(result, Ok(expected));
                        model.insert(name, entry);
                    }
                }
            }

            for name in NAMES {
                let expected = model.get(name).copied().unwrap_or_default();
                let actual = cache.entry(name);
                prop_assert_eq!(actual.ref_count, expected.ref_count);
                prop_assert_eq!(actual.is_resident(), expected.resident);
            }
            let resident = model.values().filter(|m| m.resident).count();
            prop_assert_eq!(cache.len(), resident);
            prop_assert_eq!(counters.live(), resident + 1);
        }
    }
}
