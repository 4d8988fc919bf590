//! Local, time-expiring cache of config values.
//!
//! The cache is only a latency optimization: it can be emptied at any time.
//! Entries live in a Moka cache with a time-to-live; every timestamp
//! comparison runs inside Moka's per-key compute, so a comparison and the
//! write that depends on it are one step and unrelated keys never contend.
//!
//! Each slot is stamped with a generation drawn when it was written. A read
//! that misses takes the current generation before going to the store and
//! only fills the cache if nothing touched the key in the meantime.

use crate::{ConfigKey, EncodedValue};
use moka::future::Cache;
use moka::ops::compute::Op;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
enum Slot {
    Value {
        value: EncodedValue,
        generation: u64,
    },
    /// No usable value: the key was deleted, or a local write lost to a
    /// newer cached value. Remote puts must be strictly newer than `floor`.
    Vacant { floor: i64, generation: u64 },
}

impl Slot {
    fn generation(&self) -> u64 {
        match self {
            Slot::Value { generation, .. } | Slot::Vacant { generation, .. } => *generation,
        }
    }
}

/// Result of offering a value to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// The value is now cached with a fresh expiry.
    Applied,
    /// A newer (or, for remote events, equally new) value was kept.
    Ignored,
    /// The key no longer serves a value; the next read goes to the store.
    Evicted,
}

pub struct LocalCache {
    entries: Cache<ConfigKey, Slot>,
    ttl: Duration,
    generation: AtomicU64,
    cleared_at: AtomicU64,
}

impl LocalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().time_to_live(ttl).build(),
            ttl,
            generation: AtomicU64::new(0),
            cleared_at: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current generation. Take it before a store read and hand it to
    /// [`LocalCache::populate`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Live value for `key`, if any.
    pub async fn get(&self, key: &ConfigKey) -> Option<EncodedValue> {
        let cleared_at = self.cleared_at.load(Ordering::SeqCst);
        match self.entries.get(key).await {
            Some(Slot::Value { value, generation }) if generation >= cleared_at => Some(value),
            _ => None,
        }
    }

    /// Cache a value that was just committed to the store by this instance.
    /// If a strictly newer value is cached the key is vacated instead.
    pub async fn write_through(&self, key: &ConfigKey, value: EncodedValue) -> CacheUpdate {
        self.update_slot(key, move |current| match current {
            Some(Slot::Value { value: cached, .. }) if cached.timestamp() > value.timestamp() => (
                Op::Put(Slot::Vacant {
                    floor: cached.timestamp(),
                    generation: self.next_generation(),
                }),
                CacheUpdate::Evicted,
            ),
            _ => (
                Op::Put(Slot::Value {
                    value,
                    generation: self.next_generation(),
                }),
                CacheUpdate::Applied,
            ),
        })
        .await
    }

    /// Cache a value fetched from the store on a read miss. `since` is the
    /// generation taken before the store call; any write, delete, event or
    /// clear after it wins over this snapshot. Equal timestamps keep the
    /// cached entry.
    pub async fn populate(&self, key: &ConfigKey, value: EncodedValue, since: u64) -> CacheUpdate {
        if since < self.cleared_at.load(Ordering::SeqCst) {
            return CacheUpdate::Ignored;
        }

        self.update_slot(key, move |current| match current {
            Some(slot) if slot.generation() > since => (Op::Nop, CacheUpdate::Ignored),
            Some(Slot::Value { value: cached, .. }) if cached.timestamp() >= value.timestamp() => {
                (Op::Nop, CacheUpdate::Ignored)
            }
            _ => (
                Op::Put(Slot::Value {
                    value,
                    generation: self.next_generation(),
                }),
                CacheUpdate::Applied,
            ),
        })
        .await
    }

    /// Cache a value carried by a change event, only if strictly newer than
    /// the cached value or the last tombstone. Ties keep the existing entry.
    pub async fn apply_if_newer(&self, key: &ConfigKey, value: EncodedValue) -> CacheUpdate {
        self.update_slot(key, move |current| {
            let newest = match &current {
                Some(Slot::Value { value: cached, .. }) => Some(cached.timestamp()),
                Some(Slot::Vacant { floor, .. }) => Some(*floor),
                None => None,
            };

            match newest {
                Some(newest) if newest >= value.timestamp() => (Op::Nop, CacheUpdate::Ignored),
                _ => (
                    Op::Put(Slot::Value {
                        value,
                        generation: self.next_generation(),
                    }),
                    CacheUpdate::Applied,
                ),
            }
        })
        .await
    }

    /// Drop any cached value for `key` and remember the deletion time, so a
    /// late put event older than `timestamp` cannot bring it back.
    pub async fn mark_deleted(&self, key: &ConfigKey, timestamp: i64) -> CacheUpdate {
        self.update_slot(key, move |current| {
            let floor = match current {
                Some(Slot::Vacant { floor, .. }) => floor.max(timestamp),
                _ => timestamp,
            };
            (
                Op::Put(Slot::Vacant {
                    floor,
                    generation: self.next_generation(),
                }),
                CacheUpdate::Evicted,
            )
        })
        .await
    }

    /// Forget everything, including deletion markers. Reads in flight when
    /// this runs will not fill the cache.
    pub fn clear(&self) {
        let generation = self.next_generation();
        self.cleared_at.fetch_max(generation, Ordering::SeqCst);
        self.entries.invalidate_all();
    }

    /// Number of keys currently serving a value.
    pub fn len(&self) -> usize {
        let cleared_at = self.cleared_at.load(Ordering::SeqCst);
        self.entries
            .iter()
            .filter(|(_, slot)| {
                matches!(slot, Slot::Value { generation, .. } if *generation >= cleared_at)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Periodically run Moka's housekeeping, which drops expired entries,
    /// until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, cleanup_interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;

                let Some(cache) = cache.upgrade() else {
                    tracing::debug!("local cache dropped; stopping sweeper");
                    break;
                };

                cache.entries.run_pending_tasks().await;
                tracing::trace!("cache housekeeping done, {} entries", cache.entries.entry_count());
            }
        })
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn update_slot<F>(&self, key: &ConfigKey, decide: F) -> CacheUpdate
    where
        F: FnOnce(Option<Slot>) -> (Op<Slot>, CacheUpdate) + Send,
    {
        let cleared_at = self.cleared_at.load(Ordering::SeqCst);
        let mut update = CacheUpdate::Ignored;

        self.entries
            .entry(key.clone())
            .and_compute_with(|current| {
                let current = current
                    .map(|entry| entry.into_value())
                    .filter(|slot| slot.generation() >= cleared_at);
                let (op, outcome) = decide(current);
                update = outcome;
                std::future::ready(op)
            })
            .await;

        update
    }
}
