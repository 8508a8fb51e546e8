//! The fallback backend: emulated zeroing through a registration table.
//!
//! Used when the native primitive is unavailable and the
//! `fallback-backend` feature opted in. Every `store` records a
//! [Sentinel] under the referent's key; when the referent's
//! [SentinelList](crate::SentinelList) is torn down it consumes the whole
//! entry, zeroing each registered slot.
//!
//! ## The race window
//! Loads are raw, unsynchronized reads. Between the start of a referent's
//! teardown and its sentinel list dropping, a load from another thread
//! can observe a stale pointer to an object that is already destroying
//! itself. That window is the documented cost of this backend, not a
//! defect: closing it would require the same synchronization the native
//! primitive already provides, which would defeat the fallback's purpose.
//! All accesses to a slot and to its referent's destruction must
//! therefore be serialized by the caller, e.g. confined to one thread.
//! The table's own lock only protects the bookkeeping, never the race.
#![cfg(feature = "fallback-backend")]

use std::collections::HashMap;
use std::sync::Weak;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use slog::trace;

use crate::backend;
use crate::referent::{ReferentKey, SentinelList};
use crate::slot::{ErasedSlot, SlotId};

/// Wrapper asserting its contents may be kept in the global table.
struct AllowSend<T>(T);

// SAFETY: Sentinels are only created, removed and fired on the single
// thread the fallback contract confines slot accesses to; the table is
// global (and therefore must be Send) only so that thread can reach it
// from anywhere.
unsafe impl<T> Send for AllowSend<T> {}

/// The teardown action for one (referent, slot) pair.
struct Sentinel {
    slot: SlotId,
    cell: AllowSend<Weak<dyn ErasedSlot>>,
}

impl Sentinel {
    fn fire(self) {
        // The slot may have been dropped since registration; a dead cell
        // is simply a no-op
        if let Some(cell) = self.cell.0.upgrade() {
            cell.zero();
        }
    }
}

/// Referent identity -> sentinels to fire at its teardown.
static REGISTRY: Lazy<Mutex<HashMap<ReferentKey, Vec<Sentinel>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Record a sentinel for `slot` under the referent owning `list`.
pub(crate) fn attach(
    list: &SentinelList,
    slot: SlotId,
    cell: Weak<dyn ErasedSlot>,
) -> ReferentKey {
    let key = list.key();
    trace!(
        backend::logger(), "Attaching sentinel";
        "referent" => ?key,
        "slot" => ?slot,
    );
    REGISTRY
        .lock()
        .entry(key)
        .or_insert_with(Vec::new)
        .push(Sentinel {
            slot,
            cell: AllowSend(cell),
        });
    key
}

/// Remove the sentinel for one (referent, slot) pair, if present.
///
/// Called when a slot is cleared, overwritten or dropped, so the
/// referent's eventual teardown no longer touches it.
pub(crate) fn detach(key: ReferentKey, slot: SlotId) {
    trace!(
        backend::logger(), "Detaching sentinel";
        "referent" => ?key,
        "slot" => ?slot,
    );
    let mut registry = REGISTRY.lock();
    if let Some(sentinels) = registry.get_mut(&key) {
        sentinels.retain(|sentinel| sentinel.slot != slot);
        if sentinels.is_empty() {
            registry.remove(&key);
        }
    }
}

/// Consume a referent's whole entry, firing every sentinel.
///
/// Runs from [SentinelList](crate::SentinelList)'s drop, i.e. during the
/// referent's teardown. Idempotent: a missing entry is a no-op, so lists
/// that never registered anything cost one lookup.
pub(crate) fn consume(key: ReferentKey) {
    let sentinels = match REGISTRY.lock().remove(&key) {
        Some(sentinels) => sentinels,
        None => return,
    };
    trace!(
        backend::logger(), "Consuming registration entry";
        "referent" => ?key,
        "sentinels" => sentinels.len(),
    );
    // Fire outside the registry lock; each sentinel takes its slot's
    // own lock
    for sentinel in sentinels {
        sentinel.fire();
    }
}

#[cfg(test)]
pub(crate) fn registered_sentinels(key: ReferentKey) -> usize {
    REGISTRY.lock().get(&key).map_or(0, Vec::len)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingCell(AtomicUsize);

    impl ErasedSlot for CountingCell {
        fn zero(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_cell() -> (Arc<CountingCell>, Weak<dyn ErasedSlot>) {
        let cell = Arc::new(CountingCell(AtomicUsize::new(0)));
        let erased: Weak<CountingCell> = Arc::downgrade(&cell);
        let erased: Weak<dyn ErasedSlot> = erased;
        (cell, erased)
    }

    #[test]
    fn consume_fires_each_sentinel_once() {
        let list = SentinelList::new();
        let key = list.key();
        let (cell, erased) = counting_cell();
        attach(&list, SlotId::acquire(), erased);
        assert_eq!(registered_sentinels(key), 1);
        consume(key);
        assert_eq!(cell.0.load(Ordering::SeqCst), 1);
        assert_eq!(registered_sentinels(key), 0);
        // Entry already consumed
        consume(key);
        assert_eq!(cell.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_leaves_other_slots_registered() {
        let list = SentinelList::new();
        let key = list.key();
        let (kept, kept_erased) = counting_cell();
        let (detached, detached_erased) = counting_cell();
        let kept_slot = SlotId::acquire();
        let detached_slot = SlotId::acquire();
        attach(&list, kept_slot, kept_erased);
        attach(&list, detached_slot, detached_erased);
        detach(key, detached_slot);
        assert_eq!(registered_sentinels(key), 1);
        consume(key);
        assert_eq!(kept.0.load(Ordering::SeqCst), 1);
        assert_eq!(detached.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dead_cells_are_skipped() {
        let list = SentinelList::new();
        let key = list.key();
        let (cell, erased) = counting_cell();
        attach(&list, SlotId::acquire(), erased);
        drop(cell);
        // Must not panic on the dead upgrade
        consume(key);
    }
}
