//! Fallback backend: registration-table zeroing, single-threaded
//! contract.
//!
//! Every test here owns its slots and referents outright, so running
//! tests on separate threads never races a slot access against its own
//! referent's teardown.
#![cfg(feature = "fallback-backend")]

use std::sync::{Arc, Once};

use zeroweak::{
    selected_backend, Backend, SentinelList, WeakConfig, WeakReferent, WeakSlot,
};

static FORCE_FALLBACK: Once = Once::new();

fn setup() {
    FORCE_FALLBACK.call_once(|| {
        zeroweak::init(WeakConfig {
            backend: Some(Backend::Fallback),
            ..WeakConfig::default()
        })
        .expect("backend already resolved before tests ran");
    });
}

/// A referent that opts in to fallback zeroing.
struct Widget {
    label: &'static str,
    sentinels: SentinelList,
}

impl Widget {
    fn new(label: &'static str) -> Arc<Widget> {
        Arc::new(Widget {
            label,
            sentinels: SentinelList::new(),
        })
    }
}

impl WeakReferent for Widget {
    fn sentinel_list(&self) -> Option<&SentinelList> {
        Some(&self.sentinels)
    }
}

/// A referent that keeps the default opt-out; its slots degrade to raw
/// assignment.
struct Bare(u32);

impl WeakReferent for Bare {}

#[test]
fn selects_forced_fallback() {
    setup();
    assert_eq!(selected_backend(), Backend::Fallback);
}

#[test]
fn load_is_reference_equal_while_alive() {
    setup();
    let slot = WeakSlot::new();
    let widget = Widget::new("alive");
    slot.store(Some(&widget));
    let loaded = slot.load().expect("referent is alive");
    assert!(Arc::ptr_eq(&loaded, &widget));
    assert_eq!(loaded.label, "alive");
}

#[test]
fn teardown_action_zeroes_the_slot() {
    setup();
    let slot = WeakSlot::new();
    let widget = Widget::new("doomed");
    slot.store(Some(&widget));
    drop(widget);
    assert!(slot.load().is_none());
}

#[test]
fn one_teardown_zeroes_every_registered_slot() {
    setup();
    let slot_a = WeakSlot::new();
    let slot_b = WeakSlot::new();
    let widget = Widget::new("shared");
    slot_a.store(Some(&widget));
    slot_b.store(Some(&widget));
    drop(widget);
    assert!(slot_a.load().is_none());
    assert!(slot_b.load().is_none());
}

#[test]
fn overwrite_detaches_the_old_registration() {
    setup();
    let slot = WeakSlot::new();
    let first = Widget::new("first");
    let second = Widget::new("second");
    slot.store(Some(&first));
    slot.store(Some(&second));
    // The replaced referent's teardown must not clear the slot
    drop(first);
    let loaded = slot.load().expect("second referent is alive");
    assert!(Arc::ptr_eq(&loaded, &second));
    drop(loaded);
    drop(second);
    assert!(slot.load().is_none());
}

#[test]
fn clear_detaches_and_nulls() {
    setup();
    let slot = WeakSlot::new();
    let old = Widget::new("old");
    slot.store(Some(&old));
    slot.clear();
    assert!(slot.load().is_none());
    let new = Widget::new("new");
    slot.store(Some(&new));
    // The cleared referent's teardown runs with no sentinel for this
    // slot left in the table
    drop(old);
    assert!(slot.load().map_or(false, |w| Arc::ptr_eq(&w, &new)));
}

#[test]
fn clear_is_idempotent() {
    setup();
    let slot = WeakSlot::<Widget>::new();
    slot.clear();
    assert!(slot.load().is_none());
    slot.clear();
    assert!(slot.load().is_none());
}

#[test]
fn dropping_the_slot_detaches_its_registration() {
    setup();
    let widget = Widget::new("outlives-slot");
    {
        let slot = WeakSlot::new();
        slot.store(Some(&widget));
    }
    // Teardown fires with the slot long gone; must be a no-op
    drop(widget);
}

#[test]
fn opted_out_referents_degrade_to_raw_assignment() {
    setup();
    let slot = WeakSlot::new();
    let bare = Arc::new(Bare(9));
    slot.store(Some(&bare));
    let loaded = slot.load().expect("referent is alive");
    assert!(Arc::ptr_eq(&loaded, &bare));
    assert_eq!(loaded.0, 9);
    // No sentinel was registered; the slot must be cleared manually
    // before the referent goes away
    slot.clear();
    assert!(slot.load().is_none());
}
