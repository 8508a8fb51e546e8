//! The weak slot facade.
//!
//! [WeakSlot] is the single entry point consumed by everything layered on
//! top of this crate (accessor generation, delegate wiring). Each of
//! `load`/`store`/`clear` dispatches to whichever backend the capability
//! detector resolved for this process; see [crate::Backend] for the three
//! contracts.

use std::fmt::{self, Debug, Formatter};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{self, Backend};
use crate::native::{self, NativeState};
use crate::referent::{ReferentKey, WeakReferent};

/// Unique handle identifying a slot in the registration table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct SlotId(u64);

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

impl SlotId {
    pub(crate) fn acquire() -> SlotId {
        let prev = NEXT_SLOT_ID.fetch_add(1, Ordering::SeqCst);
        assert_ne!(prev, u64::MAX, "Overflow slot ids");
        SlotId(prev)
    }
}

/// The representation a slot was given at creation time.
///
/// The backend selection never changes once cached, so a slot stays in
/// its variant for its whole life.
enum SlotState<T: ?Sized> {
    /// Native backend: the synchronized primitive does the zeroing.
    Native(NativeState<T>),
    /// Fallback and degraded backends: a raw, unsynchronized pointer.
    ///
    /// `registration` remembers which referent (if any) currently has a
    /// sentinel pointed at this slot, so overwrites and clears can detach
    /// it without touching the (possibly stale) raw value.
    Raw {
        value: Option<NonNull<T>>,
        registration: Option<ReferentKey>,
    },
}

/// The slot storage shared between a [WeakSlot] and any sentinels
/// registered against it.
///
/// Kept behind an [Arc] so a sentinel firing after the slot itself was
/// dropped degrades to a no-op instead of a dangling access.
pub(crate) struct SlotShared<T: ?Sized> {
    id: SlotId,
    state: Mutex<SlotState<T>>,
}

// SAFETY: The native state is an `Option<Weak<T>>`, which is Send + Sync
// under the same bounds. The raw states also carry a `NonNull<T>`, but
// that pointer is only ever dereferenced under the fallback/degraded
// contract that confines all accesses to a single thread.
unsafe impl<T: ?Sized + Send + Sync> Send for SlotShared<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for SlotShared<T> {}

/// A slot viewed through the registration table, with the referent type
/// erased.
#[cfg(feature = "fallback-backend")]
pub(crate) trait ErasedSlot {
    /// Null the slot's raw value as part of a referent's teardown.
    fn zero(&self);
}

#[cfg(feature = "fallback-backend")]
impl<T: ?Sized> ErasedSlot for SlotShared<T> {
    fn zero(&self) {
        let mut state = self.state.lock();
        if let SlotState::Raw { value, registration } = &mut *state {
            *value = None;
            // The table entry is being consumed along with us
            *registration = None;
        }
    }
}

/// A zeroing weak reference to a `T` owned by [Arc] strong owners
/// elsewhere.
///
/// The slot never owns its referent and never extends its lifetime beyond
/// an individual [load](WeakSlot::load). How reliably it reads null after
/// the referent's destruction depends on the process's [Backend]:
/// guaranteed and race-free for [Backend::Native], best-effort and
/// single-threaded for [Backend::Fallback], not at all for
/// [Backend::Raw].
pub struct WeakSlot<T: ?Sized> {
    shared: Arc<SlotShared<T>>,
}

impl<T: ?Sized> WeakSlot<T> {
    /// Create an empty slot.
    ///
    /// This resolves the process's backend selection if it hasn't been
    /// already.
    pub fn new() -> WeakSlot<T> {
        let state = match backend::selected() {
            Backend::Native => SlotState::Native(None),
            Backend::Fallback | Backend::Raw => SlotState::Raw {
                value: None,
                registration: None,
            },
        };
        WeakSlot {
            shared: Arc::new(SlotShared {
                id: SlotId::acquire(),
                state: Mutex::new(state),
            }),
        }
    }

    /// Load the current referent, or `None` if the slot is empty, was
    /// cleared, or (native backend) the referent has been destroyed.
    ///
    /// The returned [Arc] keeps the referent alive for as long as the
    /// caller holds it; the slot itself still doesn't.
    pub fn load(&self) -> Option<Arc<T>> {
        let state = self.shared.state.lock();
        match &*state {
            SlotState::Native(state) => native::load(state),
            SlotState::Raw { value, .. } => value.map(|ptr| {
                // SAFETY: Raw states exist only under the fallback and
                // degraded backends, whose contracts require the caller
                // to serialize slot accesses against the referent's
                // destruction. Under that contract a non-null value is a
                // pointer taken via `Arc::as_ptr` from a referent whose
                // strong count is still positive, so reconstructing a
                // borrowed Arc and cloning it is sound.
                let current = ManuallyDrop::new(unsafe { Arc::from_raw(ptr.as_ptr() as *const T) });
                Arc::clone(&current)
            }),
        }
    }

    /// Store a new referent, registering the slot against its
    /// destruction. Passing `None` is equivalent to [clear](WeakSlot::clear).
    ///
    /// If the slot already held a referent, its registration is detached
    /// first; a slot is never registered against two referents at once.
    pub fn store(&self, value: Option<&Arc<T>>)
    where
        T: WeakReferent,
    {
        {
            let mut state = self.shared.state.lock();
            if let SlotState::Native(state) = &mut *state {
                native::store(state, value);
                return;
            }
        }
        self.store_raw(value);
    }

    /// Null the slot, detaching any registration. Idempotent.
    pub fn clear(&self) {
        let detached = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                SlotState::Native(state) => {
                    *state = None;
                    None
                }
                SlotState::Raw { value, registration } => {
                    *value = None;
                    registration.take()
                }
            }
        };
        #[cfg(feature = "fallback-backend")]
        {
            if let Some(key) = detached {
                crate::fallback::detach(key, self.shared.id);
            }
        }
        #[cfg(not(feature = "fallback-backend"))]
        let _ = detached;
    }

    /// Raw assignment shared by the fallback and degraded backends. Only
    /// the fallback attaches sentinels; the degraded mode performs no
    /// zeroing at all.
    fn store_raw(&self, value: Option<&Arc<T>>)
    where
        T: WeakReferent,
    {
        let detached = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                SlotState::Raw { value: raw, registration } => {
                    *raw = value.map(|v| {
                        // SAFETY: `Arc::as_ptr` never returns null
                        unsafe { NonNull::new_unchecked(Arc::as_ptr(v) as *mut T) }
                    });
                    registration.take()
                }
                SlotState::Native(..) => return,
            }
        };
        #[cfg(feature = "fallback-backend")]
        {
            if let Some(key) = detached {
                crate::fallback::detach(key, self.shared.id);
            }
            if backend::selected() == Backend::Fallback {
                if let Some(list) = value.and_then(|v| v.sentinel_list()) {
                    let erased: std::sync::Weak<SlotShared<T>> = Arc::downgrade(&self.shared);
                    let erased: std::sync::Weak<dyn ErasedSlot> = erased;
                    let key = crate::fallback::attach(list, self.shared.id, erased);
                    let mut state = self.shared.state.lock();
                    if let SlotState::Raw { registration, .. } = &mut *state {
                        *registration = Some(key);
                    }
                }
            }
        }
        #[cfg(not(feature = "fallback-backend"))]
        let _ = detached;
    }
}

impl<T: ?Sized> Default for WeakSlot<T> {
    fn default() -> WeakSlot<T> {
        WeakSlot::new()
    }
}

impl<T: ?Sized> Drop for WeakSlot<T> {
    fn drop(&mut self) {
        // Detach any live registration so the table doesn't accumulate
        // sentinels for slots that no longer exist
        self.clear();
    }
}

impl<T: ?Sized> Debug for WeakSlot<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        let (backend, occupied) = match &*state {
            SlotState::Native(state) => (
                "native",
                state.as_ref().map_or(false, |weak| weak.strong_count() > 0),
            ),
            SlotState::Raw { value, .. } => ("raw", value.is_some()),
        };
        f.debug_struct("WeakSlot")
            .field("id", &self.shared.id)
            .field("backend", &backend)
            .field("occupied", &occupied)
            .finish()
    }
}
