//! The capability trait for weakly-referenced objects.

use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity for a referent's registrations.
///
/// A generated key rather than the referent's address, so a recycled
/// allocation can never be confused with a previous occupant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct ReferentKey(u64);

static NEXT_REFERENT_KEY: AtomicU64 = AtomicU64::new(1);

impl ReferentKey {
    fn acquire() -> ReferentKey {
        let prev = NEXT_REFERENT_KEY.fetch_add(1, Ordering::SeqCst);
        assert_ne!(prev, u64::MAX, "Overflow referent keys");
        ReferentKey(prev)
    }
}

/// An object that can be held in a [WeakSlot](crate::WeakSlot).
///
/// This is the facade's capability bound: a plain marker for objects that
/// only ever use the native backend, and the attachment point for the
/// fallback backend's teardown hook. Delegate protocols should declare it
/// as a supertrait so `WeakSlot<dyn Protocol>` works:
///
/// ```
/// use zeroweak::WeakReferent;
///
/// trait ProgressDelegate: WeakReferent + Send + Sync {
///     fn progressed(&self, percent: u8);
/// }
/// ```
pub trait WeakReferent: 'static {
    /// The sentinel list used by the fallback backend to register
    /// teardown actions against this object.
    ///
    /// The default of `None` opts the type out of fallback zeroing: when
    /// the fallback backend is active, slots holding such an object
    /// degrade to raw assignment and are never zeroed. Types that want
    /// fallback protection embed a [SentinelList] field and return it
    /// here.
    fn sentinel_list(&self) -> Option<&SentinelList> {
        None
    }
}

/// The referent-owned half of the fallback backend's sentinel mechanism.
///
/// Embed one by value in a referent and return it from
/// [WeakReferent::sentinel_list]. Its only job is to consume the
/// referent's registration-table entry when the referent is torn down,
/// which is what zeroes the registered slots.
///
/// `Clone` and `Default` both produce an *empty* list with a fresh
/// identity, so a cloned referent starts with no registrations.
pub struct SentinelList {
    key: ReferentKey,
}

impl SentinelList {
    pub fn new() -> SentinelList {
        SentinelList {
            key: ReferentKey::acquire(),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> ReferentKey {
        self.key
    }
}

impl Default for SentinelList {
    fn default() -> SentinelList {
        SentinelList::new()
    }
}

impl Clone for SentinelList {
    fn clone(&self) -> SentinelList {
        SentinelList::new()
    }
}

impl Debug for SentinelList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SentinelList").field(&self.key()).finish()
    }
}

#[cfg(feature = "fallback-backend")]
impl Drop for SentinelList {
    fn drop(&mut self) {
        // The referent is in irreversible teardown; fire its sentinels.
        crate::fallback::consume(self.key);
    }
}
